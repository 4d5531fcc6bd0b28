//! xlsxrecord - Pure-Rust streaming Excel reader that maps sheet rows onto typed records
//!
//! This crate reads one sheet of an Excel workbook (XLSX or legacy XLS), matches
//! the first row against the column names declared on a record type, and yields
//! one record per non-blank data row, lazily and in sheet order.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xlsxrecord::{parse_file, record};
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct Person {
//!         pub name: String => "Name",
//!         pub age: Option<u32> => "Age",
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     for person in parse_file::<Person, _>("people.xlsx", "Sheet1")? {
//!         let person = person?;
//!         println!("{} is {:?}", person.name, person.age);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Headers are compared after normalization (lower-cased, whitespace and
//! `\`, `/`, `_` removed), so `"First Name"`, `"first_name"` and `"FIRST/NAME"`
//! all bind a field declared as `"FirstName"`.
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use std::io::Cursor;
//! use xlsxrecord::{record, Locale, ParserBuilder};
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     struct Payment {
//!         amount: f64 => "Betrag",
//!         due: chrono::NaiveDate => "Fällig",
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = ParserBuilder::new()
//!     .with_sheet_name("Zahlungen")
//!     .with_locale(Locale::de_de())
//!     .build()?;
//!
//! let bytes: Vec<u8> = vec![]; // Your Excel file bytes
//! let mut cursor = Cursor::new(bytes);
//! let payments = parser
//!     .parse_reader::<Payment, _>(&mut cursor)?
//!     .collect::<Result<Vec<_>, _>>()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Raw Rows
//!
//! ```rust,no_run
//! use std::fs::File;
//! use xlsxrecord::ParserBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = ParserBuilder::new().with_sheet_name("Sheet1").build()?;
//! for row in parser.rows(File::open("example.xlsx")?)? {
//!     println!("{:?}", row?.cells);
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod builder;
mod convert;
mod error;
mod formatter;
mod header;
mod locale;
mod numfmt;
mod parser;
mod projector;
mod record;
mod records;
mod security;
mod types;

use std::io::{Read, Seek};
use std::path::Path;

// 公開API
pub use api::{ContainerFormat, DateSystem};
pub use builder::{ParserBuilder, SheetParser};
pub use error::XlsxRecordError;
pub use header::{normalize_name, HeaderMap};
pub use locale::Locale;
pub use record::{FieldDescriptor, FieldKind, FieldType, FieldValue, Record};
pub use records::{RecordReader, SheetRows};
pub use types::{CellValue, Row};

/// ファイルからインバリアントロケールでレコードを読み込む
///
/// `ParserBuilder::new().with_sheet_name(sheet).build()?.parse_path(path)`の短縮形です。
pub fn parse_file<T: Record, P: AsRef<Path>>(
    path: P,
    sheet: &str,
) -> Result<RecordReader<'static, T>, XlsxRecordError> {
    ParserBuilder::new()
        .with_sheet_name(sheet)
        .build()?
        .parse_path(path)
}

/// 借用した入力からインバリアントロケールでレコードを読み込む
///
/// 入力は閉じられず、イテレーターの破棄後に呼び出し側で再利用できます。
pub fn parse_stream<'a, T: Record, R: Read + Seek>(
    reader: &'a mut R,
    sheet: &str,
) -> Result<RecordReader<'a, T>, XlsxRecordError> {
    ParserBuilder::new()
        .with_sheet_name(sheet)
        .build()?
        .parse_reader(reader)
}
