//! Records Module
//!
//! シートの行を呼び出し側のペースで1つずつ取り出すイテレーター。
//!
//! - [`RecordReader`]: ヘッダー解決と型変換を行い、レコードを返す
//! - [`SheetRows`]: デコード済みの行をそのまま返す
//!
//! どちらも前方専用・単一パスで、終端到達・エラー発生・破棄のいずれの
//! 場合も入力を直ちに解放します。

use std::iter::FusedIterator;
use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::api::{ContainerFormat, DateSystem};
use crate::convert::{is_supported, ConvertContext};
use crate::error::XlsxRecordError;
use crate::header::{resolve, HeaderMap};
use crate::locale::Locale;
use crate::parser::RowSource;
use crate::projector::{is_blank, project};
use crate::record::{FieldDescriptor, Record};
use crate::types::Row;

/// レコードのイテレーター
///
/// 空行（対応付けられた列がすべて空セルの行）は読み飛ばされます。
/// 最初のエラーを返した後は`None`を返し続けます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxrecord::{record, ParserBuilder};
///
/// record! {
///     #[derive(Debug, Default)]
///     struct Person {
///         name: String => "Name",
///         age: Option<u32> => "Age",
///     }
/// }
///
/// # fn main() -> Result<(), xlsxrecord::XlsxRecordError> {
/// let parser = ParserBuilder::new().with_sheet_name("Sheet1").build()?;
/// for person in parser.parse_path::<Person, _>("people.xlsx")? {
///     let person = person?;
///     println!("{} {:?}", person.name, person.age);
/// }
/// # Ok(())
/// # }
/// ```
pub struct RecordReader<'a, T: Record> {
    source: Option<Box<dyn RowSource + 'a>>,
    fields: Vec<FieldDescriptor>,
    header: HeaderMap,
    locale: Locale,
    sheet: String,
    format: ContainerFormat,
    date_system: DateSystem,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Record> RecordReader<'a, T> {
    /// ヘッダー行を読み取り、対応表を構築する
    ///
    /// 変換戦略のない型のフィールドが列に対応付けられた場合は、
    /// 最初のデータ行を読む前に`UnsupportedType`を返します。
    pub(crate) fn open(
        mut source: Box<dyn RowSource + 'a>,
        sheet: &str,
        locale: Locale,
    ) -> Result<Self, XlsxRecordError> {
        let fields = T::fields();

        if !source.advance()? {
            return Err(XlsxRecordError::EmptySheet {
                sheet: sheet.to_string(),
            });
        }
        let header_row = source.current().ok_or_else(|| XlsxRecordError::EmptySheet {
            sheet: sheet.to_string(),
        })?;
        let column_count = source.column_count().max(header_row.len());
        let header = resolve(header_row, &fields, column_count, source.date_system())?;

        for (field_index, _) in header.iter() {
            let descriptor = &fields[field_index];
            if !is_supported(descriptor.field_type) {
                return Err(XlsxRecordError::UnsupportedType {
                    field: descriptor.field.to_string(),
                    target: descriptor.field_type,
                });
            }
        }

        let format = source.format();
        let date_system = source.date_system();
        debug!(sheet, %format, bound = header.len(), "Sheet opened for records");

        Ok(Self {
            source: Some(source),
            fields,
            header,
            locale,
            sheet: sheet.to_string(),
            format,
            date_system,
            _marker: PhantomData,
        })
    }

    /// シート名
    pub fn sheet_name(&self) -> &str {
        &self.sheet
    }

    /// コンテナの形式
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// ワークブックの日付システム
    pub fn date_system(&self) -> DateSystem {
        self.date_system
    }

    /// ヘッダー解決の結果
    pub fn header_map(&self) -> &HeaderMap {
        &self.header
    }

    /// 列に対応付けられたフィールドと列インデックス（列順）
    pub fn bindings(&self) -> impl Iterator<Item = (&FieldDescriptor, usize)> + '_ {
        self.header
            .iter()
            .filter_map(|(field, column)| self.fields.get(field).map(|d| (d, column)))
    }

    fn pull(&mut self) -> Option<Result<T, XlsxRecordError>> {
        let source = self.source.as_mut()?;
        loop {
            match source.advance() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
            let row = source.current()?;
            if is_blank(row, &self.header) {
                trace!(row = row.index + 1, "Skipping blank row");
                continue;
            }
            let ctx = ConvertContext {
                locale: &self.locale,
                date_system: self.date_system,
            };
            return Some(project::<T>(row, &self.fields, &self.header, &ctx));
        }
    }
}

impl<T: Record> Iterator for RecordReader<'_, T> {
    type Item = Result<T, XlsxRecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.pull();
        if !matches!(item, Some(Ok(_))) && self.source.take().is_some() {
            debug!(sheet = %self.sheet, "Sheet released");
        }
        item
    }
}

impl<T: Record> FusedIterator for RecordReader<'_, T> {}

/// デコード済みの行のイテレーター
///
/// ヘッダー行も含め、格納順にすべての行を返します。
pub struct SheetRows<'a> {
    source: Option<Box<dyn RowSource + 'a>>,
    sheet: String,
    format: ContainerFormat,
    date_system: DateSystem,
    column_count: usize,
}

impl<'a> SheetRows<'a> {
    pub(crate) fn new(source: Box<dyn RowSource + 'a>, sheet: &str) -> Self {
        Self {
            format: source.format(),
            date_system: source.date_system(),
            column_count: source.column_count(),
            source: Some(source),
            sheet: sheet.to_string(),
        }
    }

    /// シート名
    pub fn sheet_name(&self) -> &str {
        &self.sheet
    }

    /// コンテナの形式
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// ワークブックの日付システム
    pub fn date_system(&self) -> DateSystem {
        self.date_system
    }

    /// シートが宣言する列数（読み進めた行の幅も反映）
    pub fn column_count(&self) -> usize {
        match &self.source {
            Some(source) => self.column_count.max(source.column_count()),
            None => self.column_count,
        }
    }
}

impl Iterator for SheetRows<'_> {
    type Item = Result<Row, XlsxRecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        let source = self.source.as_mut()?;
        let item = match source.advance() {
            Ok(true) => source.current().cloned().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        };
        match &item {
            Some(Ok(row)) => self.column_count = self.column_count.max(row.len()),
            _ => {
                if let Some(source) = self.source.take() {
                    self.column_count = self.column_count.max(source.column_count());
                }
            }
        }
        item
    }
}

impl FusedIterator for SheetRows<'_> {}
