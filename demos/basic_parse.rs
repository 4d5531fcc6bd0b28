//! Basic Parse Example
//!
//! This example demonstrates the most basic usage of xlsxrecord:
//! reading one sheet of an Excel file into typed records.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example basic_parse -- input.xlsx Sheet1
//! ```
//!
//! If no arguments are provided, a small workbook is generated in memory
//! and read back.

use std::io::Cursor;

use chrono::NaiveDate;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use xlsxrecord::{record, Locale, ParserBuilder};

record! {
    #[derive(Debug, Default)]
    struct Employee {
        name: String => "Name",
        age: Option<u32> => "Age",
        hired: Option<NaiveDate> => "Hire Date",
        remote: bool => "Remote",
    }
}

/// Build a sample workbook with a blank row and mixed cell types
fn sample_workbook() -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Staff")?;
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    worksheet.write_string(0, 0, "Name")?;
    worksheet.write_string(0, 1, "Age")?;
    worksheet.write_string(0, 2, "hire_date")?;
    worksheet.write_string(0, 3, "REMOTE")?;

    worksheet.write_string(1, 0, "Ann")?;
    worksheet.write_number(1, 1, 34)?;
    let hired = ExcelDateTime::from_ymd(2019, 4, 1)?;
    worksheet.write_datetime_with_format(1, 2, &hired, &date_format)?;
    worksheet.write_string(1, 3, "yes")?;

    worksheet.write_string(3, 0, "Bob")?;
    worksheet.write_string(3, 2, "2021-09-15")?;
    worksheet.write_string(3, 3, "n")?;

    Ok(workbook.save_to_buffer()?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let input_path = args.next();
    let sheet = args.next().unwrap_or_else(|| "Staff".to_string());

    let parser = ParserBuilder::new()
        .with_sheet_name(&sheet)
        .with_locale(Locale::en_us())
        .build()?;

    let employees = match &input_path {
        Some(path) => {
            println!("Reading sheet '{}' from {}...", sheet, path);
            parser.parse_path::<Employee, _>(path)?
        }
        None => {
            println!("Reading sheet '{}' from a generated workbook...", sheet);
            parser.parse_owned::<Employee, _>(Cursor::new(sample_workbook()?))?
        }
    };

    println!("Bound columns:");
    for (field, column) in employees.bindings() {
        println!("  {} -> column {} ({})", field.field, column, field.field_type);
    }

    for employee in employees {
        println!("{:?}", employee?);
    }

    Ok(())
}
