//! Legacy Module
//!
//! OLE複合ファイルのレガシーバイナリ形式（.xls）をcalamineでデコードするモジュール。
//!
//! BIFFレコードはシート単位でしか取り出せないため、対象シートの範囲を一度だけ
//! 読み込み、以後は行単位で返します。入力はシートの読み込み後すぐに解放されます。
//! 日付は1900年システムのシリアル値に正規化されます。

use std::io::{Read, Seek};

use calamine::{Data, Range, Reader, Xls};
use tracing::debug;

use super::RowSource;
use crate::api::{ContainerFormat, DateSystem};
use crate::error::XlsxRecordError;
use crate::formatter::datetime_to_serial;
use crate::types::{CellValue, Row};

/// 読み込み済みのレガシーシート
#[derive(Debug)]
pub(crate) struct LegacySheet {
    rows: std::vec::IntoIter<Row>,
    current: Option<Row>,
    column_count: usize,
}

/// ワークブックを開き、指定シートを読み込む
pub(crate) fn open<S: Read + Seek>(source: S, sheet: &str) -> Result<LegacySheet, XlsxRecordError> {
    let mut workbook: Xls<S> = Xls::new(source).map_err(calamine::Error::from)?;

    let names = workbook.sheet_names();
    if !names.iter().any(|name| name == sheet) {
        return Err(XlsxRecordError::SheetNotFound {
            sheet: sheet.to_string(),
            available: names,
        });
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(calamine::Error::from)?;
    drop(workbook);

    let (rows, column_count) = materialize(&range);
    debug!(sheet, rows = rows.len(), column_count, "Legacy worksheet loaded");

    Ok(LegacySheet {
        rows: rows.into_iter(),
        current: None,
        column_count,
    })
}

/// 範囲を行の列に変換（範囲の開始位置に合わせて列を揃える）
fn materialize(range: &Range<Data>) -> (Vec<Row>, usize) {
    let Some((start_row, start_col)) = range.start() else {
        return (Vec::new(), 0);
    };
    let start_col = start_col as usize;
    let (_, width) = range.get_size();

    let rows = range
        .rows()
        .enumerate()
        .map(|(offset, cells)| {
            let mut row = Row::new(start_row + offset as u32);
            for (col, data) in cells.iter().enumerate() {
                let value = cell_value(data);
                if !value.is_empty() {
                    row.set(start_col + col, value);
                }
            }
            row
        })
        .collect();

    (rows, start_col + width)
}

/// calamineのセル値を変換
fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) if dt.is_duration() => CellValue::DateTimeSerial(dt.as_f64()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => {
                CellValue::DateTimeSerial(datetime_to_serial(datetime, DateSystem::Excel1900))
            }
            None => CellValue::DateTimeSerial(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

impl RowSource for LegacySheet {
    fn advance(&mut self) -> Result<bool, XlsxRecordError> {
        self.current = self.rows.next();
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    fn column_count(&self) -> usize {
        self.column_count
    }

    fn date_system(&self) -> DateSystem {
        DateSystem::Excel1900
    }

    fn format(&self) -> ContainerFormat {
        ContainerFormat::Xls
    }
}
