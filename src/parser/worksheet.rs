//! Worksheet Module
//!
//! ワークシートXMLをプル型で読み進め、1回の`advance`につき1行を
//! デコードするストリーミングデコーダー。
//! シート全体をメモリに展開することはありません。

use std::io::BufRead;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::RowSource;
use crate::api::{ContainerFormat, DateSystem};
use crate::error::XlsxRecordError;
use crate::formatter::{datetime_to_serial, time_to_fraction};
use crate::security::limit_violation;
use crate::types::{CellCoord, CellValue, Row};

/// シートのデコードに必要なワークブック共通の表
#[derive(Debug, Default)]
pub(crate) struct SheetTables {
    /// 共有文字列テーブル（インデックス順）
    pub shared_strings: Vec<String>,
    /// スタイルインデックスごとの日付書式フラグ
    pub date_styles: Vec<bool>,
    /// ワークブックの日付システム
    pub date_system: DateSystem,
}

impl SheetTables {
    fn is_date_style(&self, style: usize) -> bool {
        self.date_styles.get(style).copied().unwrap_or(false)
    }
}

/// セルの`t`属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    SharedString,
    InlineString,
    FormulaString,
    Boolean,
    Error,
    IsoDate,
    Number,
}

impl CellKind {
    fn from_attr(value: &[u8]) -> Self {
        match value {
            b"s" => CellKind::SharedString,
            b"inlineStr" => CellKind::InlineString,
            b"str" => CellKind::FormulaString,
            b"b" => CellKind::Boolean,
            b"e" => CellKind::Error,
            b"d" => CellKind::IsoDate,
            _ => CellKind::Number,
        }
    }
}

/// 読み取り中のセル
#[derive(Debug)]
struct PendingCell {
    col: usize,
    kind: CellKind,
    style: usize,
}

/// シート本体の読み進め方
enum Step {
    Dimension(Option<usize>),
    Row { index: Option<u32>, empty: bool },
    Finished,
    Skip,
}

/// ワークシートのストリーミングデコーダー
pub(crate) struct WorksheetStream<B: BufRead> {
    reader: Reader<B>,
    buf: Vec<u8>,
    tables: SheetTables,
    column_count: usize,
    current: Option<Row>,
    next_row: u32,
    finished: bool,
}

impl<B: BufRead> WorksheetStream<B> {
    /// デコーダーを生成
    pub fn new(input: B, tables: SheetTables) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(false);
        Self {
            reader,
            buf: Vec::new(),
            tables,
            column_count: 0,
            current: None,
            next_row: 0,
            finished: false,
        }
    }

    fn next_step(&mut self) -> Result<Step, XlsxRecordError> {
        self.buf.clear();
        let event = self
            .reader
            .read_event_into(&mut self.buf)
            .map_err(read_error)?;

        let step = match event {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                Step::Dimension(dimension_columns(&e)?)
            }
            Event::Start(e) if e.local_name().as_ref() == b"row" => Step::Row {
                index: row_index(&e)?,
                empty: false,
            },
            Event::Empty(e) if e.local_name().as_ref() == b"row" => Step::Row {
                index: row_index(&e)?,
                empty: true,
            },
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => Step::Finished,
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => Step::Finished,
            Event::Eof => {
                return Err(XlsxRecordError::Xml(
                    "Unexpected end of worksheet before </sheetData>".to_string(),
                ))
            }
            _ => Step::Skip,
        };
        Ok(step)
    }
}

impl<B: BufRead> RowSource for WorksheetStream<B> {
    fn advance(&mut self) -> Result<bool, XlsxRecordError> {
        self.current = None;
        if self.finished {
            return Ok(false);
        }

        loop {
            match self.next_step() {
                Ok(Step::Dimension(Some(columns))) => {
                    self.column_count = self.column_count.max(columns);
                }
                Ok(Step::Row { index, empty }) => {
                    let mut row = Row::new(index.unwrap_or(self.next_row));
                    if !empty {
                        if let Err(e) =
                            read_row(&mut self.reader, &mut self.buf, &self.tables, &mut row)
                        {
                            self.finished = true;
                            return Err(e);
                        }
                    }
                    self.next_row = row.index.saturating_add(1);
                    self.current = Some(row);
                    return Ok(true);
                }
                Ok(Step::Finished) => {
                    self.finished = true;
                    return Ok(false);
                }
                Ok(Step::Dimension(None)) | Ok(Step::Skip) => {}
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            }
        }
    }

    fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    fn column_count(&self) -> usize {
        self.column_count
    }

    fn date_system(&self) -> DateSystem {
        self.tables.date_system
    }

    fn format(&self) -> ContainerFormat {
        ContainerFormat::Xlsx
    }
}

/// 読み取りエラーの変換
///
/// 展開サイズの上限超過はセキュリティ違反として報告します。
fn read_error(err: quick_xml::Error) -> XlsxRecordError {
    if let quick_xml::Error::Io(io) = &err {
        if let Some(violation) = limit_violation(io) {
            return violation;
        }
    }
    XlsxRecordError::xml(err)
}

/// 属性値をUTF-8文字列として取得（名前空間接頭辞は無視）
fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, XlsxRecordError> {
    for attr in e.attributes() {
        let attr = attr.map_err(XlsxRecordError::xml)?;
        if attr.key.local_name().as_ref() == name {
            let raw = std::str::from_utf8(&attr.value).map_err(XlsxRecordError::xml)?;
            let value = unescape(raw).map_err(XlsxRecordError::xml)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// `<dimension ref="A1:C10">`から列数を取得
fn dimension_columns(e: &BytesStart<'_>) -> Result<Option<usize>, XlsxRecordError> {
    let Some(range) = attribute(e, b"ref")? else {
        return Ok(None);
    };
    let last = range.rsplit(':').next().unwrap_or(range.as_str());
    Ok(CellCoord::from_a1(last).map(|coord| coord.col as usize + 1))
}

/// `<row r="3">`から行インデックス（0始まり）を取得
fn row_index(e: &BytesStart<'_>) -> Result<Option<u32>, XlsxRecordError> {
    match attribute(e, b"r")? {
        Some(r) => {
            let index = r
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .ok_or_else(|| XlsxRecordError::Xml(format!("Invalid row number '{}'", r)))?;
            Ok(Some(index))
        }
        None => Ok(None),
    }
}

/// `<c>`要素の属性を解析
fn cell_start(
    e: &BytesStart<'_>,
    row: u32,
    next_col: usize,
) -> Result<PendingCell, XlsxRecordError> {
    let mut col = next_col;
    let mut kind = CellKind::Number;
    let mut style = 0usize;

    for attr in e.attributes() {
        let attr = attr.map_err(XlsxRecordError::xml)?;
        match attr.key.local_name().as_ref() {
            b"r" => {
                let reference = std::str::from_utf8(&attr.value).map_err(XlsxRecordError::xml)?;
                let coord = CellCoord::from_a1(reference).ok_or_else(|| {
                    XlsxRecordError::Xml(format!(
                        "Invalid cell reference '{}' in row {}",
                        reference,
                        row + 1
                    ))
                })?;
                col = coord.col as usize;
            }
            b"t" => kind = CellKind::from_attr(&attr.value),
            b"s" => {
                style = std::str::from_utf8(&attr.value)
                    .ok()
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(0);
            }
            _ => {}
        }
    }

    Ok(PendingCell { col, kind, style })
}

/// `</row>`までのセルを読み取る
fn read_row<B: BufRead>(
    reader: &mut Reader<B>,
    buf: &mut Vec<u8>,
    tables: &SheetTables,
    row: &mut Row,
) -> Result<(), XlsxRecordError> {
    let mut pending: Option<PendingCell> = None;
    let mut value = String::new();
    let mut has_value = false;
    let mut collecting = false;
    let mut in_inline = false;
    let mut phonetic_depth = 0usize;
    let mut next_col = 0usize;

    loop {
        buf.clear();
        match reader.read_event_into(buf).map_err(read_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    pending = Some(cell_start(&e, row.index, next_col)?);
                    value.clear();
                    has_value = false;
                    in_inline = false;
                    phonetic_depth = 0;
                }
                b"v" if pending.is_some() => {
                    collecting = true;
                    has_value = true;
                }
                b"is" if pending.is_some() => {
                    in_inline = true;
                    has_value = true;
                }
                b"rPh" if in_inline => phonetic_depth += 1,
                b"t" if in_inline && phonetic_depth == 0 => collecting = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"c" => {
                    let cell = cell_start(&e, row.index, next_col)?;
                    next_col = cell.col + 1;
                }
                b"v" if pending.is_some() => has_value = true,
                _ => {}
            },
            Event::Text(e) if collecting => {
                value.push_str(&e.unescape().map_err(XlsxRecordError::xml)?);
            }
            Event::CData(e) if collecting => {
                value.push_str(std::str::from_utf8(&e).map_err(XlsxRecordError::xml)?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => collecting = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"is" => in_inline = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let decoded = if has_value {
                            decode_cell(&cell, &value, row.index, tables)?
                        } else {
                            CellValue::Empty
                        };
                        if !decoded.is_empty() {
                            row.set(cell.col, decoded);
                        }
                        next_col = cell.col + 1;
                    }
                    collecting = false;
                }
                b"row" => return Ok(()),
                _ => {}
            },
            Event::Eof => {
                return Err(XlsxRecordError::Xml(format!(
                    "Unexpected end of worksheet in row {}",
                    row.index + 1
                )))
            }
            _ => {}
        }
    }
}

/// セルの種別と値テキストからセル値を決定
fn decode_cell(
    cell: &PendingCell,
    raw: &str,
    row: u32,
    tables: &SheetTables,
) -> Result<CellValue, XlsxRecordError> {
    let reference = || CellCoord::new(row, cell.col as u32).to_a1_notation();

    let value = match cell.kind {
        CellKind::SharedString => {
            let index = raw.trim().parse::<usize>().map_err(|_| {
                XlsxRecordError::Xml(format!(
                    "Invalid shared string index '{}' at {}",
                    raw,
                    reference()
                ))
            })?;
            let text = tables.shared_strings.get(index).ok_or_else(|| {
                XlsxRecordError::Xml(format!(
                    "Shared string index {} out of range at {} (table size: {})",
                    index,
                    reference(),
                    tables.shared_strings.len()
                ))
            })?;
            CellValue::Text(text.clone())
        }
        CellKind::InlineString | CellKind::FormulaString => CellValue::Text(raw.to_string()),
        CellKind::Boolean => {
            let raw = raw.trim();
            CellValue::Boolean(raw == "1" || raw.eq_ignore_ascii_case("true"))
        }
        CellKind::Error => CellValue::Error(raw.to_string()),
        CellKind::IsoDate => match parse_iso_datetime(raw.trim(), tables.date_system) {
            Some(serial) => CellValue::DateTimeSerial(serial),
            None => CellValue::Text(raw.to_string()),
        },
        CellKind::Number => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(CellValue::Empty);
            }
            let number = trimmed.parse::<f64>().map_err(|_| {
                XlsxRecordError::Xml(format!(
                    "Invalid numeric value '{}' at {}",
                    raw,
                    reference()
                ))
            })?;
            if tables.is_date_style(cell.style) {
                CellValue::DateTimeSerial(number)
            } else {
                CellValue::Number(number)
            }
        }
    };
    Ok(value)
}

/// `t="d"`セルのISO 8601文字列を日付シリアル値に変換
fn parse_iso_datetime(raw: &str, system: DateSystem) -> Option<f64> {
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

    let raw = raw.trim_end_matches('Z');
    if let Some(datetime) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return Some(datetime_to_serial(datetime, system));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(datetime_to_serial(date.and_time(NaiveTime::MIN), system));
    }
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .ok()
        .map(time_to_fraction)
}
