//! Package Module
//!
//! ZIP + XMLパッケージ（.xlsx）からワークブックの構造情報を読み取り、
//! 指定シートのパートをアーカイブから直接ストリーミングするモジュール。
//!
//! 読み取る情報:
//! - `_rels/.rels`: ワークブックパートの場所
//! - ワークブックパート: シート名とリレーションシップID、`date1904`
//! - ワークブックのリレーションシップ: シート・スタイル・共有文字列パートの場所
//! - スタイル: 日付書式が適用されたスタイルインデックス
//! - 共有文字列テーブル

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Take};

use flate2::read::DeflateDecoder;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

use super::worksheet::{SheetTables, WorksheetStream};
use crate::api::DateSystem;
use crate::error::XlsxRecordError;
use crate::numfmt::{is_builtin_date_id, is_date_format_code};
use crate::security::{LimitedReader, SecurityConfig};

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const REL_OFFICE_DOCUMENT: &str = "/officeDocument";
const REL_WORKSHEET: &str = "/worksheet";
const REL_STYLES: &str = "/styles";
const REL_SHARED_STRINGS: &str = "/sharedStrings";

/// リレーションシップ（`Id` -> 種別・ターゲット）
#[derive(Debug, Clone)]
struct Relationship {
    rel_type: String,
    target: String,
}

/// ワークブックに宣言されたシート
#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    rel_id: String,
}

/// アーカイブ内のエントリの格納位置
#[derive(Debug, Clone, Copy)]
struct EntryLocation {
    data_start: u64,
    compressed_size: u64,
    compression: CompressionMethod,
}

/// 圧縮方式に応じたエントリのリーダー
pub(crate) enum EntryReader<S: Read> {
    Stored(Take<S>),
    Deflated(DeflateDecoder<Take<S>>),
}

impl<S: Read> Read for EntryReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            EntryReader::Stored(inner) => inner.read(buf),
            EntryReader::Deflated(inner) => inner.read(buf),
        }
    }
}

/// ストリーミング中のシート
pub(crate) type PackageSheet<S> = WorksheetStream<BufReader<LimitedReader<EntryReader<S>>>>;

/// パッケージを開き、指定シートのストリームを返す
///
/// アーカイブの構造情報と共有文字列テーブルを読み込んだ後、
/// シートパートの圧縮データ位置へ直接シークしてストリーミングします。
pub(crate) fn open<S: Read + Seek>(
    mut source: S,
    sheet: &str,
    security: &SecurityConfig,
) -> Result<PackageSheet<S>, XlsxRecordError> {
    let (tables, location, sheet_part, entry_size) = {
        let mut archive = ZipArchive::new(&mut source).map_err(XlsxRecordError::zip)?;
        check_archive(&mut archive, security)?;

        let workbook_part = read_part(&mut archive, "_rels/.rels")?
            .map(|xml| parse_relationships(&xml))
            .transpose()?
            .and_then(|rels| {
                rels.into_values()
                    .find(|rel| rel.rel_type.ends_with(REL_OFFICE_DOCUMENT))
                    .map(|rel| resolve_target("", &rel.target))
            })
            .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());

        let workbook_xml = read_part(&mut archive, &workbook_part)?.ok_or_else(|| {
            XlsxRecordError::Zip(format!("Workbook part '{}' not found", workbook_part))
        })?;
        let (sheets, date_system) = parse_workbook(&workbook_xml)?;

        let (base_dir, file_name) = split_part_name(&workbook_part);
        let rels_part = format!("{}_rels/{}.rels", base_dir, file_name);
        let workbook_rels = match read_part(&mut archive, &rels_part)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        let part_of_type = |suffix: &str, fallback: &str| {
            workbook_rels
                .values()
                .find(|rel| rel.rel_type.ends_with(suffix))
                .map(|rel| resolve_target(base_dir, &rel.target))
                .unwrap_or_else(|| format!("{}{}", base_dir, fallback))
        };

        let Some(entry) = sheets.iter().find(|entry| entry.name == sheet) else {
            return Err(XlsxRecordError::SheetNotFound {
                sheet: sheet.to_string(),
                available: sheets.iter().map(|entry| entry.name.clone()).collect(),
            });
        };
        let sheet_part = match workbook_rels.get(&entry.rel_id) {
            Some(rel) if rel.rel_type.ends_with(REL_WORKSHEET) => {
                resolve_target(base_dir, &rel.target)
            }
            _ => {
                return Err(XlsxRecordError::Zip(format!(
                    "Sheet '{}' has no worksheet relationship '{}'",
                    sheet, entry.rel_id
                )))
            }
        };

        let date_styles = match read_part(&mut archive, &part_of_type(REL_STYLES, "styles.xml"))? {
            Some(xml) => parse_date_styles(&xml)?,
            None => Vec::new(),
        };
        let shared_strings_part = part_of_type(REL_SHARED_STRINGS, "sharedStrings.xml");
        let shared_strings = read_shared_strings(&mut archive, &shared_strings_part)?;
        debug!(
            shared_strings = shared_strings.len(),
            styles = date_styles.len(),
            ?date_system,
            "Package tables loaded"
        );

        let entry = archive.by_name(&sheet_part).map_err(|e| match e {
            ZipError::FileNotFound => {
                XlsxRecordError::Zip(format!("Worksheet part '{}' not found", sheet_part))
            }
            other => XlsxRecordError::zip(other),
        })?;
        let location = EntryLocation {
            data_start: entry.data_start(),
            compressed_size: entry.compressed_size(),
            compression: entry.compression(),
        };
        let entry_size = entry.size();
        debug!(sheet, part = %sheet_part, size = entry_size, "Worksheet located");

        (
            SheetTables {
                shared_strings,
                date_styles,
                date_system,
            },
            location,
            sheet_part,
            entry_size,
        )
    };

    source.seek(SeekFrom::Start(location.data_start))?;
    let raw = source.take(location.compressed_size);
    let entry = match location.compression {
        CompressionMethod::Stored => EntryReader::Stored(raw),
        CompressionMethod::Deflated => EntryReader::Deflated(DeflateDecoder::new(raw)),
        other => {
            return Err(XlsxRecordError::UnsupportedFormat(format!(
                "Worksheet compression method {:?} is not supported",
                other
            )))
        }
    };
    let limited = LimitedReader::new(entry, sheet_part, entry_size.min(security.max_entry_size));

    Ok(WorksheetStream::new(BufReader::new(limited), tables))
}

/// エントリ数・パス・サイズの検証
fn check_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    security: &SecurityConfig,
) -> Result<(), XlsxRecordError> {
    security.check_entry_count(archive.len())?;
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(XlsxRecordError::zip)?;
        security.check_entry(file.name(), file.size())?;
    }
    Ok(())
}

/// パートを読み込む（存在しない場合は`None`）
fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, XlsxRecordError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(XlsxRecordError::zip(e)),
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

/// パート名をディレクトリ（末尾`/`付き）とファイル名に分割
fn split_part_name(part: &str) -> (&str, &str) {
    match part.rfind('/') {
        Some(pos) => (&part[..=pos], &part[pos + 1..]),
        None => ("", part),
    }
}

/// リレーションシップのターゲットをパッケージ内のパート名に解決
///
/// `/`で始まるターゲットはパッケージルートからの絶対パス、
/// それ以外は`base_dir`からの相対パスです。
fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}{}", base_dir, target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn xml_reader(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    reader
}

/// 属性値を取得（名前空間接頭辞は無視）
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

/// リレーションシップパートの解析
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, Relationship>, XlsxRecordError> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(XlsxRecordError::xml)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attribute(&e, b"Id")?;
                let rel_type = attribute(&e, b"Type")?;
                let target = attribute(&e, b"Target")?;
                if let (Some(id), Some(rel_type), Some(target)) = (id, rel_type, target) {
                    rels.insert(id, Relationship { rel_type, target });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// ワークブックパートの解析（シート一覧と日付システム）
fn parse_workbook(xml: &[u8]) -> Result<(Vec<SheetEntry>, DateSystem), XlsxRecordError> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut date_system = DateSystem::Excel1900;

    loop {
        match reader.read_event_into(&mut buf).map_err(XlsxRecordError::xml)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sheet" => {
                    let name = attribute(&e, b"name")?;
                    let rel_id = attribute(&e, b"id")?;
                    if let (Some(name), Some(rel_id)) = (name, rel_id) {
                        sheets.push(SheetEntry { name, rel_id });
                    }
                }
                b"workbookPr" => {
                    if let Some(value) = attribute(&e, b"date1904")? {
                        if value == "1" || value.eq_ignore_ascii_case("true") {
                            date_system = DateSystem::Excel1904;
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((sheets, date_system))
}

/// スタイルパートの解析
///
/// `cellXfs`の各スタイルについて、適用される数値書式が日付・時刻書式かどうかを
/// スタイルインデックス順に返します。
fn parse_date_styles(xml: &[u8]) -> Result<Vec<bool>, XlsxRecordError> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut num_formats: HashMap<u32, String> = HashMap::new();
    let mut xf_formats: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(XlsxRecordError::xml)? {
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = attribute(&e, b"numFmtId")?.and_then(|id| id.parse::<u32>().ok());
                    let code = attribute(&e, b"formatCode")?;
                    if let (Some(id), Some(code)) = (id, code) {
                        num_formats.insert(id, code);
                    }
                }
                b"xf" if in_cell_xfs => {
                    let id = attribute(&e, b"numFmtId")?
                        .and_then(|id| id.parse::<u32>().ok())
                        .unwrap_or(0);
                    xf_formats.push(id);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(xf_formats
        .into_iter()
        .map(|id| match num_formats.get(&id) {
            Some(code) => is_date_format_code(code),
            None => is_builtin_date_id(id),
        })
        .collect())
}

/// 共有文字列テーブルの読み込み
///
/// パートを展開しながら解析し、インデックス順の文字列表を構築します。
/// リッチテキストの各ランは連結され、ふりがな（`rPh`）は除外されます。
fn read_shared_strings<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Vec<String>, XlsxRecordError> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(Vec::new()),
        Err(e) => return Err(XlsxRecordError::zip(e)),
    };
    parse_shared_strings(BufReader::new(file))
}

fn parse_shared_strings<B: BufRead>(input: B) -> Result<Vec<String>, XlsxRecordError> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf).map_err(XlsxRecordError::xml)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" if in_si => phonetic_depth += 1,
                b"t" if in_si && phonetic_depth == 0 => in_t = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(e) if in_t => {
                current.push_str(&e.unescape().map_err(XlsxRecordError::xml)?);
            }
            Event::CData(e) if in_t => {
                current.push_str(std::str::from_utf8(&e).map_err(XlsxRecordError::xml)?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_si = false;
                }
                b"rPh" if phonetic_depth > 0 => phonetic_depth -= 1,
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}
