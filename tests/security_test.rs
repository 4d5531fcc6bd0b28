//! Security Tests
//!
//! セキュリティ対策のテストケースを実装します。
//! ZIP bomb攻撃、XXE攻撃、パストラバーサル攻撃などへの対策を検証します。

use std::io::{Cursor, Write};

use xlsxrecord::{ParserBuilder, XlsxRecordError};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn open(data: Vec<u8>) -> Result<(), XlsxRecordError> {
    let parser = ParserBuilder::new().with_sheet_name("Sheet1").build()?;
    parser.rows(Cursor::new(data))?.try_for_each(|row| row.map(|_| ()))
}

/// ZIP bomb攻撃のテスト: 大量のファイルを含むZIPアーカイブ
#[test]
fn test_zip_bomb_too_many_files() {
    // 10,001個のファイルを含むZIPアーカイブを作成（上限: 10,000）
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for i in 0..10_001 {
        zip.start_file(format!("xl/file{}.xml", i), options).unwrap();
        zip.write_all(b"test").unwrap();
    }
    let data = zip.finish().unwrap().into_inner();

    match open(data) {
        Err(XlsxRecordError::SecurityViolation(msg)) => assert!(msg.contains("too many files")),
        other => panic!("Expected SecurityViolation, got {:?}", other),
    }
}

/// パストラバーサル攻撃のテスト: `..`を含むパス
#[test]
fn test_path_traversal_dotdot() {
    let data = build_zip(&[("xl/workbook.xml", b"<workbook/>"), ("../evil.xml", b"x")]);
    match open(data) {
        Err(XlsxRecordError::SecurityViolation(msg)) => assert!(msg.contains("traversal")),
        other => panic!("Expected SecurityViolation, got {:?}", other),
    }
}

/// パストラバーサル攻撃のテスト: 絶対パス
#[test]
fn test_path_traversal_absolute_path() {
    let data = build_zip(&[("/etc/passwd", b"root")]);
    match open(data) {
        Err(XlsxRecordError::SecurityViolation(msg)) => assert!(msg.contains("Absolute path")),
        other => panic!("Expected SecurityViolation, got {:?}", other),
    }
}

/// XXE攻撃のテスト: 外部エンティティは展開されない
#[test]
fn test_external_entity_not_expanded() {
    let sheet = br#"<?xml version="1.0"?>
<!DOCTYPE worksheet [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>&xxe;</t></is></c></row></sheetData></worksheet>"#;
    let data = build_zip(&[
        (
            "xl/workbook.xml",
            br#"<workbook xmlns:r="r"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            br#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
        ),
        ("xl/worksheets/sheet1.xml", sheet),
    ]);
    assert!(matches!(open(data), Err(XlsxRecordError::Xml(_))));
}

/// ファイルサイズ制限のテスト: 入力ファイルが大きすぎる場合
#[test]
fn test_input_file_size_limit() {
    let data = build_zip(&[("xl/workbook.xml", &[b' '; 4096])]);
    let parser = ParserBuilder::new()
        .with_sheet_name("Sheet1")
        .with_max_input_size(1024)
        .build()
        .unwrap();
    match parser.rows(Cursor::new(data)) {
        Err(XlsxRecordError::SecurityViolation(msg)) => {
            assert!(msg.contains("Input file size exceeds maximum"))
        }
        Err(other) => panic!("Expected SecurityViolation, got {:?}", other),
        Ok(_) => panic!("Expected SecurityViolation"),
    }
}

/// 構造が壊れたZIPアーカイブはZIPエラーになることを確認
#[test]
fn test_truncated_archive() {
    let mut data = build_zip(&[("xl/workbook.xml", b"<workbook/>")]);
    data.truncate(data.len() / 2);
    assert!(matches!(open(data), Err(XlsxRecordError::Zip(_))));
}
