//! Parser Module
//!
//! スプレッドシートコンテナを判定し、指定シートの行を先頭から順に
//! 1行ずつ取り出すデコーダーを提供するモジュール。
//!
//! - ZIP + XMLパッケージ（.xlsx）: 独自のストリーミングデコーダー
//! - OLE複合ファイル（.xls）: calamineによるデコード

mod legacy;
mod package;
mod worksheet;

use std::io::{Read, Seek, SeekFrom};

use tracing::debug;

use crate::api::{ContainerFormat, DateSystem};
use crate::error::XlsxRecordError;
use crate::security::SecurityConfig;
use crate::types::Row;

/// ZIPローカルファイルヘッダーのシグネチャ
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// OLE複合ファイルのシグネチャ
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// 行単位の前方専用カーソル
///
/// `advance`で次の行に進み、`current`で現在の行を参照します。
/// 一度終端に達したカーソルは再開できません。
pub(crate) trait RowSource {
    /// 次の行に進む（終端に達した場合は`false`）
    fn advance(&mut self) -> Result<bool, XlsxRecordError>;

    /// 現在の行
    fn current(&self) -> Option<&Row>;

    /// シートが宣言する列数（不明な場合は0）
    fn column_count(&self) -> usize;

    /// ワークブックの日付システム
    fn date_system(&self) -> DateSystem;

    /// コンテナの形式
    fn format(&self) -> ContainerFormat;
}

/// 先頭のシグネチャからコンテナ形式を判定
fn detect_format(magic: &[u8]) -> Option<ContainerFormat> {
    if magic.starts_with(&OLE_MAGIC) {
        Some(ContainerFormat::Xls)
    } else if magic.starts_with(&ZIP_MAGIC) {
        Some(ContainerFormat::Xlsx)
    } else {
        None
    }
}

/// 先頭最大8バイトを読み取る
fn read_magic<S: Read>(source: &mut S) -> Result<Vec<u8>, XlsxRecordError> {
    let mut magic = Vec::with_capacity(OLE_MAGIC.len());
    source
        .by_ref()
        .take(OLE_MAGIC.len() as u64)
        .read_to_end(&mut magic)?;
    Ok(magic)
}

/// 入力を判定して指定シートのカーソルを開く
///
/// # 引数
///
/// * `source` - 入力（所有・借用のどちらでもよい）
/// * `sheet` - シート名（大文字小文字を区別して完全一致）
/// * `security` - セキュリティ制限
///
/// # 戻り値
///
/// * `Ok(Box<dyn RowSource>)` - シートのカーソル
/// * `Err(XlsxRecordError::UnsupportedFormat)` - 未対応のコンテナ形式
/// * `Err(XlsxRecordError::SheetNotFound)` - シートが存在しない場合
///
/// エラー時、`source`はこの関数内で解放されます。
pub(crate) fn open_sheet<'a, S>(
    mut source: S,
    sheet: &str,
    security: &SecurityConfig,
) -> Result<Box<dyn RowSource + 'a>, XlsxRecordError>
where
    S: Read + Seek + 'a,
{
    let start = source.stream_position()?;
    let end = source.seek(SeekFrom::End(0))?;
    security.check_input_size(end.saturating_sub(start))?;
    source.seek(SeekFrom::Start(start))?;

    let magic = read_magic(&mut source)?;
    source.seek(SeekFrom::Start(start))?;

    let format = detect_format(&magic).ok_or_else(|| {
        XlsxRecordError::UnsupportedFormat(
            "input is neither a ZIP package nor an OLE compound file".to_string(),
        )
    })?;
    debug!(%format, size = end.saturating_sub(start), "Container detected");

    match format {
        ContainerFormat::Xlsx => Ok(Box::new(package::open(source, sheet, security)?)),
        ContainerFormat::Xls => Ok(Box::new(legacy::open(source, sheet)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(&ZIP_MAGIC), Some(ContainerFormat::Xlsx));
        assert_eq!(detect_format(&OLE_MAGIC), Some(ContainerFormat::Xls));
        assert_eq!(detect_format(b"PK\x05\x06"), None);
        assert_eq!(detect_format(b"Name,Age"), None);
        assert_eq!(detect_format(&[]), None);
    }

    #[test]
    fn test_open_sheet_rejects_unknown_format() {
        let cursor = Cursor::new(b"Name,Age\nAnn,34\n".to_vec());
        let result = open_sheet(cursor, "Sheet1", &SecurityConfig::default());
        assert!(matches!(result, Err(XlsxRecordError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_open_sheet_rejects_oversized_input() {
        let security = SecurityConfig {
            max_input_file_size: 4,
            ..SecurityConfig::default()
        };
        let cursor = Cursor::new(vec![0u8; 16]);
        let result = open_sheet(cursor, "Sheet1", &security);
        assert!(matches!(result, Err(XlsxRecordError::SecurityViolation(_))));
    }

    #[test]
    fn test_read_magic_short_input() {
        let mut cursor = Cursor::new(vec![0x50, 0x4B]);
        assert_eq!(read_magic(&mut cursor).unwrap(), vec![0x50, 0x4B]);
    }
}
