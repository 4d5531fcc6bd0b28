//! Security Module
//!
//! 入力コンテナに対するセキュリティ制限を実装するモジュール。
//! ZIP bomb攻撃、パストラバーサル攻撃、過大な入力への対策を提供します。

use std::io::{self, Read};

use thiserror::Error;

use crate::error::XlsxRecordError;

/// セキュリティ設定
///
/// コンテナを開く際のサイズ・件数の上限を定義します。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 2GB (2_147_483_648 bytes)
    pub max_input_file_size: u64,
    /// ZIPアーカイブ内の最大エントリ数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 単一エントリの展開後の最大サイズ（バイト）
    /// デフォルト: 1GB (1_073_741_824 bytes)
    pub max_entry_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_file_size: 2_147_483_648, // 2GB
            max_file_count: 10_000,
            max_entry_size: 1_073_741_824, // 1GB
        }
    }
}

impl SecurityConfig {
    /// 入力サイズの上限チェック
    pub fn check_input_size(&self, size: u64) -> Result<(), XlsxRecordError> {
        if size > self.max_input_file_size {
            return Err(XlsxRecordError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                size, self.max_input_file_size
            )));
        }
        Ok(())
    }

    /// ZIPエントリ数の上限チェック
    pub fn check_entry_count(&self, count: usize) -> Result<(), XlsxRecordError> {
        if count > self.max_file_count {
            return Err(XlsxRecordError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                count, self.max_file_count
            )));
        }
        Ok(())
    }

    /// 単一エントリのパスと展開後サイズのチェック
    pub fn check_entry(&self, name: &str, size: u64) -> Result<(), XlsxRecordError> {
        validate_zip_path(name)
            .map_err(|e| XlsxRecordError::SecurityViolation(format!("Invalid ZIP path: {}", e)))?;

        if size > self.max_entry_size {
            return Err(XlsxRecordError::SecurityViolation(format!(
                "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                name, size, self.max_entry_size
            )));
        }
        Ok(())
    }
}

/// 展開後のデータが上限を超えたことを示すエラー
#[derive(Debug, Error)]
#[error("Entry '{name}' expands beyond {limit} bytes")]
pub(crate) struct EntryLimitExceeded {
    pub name: String,
    pub limit: u64,
}

/// 読み取り量に上限を設ける`Read`アダプタ
///
/// `Read::take`と異なり、上限を超えるデータが残っている場合は
/// 切り詰めずに[`EntryLimitExceeded`]を返します。
pub(crate) struct LimitedReader<R> {
    inner: R,
    name: String,
    limit: u64,
    remaining: u64,
}

impl<R: Read> LimitedReader<R> {
    pub fn new(inner: R, name: impl Into<String>, limit: u64) -> Self {
        Self {
            inner,
            name: name.into(),
            limit,
            remaining: limit,
        }
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            let mut extra = [0u8; 1];
            return match self.inner.read(&mut extra)? {
                0 => Ok(0),
                _ => Err(io::Error::new(
                    io::ErrorKind::Other,
                    EntryLimitExceeded {
                        name: self.name.clone(),
                        limit: self.limit,
                    },
                )),
            };
        }

        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// I/Oエラーが上限超過によるものであれば、セキュリティ違反に変換
pub(crate) fn limit_violation(err: &io::Error) -> Option<XlsxRecordError> {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<EntryLimitExceeded>())
        .map(|exceeded| XlsxRecordError::SecurityViolation(exceeded.to_string()))
}

/// ファイルパスの検証
///
/// パストラバーサル攻撃を防ぐため、ZIPエントリ名を検証します。
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式の`C:\`やUnix形式の`/`で始まるパス）
    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_zip_path_valid() {
        assert!(validate_zip_path("xl/workbook.xml").is_ok());
        assert!(validate_zip_path("xl/worksheets/sheet1.xml").is_ok());
        assert!(validate_zip_path("[Content_Types].xml").is_ok());
    }

    #[test]
    fn test_validate_zip_path_rejects_unsafe() {
        assert!(validate_zip_path("").is_err());
        assert!(validate_zip_path("/etc/passwd").is_err());
        assert!(validate_zip_path("c:\\xl\\workbook.xml").is_err());
        assert!(validate_zip_path("xl/../../etc/passwd").is_err());
        assert!(validate_zip_path("..").is_err());
        assert!(validate_zip_path("xl\\workbook.xml").is_err());
    }

    #[test]
    fn test_check_input_size() {
        let config = SecurityConfig {
            max_input_file_size: 100,
            ..SecurityConfig::default()
        };
        assert!(config.check_input_size(100).is_ok());
        assert!(matches!(
            config.check_input_size(101),
            Err(XlsxRecordError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_check_entry() {
        let config = SecurityConfig {
            max_entry_size: 10,
            ..SecurityConfig::default()
        };
        assert!(config.check_entry("xl/workbook.xml", 10).is_ok());

        match config.check_entry("xl/sharedStrings.xml", 11) {
            Err(XlsxRecordError::SecurityViolation(msg)) => {
                assert!(msg.contains("exceeds maximum size"))
            }
            other => panic!("Expected SecurityViolation, got {:?}", other),
        }
        assert!(config.check_entry("../evil.xml", 1).is_err());
    }

    #[test]
    fn test_limited_reader_within_limit() {
        let mut reader = LimitedReader::new(&b"abcdef"[..], "xl/worksheets/sheet1.xml", 6);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abcdef");
    }

    #[test]
    fn test_limited_reader_rejects_excess() {
        let mut reader = LimitedReader::new(&b"abcdefgh"[..], "xl/worksheets/sheet1.xml", 4);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();

        match limit_violation(&err) {
            Some(XlsxRecordError::SecurityViolation(msg)) => {
                assert!(msg.contains("xl/worksheets/sheet1.xml"));
                assert!(msg.contains("4 bytes"));
            }
            other => panic!("Expected SecurityViolation, got {:?}", other),
        }
        assert!(limit_violation(&io::Error::new(io::ErrorKind::Other, "other")).is_none());
    }

    #[test]
    fn test_check_entry_count() {
        let config = SecurityConfig::default();
        assert!(config.check_entry_count(10_000).is_ok());
        assert!(config.check_entry_count(10_001).is_err());
    }
}
