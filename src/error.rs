//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

use crate::record::FieldType;

/// xlsxrecordクレート全体で使用するエラー型
///
/// コンテナの読み込み、シートのデコード、ヘッダー解決、型変換の
/// すべての段階で発生するエラーを統一的に扱います。
/// いずれのエラーも致命的であり、発生した時点でパース全体が中断されます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxrecord::XlsxRecordError;
/// use std::fs::File;
///
/// fn open_input(path: &str) -> Result<File, XlsxRecordError> {
///     let file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(file)
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlsxRecordError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// レガシーバイナリ形式（.xls）の解析中に発生したエラー
    ///
    /// `#[from]`属性により、`calamine::Error`から自動的に変換されます。
    #[error("Failed to parse Excel file: {0}")]
    Parse(#[from] calamine::Error),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// パッケージ内XMLの解析エラー
    #[error("XML parse error: {0}")]
    Xml(String),

    /// 設定またはレコード定義の検証に失敗したエラー
    ///
    /// シート名が未指定の場合や、レコードの複数フィールドが
    /// 同じ正規化済み列名を宣言している場合などに発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 入力がサポート対象のスプレッドシートコンテナではない
    #[error("Unsupported container format: {0}")]
    UnsupportedFormat(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb、パストラバーサル、入力サイズ制限などに違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// 指定した名前のシートが存在しない
    ///
    /// シート名は大文字小文字を区別して完全一致で比較されます。
    #[error("Sheet '{sheet}' not found (available: {available:?})")]
    SheetNotFound {
        /// 要求されたシート名
        sheet: String,
        /// ワークブック内のシート名
        available: Vec<String>,
    },

    /// ヘッダー行を読み取る前にシートが終了した
    #[error("Sheet '{sheet}' is empty: no header row")]
    EmptySheet {
        /// シート名
        sheet: String,
    },

    /// セルのテキストを対象フィールドの型に変換できなかった
    ///
    /// # 例
    ///
    /// ```rust
    /// use xlsxrecord::{FieldType, XlsxRecordError};
    ///
    /// let error = XlsxRecordError::Conversion {
    ///     field: "age".to_string(),
    ///     raw: "abc".to_string(),
    ///     target: FieldType::Int32,
    ///     reason: "invalid digit".to_string(),
    /// };
    /// assert!(error.to_string().contains("'abc'"));
    /// ```
    #[error("Cannot convert '{raw}' to {target} for field '{field}': {reason}")]
    Conversion {
        /// フィールド名
        field: String,
        /// セルの正規テキスト表現
        raw: String,
        /// 変換先の型
        target: FieldType,
        /// 失敗理由
        reason: String,
    },

    /// フィールドの型に対応する変換戦略が存在しない
    #[error("Unsupported type {target} for field '{field}'")]
    UnsupportedType {
        /// フィールド名
        field: String,
        /// 宣言された型
        target: FieldType,
    },
}

impl XlsxRecordError {
    pub(crate) fn xml(err: impl std::fmt::Display) -> Self {
        XlsxRecordError::Xml(err.to_string())
    }

    pub(crate) fn zip(err: impl std::fmt::Display) -> Self {
        XlsxRecordError::Zip(err.to_string())
    }
}
