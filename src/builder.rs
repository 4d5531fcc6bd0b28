//! Builder Module
//!
//! Fluent Builder APIを提供し、`SheetParser`インスタンスを段階的に構築する。

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::debug;

use crate::error::XlsxRecordError;
use crate::locale::Locale;
use crate::parser::open_sheet;
use crate::record::Record;
use crate::records::{RecordReader, SheetRows};
use crate::security::SecurityConfig;

/// 読み込み処理の設定を保持する内部構造体
#[derive(Debug, Clone, Default)]
pub(crate) struct ParseConfig {
    /// 対象シート名（大文字小文字を区別して完全一致）
    pub sheet_name: Option<String>,

    /// テキストセルの解釈に使用するロケール
    pub locale: Locale,

    /// セキュリティ制限
    pub security: SecurityConfig,
}

/// Fluent Builder APIを提供する構造体
///
/// `SheetParser`インスタンスを段階的に構築するためのビルダーです。
/// シート名以外の設定項目にはデフォルト値が設定されています。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxrecord::{Locale, ParserBuilder};
///
/// # fn main() -> Result<(), xlsxrecord::XlsxRecordError> {
/// let parser = ParserBuilder::new()
///     .with_sheet_name("Orders")
///     .with_locale(Locale::de_de())
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ParserBuilder {
    /// 内部設定（構築中）
    config: ParseConfig,
}

impl ParserBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - シート名: 未指定（`build`前に指定が必要）
    /// - ロケール: インバリアント
    /// - 入力サイズ上限: 2GB
    pub fn new() -> Self {
        Self::default()
    }

    /// 読み込み対象のシートを指定する
    ///
    /// # 引数
    ///
    /// * `name` - シート名（大文字小文字を区別して完全一致）
    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.sheet_name = Some(name.into());
        self
    }

    /// テキストセルの解釈に使用するロケールを指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxrecord::{Locale, ParserBuilder};
    ///
    /// let builder = ParserBuilder::new()
    ///     .with_sheet_name("Sheet1")
    ///     .with_locale(Locale::ja_jp());
    /// ```
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.config.locale = locale;
        self
    }

    /// 入力の最大サイズ（バイト）を指定する
    pub fn with_max_input_size(mut self, bytes: u64) -> Self {
        self.config.security.max_input_file_size = bytes;
        self
    }

    /// 設定を検証して`SheetParser`を構築する
    ///
    /// # 戻り値
    ///
    /// * `Ok(SheetParser)` - 構築に成功した場合
    /// * `Err(XlsxRecordError::Config)` - シート名が未指定・空の場合、または
    ///   ロケールの小数点と桁区切りが同じ文字の場合
    pub fn build(self) -> Result<SheetParser, XlsxRecordError> {
        let sheet = match self.config.sheet_name {
            Some(ref name) if !name.is_empty() => name.clone(),
            Some(_) => {
                return Err(XlsxRecordError::Config(
                    "Sheet name must not be empty".to_string(),
                ))
            }
            None => {
                return Err(XlsxRecordError::Config(
                    "Sheet name is required".to_string(),
                ))
            }
        };

        let locale = &self.config.locale;
        if locale.group_separator == locale.decimal_separator {
            return Err(XlsxRecordError::Config(format!(
                "Locale '{}' uses '{}' as both decimal and group separator",
                locale.name, locale.decimal_separator
            )));
        }

        if self.config.security.max_input_file_size == 0 {
            return Err(XlsxRecordError::Config(
                "Maximum input size must be greater than zero".to_string(),
            ));
        }

        Ok(SheetParser {
            sheet,
            config: self.config,
        })
    }
}

/// シートをレコード列として読み込む構造体
///
/// `ParserBuilder`で構築されます。1つのインスタンスで複数の入力を
/// 何度でも読み込めます。
#[derive(Debug, Clone)]
pub struct SheetParser {
    sheet: String,
    config: ParseConfig,
}

impl SheetParser {
    /// 対象シート名
    pub fn sheet_name(&self) -> &str {
        &self.sheet
    }

    /// テキストセルの解釈に使用するロケール
    pub fn locale(&self) -> &Locale {
        &self.config.locale
    }

    /// ファイルを開いてレコードを読み込む
    ///
    /// ファイルはイテレーターが終端に達した時点、エラーを返した時点、
    /// またはイテレーターが破棄された時点で閉じられます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxrecord::{record, ParserBuilder};
    ///
    /// record! {
    ///     #[derive(Debug, Default)]
    ///     struct Order {
    ///         id: u32 => "Order ID",
    ///         amount: f64 => "Amount",
    ///     }
    /// }
    ///
    /// # fn main() -> Result<(), xlsxrecord::XlsxRecordError> {
    /// let parser = ParserBuilder::new().with_sheet_name("Orders").build()?;
    /// let orders = parser
    ///     .parse_path::<Order, _>("orders.xlsx")?
    ///     .collect::<Result<Vec<_>, _>>()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse_path<T: Record, P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<RecordReader<'static, T>, XlsxRecordError> {
        let path = path.as_ref();
        debug!(path = %path.display(), sheet = %self.sheet, "Opening workbook file");
        let file = File::open(path)?;
        self.parse_owned(BufReader::new(file))
    }

    /// 借用した入力からレコードを読み込む
    ///
    /// 入力は呼び出し側が所有し続けます。イテレーターの破棄後は
    /// 同じ入力を別の用途に再利用できます。
    ///
    /// # 引数
    ///
    /// * `reader` - 入力（Read + Seekトレイトを実装）
    ///
    /// # 戻り値
    ///
    /// * `Ok(RecordReader)` - ヘッダー解決済みのイテレーター
    /// * `Err(XlsxRecordError::UnsupportedFormat)` - 未対応のコンテナ形式
    /// * `Err(XlsxRecordError::SheetNotFound)` - シートが存在しない場合
    /// * `Err(XlsxRecordError::EmptySheet)` - シートに行がない場合
    pub fn parse_reader<'a, T: Record, R: Read + Seek>(
        &self,
        reader: &'a mut R,
    ) -> Result<RecordReader<'a, T>, XlsxRecordError> {
        self.parse_owned(reader)
    }

    /// 入力の所有権を受け取ってレコードを読み込む
    ///
    /// 入力はエラー時にはこの関数内で、成功時にはイテレーターの
    /// 終端・エラー・破棄のいずれかの時点で解放されます。
    pub fn parse_owned<'a, T: Record, R: Read + Seek + 'a>(
        &self,
        reader: R,
    ) -> Result<RecordReader<'a, T>, XlsxRecordError> {
        let source = open_sheet(reader, &self.sheet, &self.config.security)?;
        RecordReader::open(source, &self.sheet, self.config.locale.clone())
    }

    /// 型変換を行わずにデコード済みの行を読み込む
    ///
    /// ヘッダー行も1行目として返されます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use std::fs::File;
    /// use xlsxrecord::ParserBuilder;
    ///
    /// # fn main() -> Result<(), xlsxrecord::XlsxRecordError> {
    /// let parser = ParserBuilder::new().with_sheet_name("Sheet1").build()?;
    /// for row in parser.rows(File::open("example.xlsx")?)? {
    ///     println!("{:?}", row?.cells);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn rows<'a, R: Read + Seek + 'a>(
        &self,
        reader: R,
    ) -> Result<SheetRows<'a>, XlsxRecordError> {
        let source = open_sheet(reader, &self.sheet, &self.config.security)?;
        Ok(SheetRows::new(source, &self.sheet))
    }
}
