//! Locale Module
//!
//! テキストから数値・日付・時刻へ変換する際の書式規則（ロケール）を定義するモジュール。
//! 設定ファイルから読み込めるよう、`serde`でシリアライズ可能です。

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::XlsxRecordError;

/// 変換時に使用するロケール
///
/// 小数点記号・桁区切り記号と、日付・日時・時刻として受け付ける
/// chrono互換のフォーマット文字列の一覧を保持します。
/// フォーマットは宣言順に試行されます。
///
/// # 使用例
///
/// ```rust
/// use xlsxrecord::Locale;
///
/// let locale = Locale::de_de();
/// assert_eq!(locale.decimal_separator, ',');
///
/// let custom = Locale::invariant()
///     .with_date_formats(["%d.%m.%Y"])
///     .with_decimal_separator(',');
/// assert_eq!(custom.date_formats, vec!["%d.%m.%Y".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    /// ロケール名（例: "de-DE"、インバリアントは空文字列）
    #[serde(default)]
    pub name: String,

    /// 小数点記号
    pub decimal_separator: char,

    /// 桁区切り記号
    pub group_separator: char,

    /// 日付フォーマット（例: `%Y-%m-%d`）
    pub date_formats: Vec<String>,

    /// 日時フォーマット（例: `%Y-%m-%d %H:%M:%S%.f`）
    pub datetime_formats: Vec<String>,

    /// 時刻フォーマット（例: `%H:%M:%S%.f`）
    pub time_formats: Vec<String>,
}

const ISO_DATE_FORMATS: &[&str] = &["%Y-%m-%d"];
const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const DEFAULT_TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

fn owned(formats: &[&str]) -> Vec<String> {
    formats.iter().map(|s| s.to_string()).collect()
}

fn with_iso(local: &[&str], iso: &[&str]) -> Vec<String> {
    local.iter().chain(iso.iter()).map(|s| s.to_string()).collect()
}

impl Default for Locale {
    fn default() -> Self {
        Self::invariant()
    }
}

impl Locale {
    /// インバリアントロケール（デフォルト）
    ///
    /// 小数点は`.`、桁区切りは`,`。ISO 8601と米国式の月/日/年を受け付けます。
    pub fn invariant() -> Self {
        Self {
            name: String::new(),
            decimal_separator: '.',
            group_separator: ',',
            date_formats: with_iso(
                &["%m/%d/%Y", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y"],
                ISO_DATE_FORMATS,
            ),
            datetime_formats: with_iso(
                &[
                    "%m/%d/%Y %H:%M:%S%.f",
                    "%m/%d/%Y %H:%M",
                    "%m/%d/%Y %I:%M:%S %p",
                    "%m/%d/%Y %I:%M %p",
                ],
                ISO_DATETIME_FORMATS,
            ),
            time_formats: owned(DEFAULT_TIME_FORMATS),
        }
    }

    /// 英語（米国）
    pub fn en_us() -> Self {
        Self {
            name: "en-US".to_string(),
            ..Self::invariant()
        }
    }

    /// ドイツ語（ドイツ）
    pub fn de_de() -> Self {
        Self {
            name: "de-DE".to_string(),
            decimal_separator: ',',
            group_separator: '.',
            date_formats: with_iso(&["%d.%m.%Y"], ISO_DATE_FORMATS),
            datetime_formats: with_iso(
                &["%d.%m.%Y %H:%M:%S%.f", "%d.%m.%Y %H:%M"],
                ISO_DATETIME_FORMATS,
            ),
            time_formats: owned(DEFAULT_TIME_FORMATS),
        }
    }

    /// フランス語（フランス）
    ///
    /// 桁区切りはノーブレークスペース（U+00A0）です。
    pub fn fr_fr() -> Self {
        Self {
            name: "fr-FR".to_string(),
            decimal_separator: ',',
            group_separator: '\u{a0}',
            date_formats: with_iso(&["%d/%m/%Y"], ISO_DATE_FORMATS),
            datetime_formats: with_iso(
                &["%d/%m/%Y %H:%M:%S%.f", "%d/%m/%Y %H:%M"],
                ISO_DATETIME_FORMATS,
            ),
            time_formats: owned(DEFAULT_TIME_FORMATS),
        }
    }

    /// 日本語（日本）
    pub fn ja_jp() -> Self {
        Self {
            name: "ja-JP".to_string(),
            decimal_separator: '.',
            group_separator: ',',
            date_formats: with_iso(&["%Y/%m/%d", "%Y年%m月%d日"], ISO_DATE_FORMATS),
            datetime_formats: with_iso(
                &["%Y/%m/%d %H:%M:%S%.f", "%Y/%m/%d %H:%M"],
                ISO_DATETIME_FORMATS,
            ),
            time_formats: with_iso(&["%H時%M分%S秒"], DEFAULT_TIME_FORMATS),
        }
    }

    /// 小数点記号を変更する
    pub fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    /// 桁区切り記号を変更する
    pub fn with_group_separator(mut self, separator: char) -> Self {
        self.group_separator = separator;
        self
    }

    /// 日付フォーマットの一覧を置き換える
    pub fn with_date_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// 日時フォーマットの一覧を置き換える
    pub fn with_datetime_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datetime_formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// 時刻フォーマットの一覧を置き換える
    pub fn with_time_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.time_formats = formats.into_iter().map(Into::into).collect();
        self
    }
}

impl FromStr for Locale {
    type Err = XlsxRecordError;

    /// ロケールタグから定義済みロケールを取得（大文字小文字、`-`/`_`を区別しない）
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let normalized = tag.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "" | "invariant" => Ok(Self::invariant()),
            "en" | "en-us" => Ok(Self::en_us()),
            "de" | "de-de" => Ok(Self::de_de()),
            "fr" | "fr-fr" => Ok(Self::fr_fr()),
            "ja" | "ja-jp" => Ok(Self::ja_jp()),
            _ => Err(XlsxRecordError::Config(format!("Unknown locale: '{}'", tag))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_invariant() {
        let locale = Locale::default();
        assert_eq!(locale, Locale::invariant());
        assert_eq!(locale.decimal_separator, '.');
        assert_eq!(locale.group_separator, ',');
        assert_eq!(locale.date_formats[0], "%m/%d/%Y");
        assert!(locale.date_formats.contains(&"%Y-%m-%d".to_string()));
    }

    #[test]
    fn test_presets() {
        let de = Locale::de_de();
        assert_eq!(de.name, "de-DE");
        assert_eq!(de.decimal_separator, ',');
        assert_eq!(de.date_formats[0], "%d.%m.%Y");

        let fr = Locale::fr_fr();
        assert_eq!(fr.group_separator, '\u{a0}');

        let ja = Locale::ja_jp();
        assert!(ja.date_formats.contains(&"%Y年%m月%d日".to_string()));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("de-DE".parse::<Locale>().unwrap(), Locale::de_de());
        assert_eq!("ja_jp".parse::<Locale>().unwrap(), Locale::ja_jp());
        assert_eq!("".parse::<Locale>().unwrap(), Locale::invariant());
        assert!(matches!(
            "xx-YY".parse::<Locale>(),
            Err(XlsxRecordError::Config(_))
        ));
    }

    #[test]
    fn test_builder_overrides() {
        let locale = Locale::invariant()
            .with_decimal_separator(',')
            .with_group_separator(' ')
            .with_time_formats(["%H.%M"]);
        assert_eq!(locale.decimal_separator, ',');
        assert_eq!(locale.group_separator, ' ');
        assert_eq!(locale.time_formats, vec!["%H.%M".to_string()]);
    }
}
