//! Conversion Module
//!
//! セルの正規テキストを、フィールドの型に応じた値へ変換する型変換テーブル。
//! 対応する型は[`FieldType`]の閉じた列挙で表現され、`match`で網羅的に
//! 振り分けられます。

use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::api::DateSystem;
use crate::formatter::serial_to_datetime;
use crate::locale::Locale;
use crate::record::{FieldType, FieldValue};

/// 論理値`true`として受け付ける文字列（小文字化後に比較）
const TRUTHY: [&str; 3] = ["y", "yes", "1"];

/// 変換時の文脈
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConvertContext<'a> {
    pub locale: &'a Locale,
    pub date_system: DateSystem,
}

/// 変換の失敗
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConvertError {
    /// テキストが型の文法に合わない、または範囲外
    Format(String),
    /// 型に対応する変換戦略がない
    Unsupported,
}

/// 型に対応する変換戦略があるかどうか
pub(crate) fn is_supported(field_type: FieldType) -> bool {
    !matches!(field_type, FieldType::Custom(_))
}

/// テキストを指定した型の値に変換
///
/// # 引数
///
/// * `text` - セルの正規テキスト表現（空でないこと）
/// * `field_type` - 変換先の型
/// * `ctx` - ロケールと日付システム
///
/// # 戻り値
///
/// * `Ok(FieldValue)` - 変換された値
/// * `Err(ConvertError::Format)` - 文法違反または範囲外
/// * `Err(ConvertError::Unsupported)` - 変換戦略のない型
pub(crate) fn convert(
    text: &str,
    field_type: FieldType,
    ctx: &ConvertContext<'_>,
) -> Result<FieldValue, ConvertError> {
    let value = match field_type {
        FieldType::Text => FieldValue::Text(text.to_string()),
        FieldType::Boolean => FieldValue::Boolean(TRUTHY.contains(&text.to_lowercase().as_str())),
        FieldType::Char => FieldValue::Char(
            text.chars()
                .next()
                .ok_or_else(|| ConvertError::Format("empty text".to_string()))?,
        ),
        FieldType::Int8 => FieldValue::Int8(parse_integer(text, field_type)?),
        FieldType::Int16 => FieldValue::Int16(parse_integer(text, field_type)?),
        FieldType::Int32 => FieldValue::Int32(parse_integer(text, field_type)?),
        FieldType::Int64 => FieldValue::Int64(parse_integer(text, field_type)?),
        FieldType::UInt8 => FieldValue::UInt8(parse_integer(text, field_type)?),
        FieldType::UInt16 => FieldValue::UInt16(parse_integer(text, field_type)?),
        FieldType::UInt32 => FieldValue::UInt32(parse_integer(text, field_type)?),
        FieldType::UInt64 => FieldValue::UInt64(parse_integer(text, field_type)?),
        FieldType::Float32 => {
            let value: f32 = parse_float(text, ctx.locale)?;
            if !value.is_finite() {
                return Err(out_of_range(field_type));
            }
            FieldValue::Float32(value)
        }
        FieldType::Float64 => {
            let value: f64 = parse_float(text, ctx.locale)?;
            if !value.is_finite() {
                return Err(out_of_range(field_type));
            }
            FieldValue::Float64(value)
        }
        FieldType::Decimal => FieldValue::Decimal(parse_decimal(text, ctx.locale)?),
        FieldType::Date => FieldValue::Date(parse_datetime(text, ctx)?.date()),
        FieldType::DateTime => FieldValue::DateTime(parse_datetime(text, ctx)?),
        FieldType::Time => FieldValue::Time(parse_time(last_word(text), ctx.locale)?),
        FieldType::Duration => FieldValue::Duration(parse_duration(last_word(text), ctx.locale)?),
        FieldType::Custom(_) => return Err(ConvertError::Unsupported),
    };
    Ok(value)
}

/// 範囲外エラー
pub(crate) fn out_of_range(field_type: FieldType) -> ConvertError {
    ConvertError::Format(format!("out of range for {}", field_type))
}

/// 最後の空白より後ろの部分（日付部分の除去）
fn last_word(text: &str) -> &str {
    match text.rfind(' ') {
        Some(pos) => &text[pos + 1..],
        None => text,
    }
}

/// 整数の解析
///
/// 前後の空白、先頭の符号、10進数字のみを受け付けます。
fn parse_integer<T>(text: &str, field_type: FieldType) -> Result<T, ConvertError>
where
    T: TryFrom<i128>,
{
    let trimmed = text.trim();
    let (negative, digits) = split_sign(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConvertError::Format("invalid integer".to_string()));
    }

    let mut value: i128 = 0;
    for b in digits.bytes() {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(i128::from(b - b'0')))
            .ok_or_else(|| out_of_range(field_type))?;
    }
    if negative {
        value = -value;
    }
    T::try_from(value).map_err(|_| out_of_range(field_type))
}

fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (false, rest)
    } else {
        (false, text)
    }
}

/// ロケール依存の数値テキストを分解した結果
#[derive(Debug, Default, PartialEq, Eq)]
struct NumberParts {
    negative: bool,
    integer: String,
    fraction: String,
    exponent: Option<String>,
}

impl NumberParts {
    /// Rust標準の数値文法に沿った文字列
    fn canonical(&self) -> String {
        let mut out = String::new();
        if self.negative {
            out.push('-');
        }
        if self.integer.is_empty() {
            out.push('0');
        } else {
            out.push_str(&self.integer);
        }
        if !self.fraction.is_empty() {
            out.push('.');
            out.push_str(&self.fraction);
        }
        if let Some(exponent) = &self.exponent {
            out.push('e');
            out.push_str(exponent);
        }
        out
    }
}

/// ロケールの小数点記号・桁区切り記号に従って数値テキストを分解
///
/// 桁区切りは整数部でのみ受け付けます。
fn split_number(
    text: &str,
    locale: &Locale,
    allow_exponent: bool,
) -> Result<NumberParts, ConvertError> {
    let invalid = || ConvertError::Format("invalid number".to_string());
    let (negative, body) = split_sign(text.trim());

    let mut parts = NumberParts {
        negative,
        ..NumberParts::default()
    };
    let mut in_fraction = false;
    let mut chars = body.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            if in_fraction {
                parts.fraction.push(ch);
            } else {
                parts.integer.push(ch);
            }
        } else if ch == locale.decimal_separator && !in_fraction {
            in_fraction = true;
        } else if ch == locale.group_separator && !in_fraction && !parts.integer.is_empty() {
            // 桁区切りは読み飛ばす
        } else if allow_exponent && (ch == 'e' || ch == 'E') {
            let mut exponent = String::new();
            if let Some(&sign) = chars.peek() {
                if sign == '-' || sign == '+' {
                    exponent.push(sign);
                    chars.next();
                }
            }
            for digit in chars.by_ref() {
                if !digit.is_ascii_digit() {
                    return Err(invalid());
                }
                exponent.push(digit);
            }
            if exponent.trim_start_matches(['-', '+']).is_empty() {
                return Err(invalid());
            }
            parts.exponent = Some(exponent);
        } else {
            return Err(invalid());
        }
    }

    if parts.integer.is_empty() && parts.fraction.is_empty() {
        return Err(invalid());
    }
    Ok(parts)
}

fn parse_float<T: FromStr>(text: &str, locale: &Locale) -> Result<T, ConvertError> {
    split_number(text, locale, true)?
        .canonical()
        .parse::<T>()
        .map_err(|_| ConvertError::Format("invalid number".to_string()))
}

fn parse_decimal(text: &str, locale: &Locale) -> Result<Decimal, ConvertError> {
    let parts = split_number(text, locale, false)?;
    Decimal::from_str(&parts.canonical()).map_err(|_| out_of_range(FieldType::Decimal))
}

/// 日付・日時の解析
///
/// ロケールの日時フォーマット、日付フォーマットの順に試行し、
/// いずれにも一致しなければ日付シリアル値として解釈します。
fn parse_datetime(text: &str, ctx: &ConvertContext<'_>) -> Result<NaiveDateTime, ConvertError> {
    let trimmed = text.trim();

    for format in &ctx.locale.datetime_formats {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(datetime);
        }
    }
    for format in &ctx.locale.date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date.and_time(NaiveTime::MIN));
        }
    }

    let serial: f64 = parse_float(trimmed, ctx.locale)
        .map_err(|_| ConvertError::Format("not a recognized date".to_string()))?;
    serial_to_datetime(serial, ctx.date_system)
        .ok_or_else(|| ConvertError::Format("date serial out of range".to_string()))
}

fn parse_time(text: &str, locale: &Locale) -> Result<NaiveTime, ConvertError> {
    let trimmed = text.trim();
    locale
        .time_formats
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| ConvertError::Format("not a recognized time".to_string()))
}

/// 経過時間の解析
///
/// `[-][d.]h:mm[:ss[.fff]]`、または日数のみ（例: `3`）を受け付けます。
/// 秒の小数部にはロケールの小数点記号も使用できます。
fn parse_duration(text: &str, locale: &Locale) -> Result<Duration, ConvertError> {
    let invalid = || ConvertError::Format("not a recognized duration".to_string());
    let (negative, body) = split_sign(text.trim());

    let number = |s: &str, max: Option<i64>| -> Result<i64, ConvertError> {
        if s.is_empty() || s.len() > 9 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value = s.parse::<i64>().map_err(|_| invalid())?;
        match max {
            Some(max) if value > max => Err(ConvertError::Format(format!(
                "duration component {} out of range",
                value
            ))),
            _ => Ok(value),
        }
    };

    let components: Vec<&str> = body.split(':').collect();
    let millis = match components.as_slice() {
        [days] => number(days, None)? * 86_400_000,
        [head, minutes, rest @ ..] if rest.len() <= 1 => {
            let (days, hours) = match head.split_once('.') {
                Some((days, hours)) => (number(days, None)?, number(hours, Some(23))?),
                None => (0, number(head, Some(23))?),
            };
            let minutes = number(minutes, Some(59))?;
            let (seconds, fraction_ms) = match rest.first() {
                Some(seconds) => {
                    let (whole, fraction) = seconds
                        .split_once(['.', locale.decimal_separator])
                        .unwrap_or((*seconds, ""));
                    (number(whole, Some(59))?, fraction_millis(fraction)?)
                }
                None => (0, 0),
            };
            ((days * 24 + hours) * 60 + minutes) * 60_000 + seconds * 1000 + fraction_ms
        }
        _ => return Err(invalid()),
    };

    let millis = if negative { -millis } else { millis };
    Duration::try_milliseconds(millis).ok_or_else(invalid)
}

/// 秒の小数部（最大9桁）をミリ秒に変換
fn fraction_millis(fraction: &str) -> Result<i64, ConvertError> {
    if fraction.is_empty() {
        return Ok(0);
    }
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConvertError::Format("invalid fractional seconds".to_string()));
    }
    let padded = format!("{:0<9}", fraction);
    let nanos: i64 = padded
        .parse()
        .map_err(|_| ConvertError::Format("invalid fractional seconds".to_string()))?;
    Ok(nanos / 1_000_000)
}
