//! Formatter Module
//!
//! 日付シリアル値と日時の相互変換、およびセル値の正規テキスト表現を
//! 提供するモジュール。

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::api::DateSystem;
use crate::types::CellValue;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// 正規テキスト表現で使用する日時フォーマット
pub(crate) const CANONICAL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// 日付システムの起算日
///
/// - 1900年システム: 1899年12月30日起算（シリアル値60未満は1日補正）
/// - 1904年システム: 1904年1月1日起算
fn epoch(system: DateSystem) -> NaiveDate {
    match system {
        DateSystem::Excel1900 => NaiveDate::from_ymd_opt(1899, 12, 30),
        DateSystem::Excel1904 => NaiveDate::from_ymd_opt(1904, 1, 1),
    }
    .unwrap_or_default()
}

/// 日付シリアル値を日時に変換
///
/// 時刻部分はミリ秒単位に丸められます。
///
/// # 引数
///
/// * `serial` - 日付シリアル値（整数部が日数、小数部が時刻）
/// * `system` - ワークブックの日付システム
///
/// # 戻り値
///
/// 負数・非有限値・9999-12-31より後の値は`None`
///
/// # 1900年システムのうるう年
///
/// 1900年システムでは存在しない1900-02-29がシリアル値60に割り当てられています。
/// シリアル値60未満は1日後ろにずらすことで、1 = 1900-01-01、61 = 1900-03-01を
/// 満たします（60は1900-02-28として扱います）。
pub(crate) fn serial_to_datetime(serial: f64, system: DateSystem) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }

    let total_ms = (serial * MILLIS_PER_DAY).round();
    if total_ms > i64::MAX as f64 {
        return None;
    }
    let total_ms = total_ms as i64;
    let mut days = total_ms.div_euclid(MILLIS_PER_DAY as i64);
    let millis = total_ms.rem_euclid(MILLIS_PER_DAY as i64);

    if system == DateSystem::Excel1900 && days < 60 {
        days += 1;
    }

    let date = epoch(system).checked_add_signed(Duration::try_days(days)?)?;
    if date > NaiveDate::from_ymd_opt(9999, 12, 31)? {
        return None;
    }

    let time = NaiveTime::from_num_seconds_from_midnight_opt(
        (millis / 1000) as u32,
        ((millis % 1000) * 1_000_000) as u32,
    )?;
    Some(date.and_time(time))
}

/// 日時を日付シリアル値に変換
///
/// [`serial_to_datetime`]の逆変換です。
pub(crate) fn datetime_to_serial(datetime: NaiveDateTime, system: DateSystem) -> f64 {
    let mut days = datetime.date().signed_duration_since(epoch(system)).num_days();
    if system == DateSystem::Excel1900 && days <= 60 {
        days -= 1;
    }
    days as f64 + time_to_fraction(datetime.time())
}

/// 時刻を1日に対する割合に変換
pub(crate) fn time_to_fraction(time: NaiveTime) -> f64 {
    let millis = time.num_seconds_from_midnight() as f64 * 1000.0
        + (time.nanosecond() / 1_000_000) as f64;
    millis / MILLIS_PER_DAY
}

/// 日付シリアル値を経過時間として解釈（ミリ秒単位）
pub(crate) fn serial_to_duration(serial: f64) -> Option<Duration> {
    if !serial.is_finite() {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

/// セル値の正規テキスト表現
///
/// 型変換テーブルへ渡す前の文字列化に使用します。
///
/// | セル値 | 表現 |
/// |--------|------|
/// | 空セル | 空文字列 |
/// | 論理値 | `TRUE` / `FALSE` |
/// | 整数値の数値 | 小数部なし（例: `34`） |
/// | その他の数値 | 最短の往復可能表現（例: `0.1`） |
/// | 日付シリアル値 | `2024-03-15 10:30:00` |
/// | エラー値 | エラーコード（例: `#DIV/0!`） |
pub(crate) fn render_text(cell: &CellValue, system: DateSystem) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Boolean(true) => "TRUE".to_string(),
        CellValue::Boolean(false) => "FALSE".to_string(),
        CellValue::Number(n) => render_number(*n),
        CellValue::Text(s) => s.clone(),
        CellValue::DateTimeSerial(serial) => match serial_to_datetime(*serial, system) {
            Some(datetime) => datetime.format(CANONICAL_DATETIME_FORMAT).to_string(),
            None => render_number(*serial),
        },
        CellValue::Error(code) => code.clone(),
    }
}

fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_serial_to_datetime_1900() {
        let system = DateSystem::Excel1900;
        assert_eq!(
            serial_to_datetime(1.0, system),
            Some(datetime(1900, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            serial_to_datetime(59.0, system),
            Some(datetime(1900, 2, 28, 0, 0, 0))
        );
        assert_eq!(
            serial_to_datetime(61.0, system),
            Some(datetime(1900, 3, 1, 0, 0, 0))
        );
        assert_eq!(
            serial_to_datetime(45366.0, system),
            Some(datetime(2024, 3, 15, 0, 0, 0))
        );
        assert_eq!(
            serial_to_datetime(45366.4375, system),
            Some(datetime(2024, 3, 15, 10, 30, 0))
        );
    }

    #[test]
    fn test_serial_to_datetime_1904() {
        let system = DateSystem::Excel1904;
        assert_eq!(
            serial_to_datetime(0.0, system),
            Some(datetime(1904, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            serial_to_datetime(43904.0, system),
            Some(datetime(2024, 3, 15, 0, 0, 0))
        );
    }

    #[test]
    fn test_serial_to_datetime_out_of_range() {
        let system = DateSystem::Excel1900;
        assert_eq!(serial_to_datetime(-1.0, system), None);
        assert_eq!(serial_to_datetime(f64::NAN, system), None);
        assert_eq!(serial_to_datetime(f64::INFINITY, system), None);
        assert_eq!(serial_to_datetime(3_000_000.0, system), None);
    }

    #[test]
    fn test_serial_rounds_to_millisecond() {
        let almost_midnight = 45366.0 + 0.999_999_999_9;
        assert_eq!(
            serial_to_datetime(almost_midnight, DateSystem::Excel1900),
            Some(datetime(2024, 3, 16, 0, 0, 0))
        );
    }

    #[test]
    fn test_datetime_to_serial() {
        let system = DateSystem::Excel1900;
        assert_eq!(datetime_to_serial(datetime(1900, 1, 1, 0, 0, 0), system), 1.0);
        assert_eq!(datetime_to_serial(datetime(1900, 3, 1, 0, 0, 0), system), 61.0);
        assert_eq!(
            datetime_to_serial(datetime(2024, 3, 15, 12, 0, 0), system),
            45366.5
        );
        assert_eq!(
            datetime_to_serial(datetime(1904, 1, 2, 0, 0, 0), DateSystem::Excel1904),
            1.0
        );
    }

    #[test]
    fn test_serial_to_duration() {
        assert_eq!(serial_to_duration(1.5), Some(Duration::hours(36)));
        assert_eq!(serial_to_duration(-0.25), Some(Duration::hours(-6)));
        assert_eq!(serial_to_duration(f64::NAN), None);
    }

    #[test]
    fn test_render_text() {
        let system = DateSystem::Excel1900;
        assert_eq!(render_text(&CellValue::Empty, system), "");
        assert_eq!(render_text(&CellValue::Boolean(true), system), "TRUE");
        assert_eq!(render_text(&CellValue::Boolean(false), system), "FALSE");
        assert_eq!(render_text(&CellValue::Number(34.0), system), "34");
        assert_eq!(render_text(&CellValue::Number(-0.0), system), "0");
        assert_eq!(render_text(&CellValue::Number(0.1), system), "0.1");
        assert_eq!(render_text(&CellValue::Number(1e20), system), "100000000000000000000");
        assert_eq!(
            render_text(&CellValue::Text(" a ".to_string()), system),
            " a "
        );
        assert_eq!(
            render_text(&CellValue::DateTimeSerial(45366.4375), system),
            "2024-03-15 10:30:00"
        );
        assert_eq!(
            render_text(&CellValue::Error("#DIV/0!".to_string()), system),
            "#DIV/0!"
        );
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_serial_round_trip_1900(days in 1i64..2_958_465, millis in 0i64..86_400_000) {
                let serial = days as f64 + millis as f64 / MILLIS_PER_DAY;
                prop_assume!(days != 60);
                let dt = serial_to_datetime(serial, DateSystem::Excel1900).unwrap();
                let back = datetime_to_serial(dt, DateSystem::Excel1900);
                prop_assert_eq!(serial_to_datetime(back, DateSystem::Excel1900), Some(dt));
                prop_assert_eq!(back.floor() as i64, days);
            }

            #[test]
            fn test_serial_monotonic_1904(a in 0.0f64..2_000_000.0, b in 0.0f64..2_000_000.0) {
                let da = serial_to_datetime(a, DateSystem::Excel1904).unwrap();
                let db = serial_to_datetime(b, DateSystem::Excel1904).unwrap();
                if a <= b {
                    prop_assert!(da <= db);
                } else {
                    prop_assert!(da >= db);
                }
            }
        }
    }
}
