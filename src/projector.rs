//! Projector Module
//!
//! デコード済みの行を、ヘッダー対応表に従ってレコード型へ写像するモジュール。

use rust_decimal::Decimal;

use crate::convert::{convert, out_of_range, ConvertContext, ConvertError};
use crate::error::XlsxRecordError;
use crate::formatter::{render_text, serial_to_datetime, serial_to_duration};
use crate::header::HeaderMap;
use crate::record::{FieldDescriptor, FieldType, FieldValue, Record};
use crate::types::{CellValue, Row};

/// 対応付けられた列がすべて空セルかどうか
///
/// 対応表に含まれない列は判定に使用しません。
/// 空文字列のテキストセルはデータとして扱います。
pub(crate) fn is_blank(row: &Row, header: &HeaderMap) -> bool {
    header.iter().all(|(_, column)| row.get(column).is_empty())
}

/// セルの値をテキストを経由せずにフィールドの型へ取り出す
///
/// 数値セルはロケールに依存しないよう、浮動小数点値から直接変換します。
/// 直接変換できない組み合わせでは`None`を返します。
fn native_value(
    cell: &CellValue,
    field_type: FieldType,
    ctx: &ConvertContext<'_>,
) -> Option<Result<FieldValue, ConvertError>> {
    let value = match (cell, field_type) {
        (CellValue::Text(s), FieldType::Text) => FieldValue::Text(s.clone()),
        (CellValue::Boolean(b), FieldType::Boolean) => FieldValue::Boolean(*b),
        (CellValue::Number(n), FieldType::Float64) => FieldValue::Float64(*n),
        (CellValue::Number(n), FieldType::Float32) => {
            if !n.is_finite() || n.abs() > f32::MAX as f64 {
                return Some(Err(out_of_range(field_type)));
            }
            FieldValue::Float32(*n as f32)
        }
        (CellValue::Number(n), FieldType::Decimal) => match Decimal::try_from(*n) {
            Ok(decimal) => FieldValue::Decimal(decimal),
            Err(_) => return Some(Err(out_of_range(field_type))),
        },
        (CellValue::Number(serial) | CellValue::DateTimeSerial(serial), _) => {
            return serial_value(*serial, field_type, ctx);
        }
        _ => return None,
    };
    Some(Ok(value))
}

/// 日付シリアル値を日付・時刻系の型へ変換
fn serial_value(
    serial: f64,
    field_type: FieldType,
    ctx: &ConvertContext<'_>,
) -> Option<Result<FieldValue, ConvertError>> {
    let value = match field_type {
        FieldType::Date => {
            serial_to_datetime(serial, ctx.date_system).map(|dt| FieldValue::Date(dt.date()))
        }
        FieldType::DateTime => {
            serial_to_datetime(serial, ctx.date_system).map(FieldValue::DateTime)
        }
        FieldType::Time => serial_to_datetime(serial.rem_euclid(1.0), ctx.date_system)
            .map(|dt| FieldValue::Time(dt.time())),
        FieldType::Duration => serial_to_duration(serial).map(FieldValue::Duration),
        _ => return None,
    };
    Some(value.ok_or_else(|| ConvertError::Format("date serial out of range".to_string())))
}

/// 1行をレコードに変換
///
/// 空セルに対応するフィールドは既定値のまま残ります。
/// セルの型がフィールドの型と一致すれば直接代入し、それ以外は
/// 正規テキストを経由して型変換テーブルで変換します。
///
/// # 戻り値
///
/// * `Ok(T)` - 変換されたレコード
/// * `Err(XlsxRecordError::Conversion)` - 変換に失敗したセルがある場合
/// * `Err(XlsxRecordError::UnsupportedType)` - 変換戦略のない型の場合
pub(crate) fn project<T: Record>(
    row: &Row,
    fields: &[FieldDescriptor],
    header: &HeaderMap,
    ctx: &ConvertContext<'_>,
) -> Result<T, XlsxRecordError> {
    let mut record = T::default();

    for (field_index, column) in header.iter() {
        let Some(descriptor) = fields.get(field_index) else {
            continue;
        };
        let cell = row.get(column);
        if cell.is_empty() {
            continue;
        }

        let converted = match native_value(cell, descriptor.field_type, ctx) {
            Some(result) => result,
            None => {
                let text = render_text(cell, ctx.date_system);
                if text.is_empty() && descriptor.field_type != FieldType::Text {
                    continue;
                }
                convert(&text, descriptor.field_type, ctx)
            }
        };
        let value = converted.map_err(|e| match e {
            ConvertError::Format(reason) => XlsxRecordError::Conversion {
                field: descriptor.field.to_string(),
                raw: render_text(cell, ctx.date_system),
                target: descriptor.field_type,
                reason,
            },
            ConvertError::Unsupported => XlsxRecordError::UnsupportedType {
                field: descriptor.field.to_string(),
                target: descriptor.field_type,
            },
        })?;

        record.assign(descriptor.field, value)?;
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DateSystem;
    use crate::header::resolve;
    use crate::locale::Locale;
    use chrono::{Duration, NaiveDate, NaiveTime};

    crate::record! {
        #[derive(Debug, Default, PartialEq)]
        struct Person {
            name: String => "Name",
            age: i32 => "Age",
            score: Option<f64> => "Score",
            joined: Option<NaiveDate> => "Joined",
            active: bool => "Active",
        }
    }

    fn row(index: u32, cells: Vec<CellValue>) -> Row {
        Row { index, cells }
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn header() -> (Vec<FieldDescriptor>, HeaderMap) {
        let fields = Person::fields();
        let header_row = row(
            0,
            vec![
                text("Name"),
                text("Age"),
                text("Score"),
                text("Joined"),
                text("Active"),
                text("Ignored"),
            ],
        );
        let map = resolve(&header_row, &fields, 6, DateSystem::Excel1900).unwrap();
        (fields, map)
    }

    fn project_person(cells: Vec<CellValue>) -> Result<Person, XlsxRecordError> {
        let (fields, map) = header();
        let locale = Locale::invariant();
        let ctx = ConvertContext {
            locale: &locale,
            date_system: DateSystem::Excel1900,
        };
        project(&row(1, cells), &fields, &map, &ctx)
    }

    #[test]
    fn test_is_blank_considers_mapped_columns_only() {
        let (_, map) = header();
        let unmapped_only = row(
            1,
            vec![
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty,
                text("data"),
            ],
        );
        assert!(is_blank(&unmapped_only, &map));
        assert!(is_blank(&row(2, vec![]), &map));
        assert!(!is_blank(&row(3, vec![text("")]), &map));
        assert!(!is_blank(&row(4, vec![CellValue::Empty, CellValue::Number(0.0)]), &map));
    }

    #[test]
    fn test_project_converts_via_text() {
        let person = project_person(vec![
            text("Ann"),
            text("34"),
            CellValue::Number(9.5),
            CellValue::DateTimeSerial(45366.0),
            text("Yes"),
        ])
        .unwrap();

        assert_eq!(
            person,
            Person {
                name: "Ann".to_string(),
                age: 34,
                score: Some(9.5),
                joined: NaiveDate::from_ymd_opt(2024, 3, 15),
                active: true,
            }
        );
    }

    #[test]
    fn test_project_number_to_integer() {
        let person = project_person(vec![text("Bob"), CellValue::Number(41.0)]).unwrap();
        assert_eq!(person.age, 41);
        assert_eq!(person.score, None);
        assert_eq!(person.joined, None);
        assert!(!person.active);
    }

    #[test]
    fn test_project_empty_text_keeps_default() {
        let person = project_person(vec![text(""), text("")]).unwrap();
        assert_eq!(person.name, "");
        assert_eq!(person.age, 0);
    }

    #[test]
    fn test_project_conversion_error() {
        let error = project_person(vec![text("Ann"), CellValue::Number(1.5)]).unwrap_err();
        match error {
            XlsxRecordError::Conversion {
                field, raw, target, ..
            } => {
                assert_eq!(field, "age");
                assert_eq!(raw, "1.5");
                assert_eq!(target, FieldType::Int32);
            }
            other => panic!("Expected Conversion, got {:?}", other),
        }
    }

    #[test]
    fn test_project_error_cell_reports_code() {
        let error =
            project_person(vec![text("Ann"), CellValue::Error("#N/A".to_string())]).unwrap_err();
        assert!(matches!(
            error,
            XlsxRecordError::Conversion { ref raw, .. } if raw == "#N/A"
        ));
    }

    #[test]
    fn test_native_time_and_duration() {
        let locale = Locale::invariant();
        let ctx = ConvertContext {
            locale: &locale,
            date_system: DateSystem::Excel1900,
        };
        let cell = CellValue::DateTimeSerial(45366.75);
        assert_eq!(
            native_value(&cell, FieldType::Time, &ctx),
            Some(Ok(FieldValue::Time(NaiveTime::from_hms_opt(18, 0, 0).unwrap())))
        );
        assert_eq!(
            native_value(&CellValue::DateTimeSerial(1.25), FieldType::Duration, &ctx),
            Some(Ok(FieldValue::Duration(Duration::hours(30))))
        );
        assert_eq!(native_value(&CellValue::Number(1.0), FieldType::Int32, &ctx), None);
    }

    #[test]
    fn test_native_numbers_ignore_locale_separators() {
        for locale in [Locale::de_de(), Locale::fr_fr()] {
            let ctx = ConvertContext {
                locale: &locale,
                date_system: DateSystem::Excel1900,
            };
            assert_eq!(
                native_value(&CellValue::Number(1234.5), FieldType::Decimal, &ctx),
                Some(Ok(FieldValue::Decimal(Decimal::new(12345, 1))))
            );
            assert_eq!(
                native_value(&CellValue::Number(1.5), FieldType::Float32, &ctx),
                Some(Ok(FieldValue::Float32(1.5)))
            );
            assert_eq!(
                native_value(&CellValue::Number(45366.5), FieldType::Date, &ctx),
                Some(Ok(FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())))
            );
        }
    }

    #[test]
    fn test_native_number_out_of_range() {
        let locale = Locale::invariant();
        let ctx = ConvertContext {
            locale: &locale,
            date_system: DateSystem::Excel1900,
        };
        assert!(matches!(
            native_value(&CellValue::Number(1e300), FieldType::Float32, &ctx),
            Some(Err(ConvertError::Format(_)))
        ));
        assert!(matches!(
            native_value(&CellValue::Number(-1.0e7), FieldType::Date, &ctx),
            Some(Err(ConvertError::Format(_)))
        ));
    }
}
