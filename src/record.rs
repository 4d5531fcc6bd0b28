//! Record Module
//!
//! 呼び出し側のレコード型と列名の対応付けを定義するモジュール。
//!
//! 実行時の型情報に頼らず、レコード型ごとに
//! （フィールド名, 正規化済み列名, 型）の一覧を構築時に宣言します。
//! 通常は[`record!`](crate::record!)マクロまたは
//! [`impl_record!`](crate::impl_record!)マクロで実装します。

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::error::XlsxRecordError;
use crate::header::normalize_name;

/// フィールドの意味的な型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 文字列
    Text,
    /// 論理値
    Boolean,
    /// 8ビット符号付き整数
    Int8,
    /// 16ビット符号付き整数
    Int16,
    /// 32ビット符号付き整数
    Int32,
    /// 64ビット符号付き整数
    Int64,
    /// 8ビット符号なし整数
    UInt8,
    /// 16ビット符号なし整数
    UInt16,
    /// 32ビット符号なし整数
    UInt32,
    /// 64ビット符号なし整数
    UInt64,
    /// 単精度浮動小数点数
    Float32,
    /// 倍精度浮動小数点数
    Float64,
    /// 10進数（`rust_decimal::Decimal`）
    Decimal,
    /// 1文字
    Char,
    /// 日付
    Date,
    /// 時刻
    Time,
    /// 経過時間
    Duration,
    /// 日時
    DateTime,
    /// 変換戦略を持たない独自型（名前のみ）
    Custom(&'static str),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Boolean => "bool",
            FieldType::Int8 => "i8",
            FieldType::Int16 => "i16",
            FieldType::Int32 => "i32",
            FieldType::Int64 => "i64",
            FieldType::UInt8 => "u8",
            FieldType::UInt16 => "u16",
            FieldType::UInt32 => "u32",
            FieldType::UInt64 => "u64",
            FieldType::Float32 => "f32",
            FieldType::Float64 => "f64",
            FieldType::Decimal => "decimal",
            FieldType::Char => "char",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Duration => "duration",
            FieldType::DateTime => "datetime",
            FieldType::Custom(name) => name,
        };
        f.write_str(name)
    }
}

/// 変換済みのフィールド値
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    Char(char),
    Date(NaiveDate),
    Time(NaiveTime),
    Duration(Duration),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    /// 値に対応するフィールド型
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Boolean(_) => FieldType::Boolean,
            FieldValue::Int8(_) => FieldType::Int8,
            FieldValue::Int16(_) => FieldType::Int16,
            FieldValue::Int32(_) => FieldType::Int32,
            FieldValue::Int64(_) => FieldType::Int64,
            FieldValue::UInt8(_) => FieldType::UInt8,
            FieldValue::UInt16(_) => FieldType::UInt16,
            FieldValue::UInt32(_) => FieldType::UInt32,
            FieldValue::UInt64(_) => FieldType::UInt64,
            FieldValue::Float32(_) => FieldType::Float32,
            FieldValue::Float64(_) => FieldType::Float64,
            FieldValue::Decimal(_) => FieldType::Decimal,
            FieldValue::Char(_) => FieldType::Char,
            FieldValue::Date(_) => FieldType::Date,
            FieldValue::Time(_) => FieldType::Time,
            FieldValue::Duration(_) => FieldType::Duration,
            FieldValue::DateTime(_) => FieldType::DateTime,
        }
    }
}

/// レコードの1フィールドの宣言
///
/// レコード型から一度だけ構築され、以後は変更されません。
/// 列名は構築時に正規化されます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// レコード上のフィールド名
    pub field: &'static str,

    /// 正規化済みの列名（空文字列は「列なし」）
    pub column: String,

    /// 変換先の型
    pub field_type: FieldType,

    /// `None`を取り得るかどうか
    pub nullable: bool,
}

impl FieldDescriptor {
    /// 列名を正規化してフィールド宣言を生成
    pub fn new(
        field: &'static str,
        column: &str,
        field_type: FieldType,
        nullable: bool,
    ) -> Self {
        Self {
            field,
            column: normalize_name(column),
            field_type,
            nullable,
        }
    }

    /// どの列にも対応しないフィールド
    pub fn unbound(field: &'static str, field_type: FieldType, nullable: bool) -> Self {
        Self {
            field,
            column: String::new(),
            field_type,
            nullable,
        }
    }

    /// 列に対応付け可能かどうか
    pub fn is_bound(&self) -> bool {
        !self.column.is_empty()
    }
}

/// シートの1行から構築されるレコード型
///
/// 空セルに対応するフィールドは`Default`の値のまま残ります。
pub trait Record: Default {
    /// フィールド宣言の一覧
    fn fields() -> Vec<FieldDescriptor>;

    /// 変換済みの値をフィールドに代入する
    ///
    /// 値の型がフィールドの型と一致しない場合は
    /// `XlsxRecordError::UnsupportedType`を返します。
    fn assign(&mut self, field: &str, value: FieldValue) -> Result<(), XlsxRecordError>;
}

/// Rustの型とフィールド型の対応
///
/// 独自型に実装する場合、既存の`FieldType`を選んで`from_field_value`で
/// 変換するか、`FieldType::Custom`を宣言します（後者は変換戦略がないため
/// パース開始時に`UnsupportedType`となります）。
pub trait FieldKind: Sized {
    /// 変換先の型
    const FIELD_TYPE: FieldType;

    /// `None`を取り得るかどうか
    const NULLABLE: bool = false;

    /// 変換済みの値から取り出す（型が一致しない場合は`None`）
    fn from_field_value(value: FieldValue) -> Option<Self>;
}

macro_rules! field_kind {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FieldKind for $ty {
                const FIELD_TYPE: FieldType = FieldType::$variant;

                fn from_field_value(value: FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

field_kind! {
    String => Text,
    bool => Boolean,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    char => Char,
    NaiveDate => Date,
    NaiveTime => Time,
    Duration => Duration,
    NaiveDateTime => DateTime,
}

impl<T: FieldKind> FieldKind for Option<T> {
    const FIELD_TYPE: FieldType = T::FIELD_TYPE;
    const NULLABLE: bool = true;

    fn from_field_value(value: FieldValue) -> Option<Self> {
        T::from_field_value(value).map(Some)
    }
}

/// 既存の構造体に`Record`を実装する
///
/// `フィールド名: 型 => "列名"`の形式で宣言します。`=> "列名"`を省略した
/// フィールドはどの列にも対応付けられません。
///
/// ```rust
/// use xlsxrecord::{impl_record, Record};
///
/// #[derive(Debug, Default)]
/// struct Person {
///     name: String,
///     age: Option<u32>,
///     note: String,
/// }
///
/// impl_record!(Person {
///     name: String => "Name",
///     age: Option<u32> => "Age",
///     note: String,
/// });
///
/// let fields = Person::fields();
/// assert_eq!(fields[0].column, "name");
/// assert!(fields[1].nullable);
/// assert!(!fields[2].is_bound());
/// ```
#[macro_export]
macro_rules! impl_record {
    ($name:ty { $($field:ident : $ty:ty $(=> $column:literal)?),* $(,)? }) => {
        impl $crate::Record for $name {
            fn fields() -> ::std::vec::Vec<$crate::FieldDescriptor> {
                ::std::vec![
                    $(
                        $crate::FieldDescriptor::new(
                            ::std::stringify!($field),
                            {
                                let column: &str = "";
                                $(let column: &str = $column;)?
                                column
                            },
                            <$ty as $crate::FieldKind>::FIELD_TYPE,
                            <$ty as $crate::FieldKind>::NULLABLE,
                        )
                    ),*
                ]
            }

            fn assign(
                &mut self,
                field: &str,
                value: $crate::FieldValue,
            ) -> ::std::result::Result<(), $crate::XlsxRecordError> {
                $(
                    if field == ::std::stringify!($field) {
                        self.$field = <$ty as $crate::FieldKind>::from_field_value(value)
                            .ok_or_else(|| $crate::XlsxRecordError::UnsupportedType {
                                field: field.to_string(),
                                target: <$ty as $crate::FieldKind>::FIELD_TYPE,
                            })?;
                        return ::std::result::Result::Ok(());
                    }
                )*
                ::std::result::Result::Err($crate::XlsxRecordError::Config(::std::format!(
                    "Unknown field '{}'",
                    field
                )))
            }
        }
    };
}

/// 構造体を宣言し、同時に`Record`を実装する
///
/// 構造体には`Default`が必要です（`#[derive(Default)]`を付けてください）。
///
/// ```rust
/// use xlsxrecord::record;
///
/// record! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Employee {
///         pub name: String => "Name",
///         pub age: i32 => "Age",
///         pub manager: Option<String> => "Manager Name",
///     }
/// }
///
/// let employee = Employee::default();
/// assert_eq!(employee.age, 0);
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($fvis:vis $field:ident : $ty:ty $(=> $column:literal)?),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($fvis $field: $ty),*
        }

        $crate::impl_record!($name { $($field : $ty $(=> $column)?),* });
    };
}
