//! Header Module
//!
//! シートの先頭行（ヘッダー行）とレコードのフィールド宣言を突き合わせ、
//! フィールドから列インデックスへの対応表を構築するモジュール。

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::api::DateSystem;
use crate::error::XlsxRecordError;
use crate::formatter::render_text;
use crate::record::FieldDescriptor;
use crate::types::Row;

/// 列名の正規化
///
/// 前後の空白を除去して小文字化し、内部の空白と`\`・`/`・`_`を取り除きます。
/// 冪等です（正規化済みの文字列を再度正規化しても変化しません）。
///
/// ```rust
/// use xlsxrecord::normalize_name;
///
/// assert_eq!(normalize_name(" First Name "), "firstname");
/// assert_eq!(normalize_name("first_name"), "firstname");
/// assert_eq!(normalize_name("FIRST/NAME"), "firstname");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '\\' | '/' | '_'))
        .collect()
}

/// フィールドと列の対応
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColumnBinding {
    /// フィールド宣言のインデックス
    pub field: usize,
    /// 列インデックス（0始まり）
    pub column: usize,
}

/// ヘッダー解決の結果
///
/// パースごとに一度だけ構築され、以後は変更されません。
/// すべての列インデックスはシートの列数未満であり、
/// 1つの列が複数のフィールドに割り当てられることはありません。
/// ヘッダーに一致しなかったフィールドは単に含まれません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    bindings: Vec<ColumnBinding>,
    column_count: usize,
}

impl HeaderMap {
    /// フィールド宣言のインデックスから列インデックスを取得
    pub fn column_of(&self, field: usize) -> Option<usize> {
        self.bindings
            .iter()
            .find(|binding| binding.field == field)
            .map(|binding| binding.column)
    }

    /// 対応付けられたフィールド数
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// 対応付けられたフィールドがないかどうか
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// シートの列数
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// （フィールド宣言のインデックス, 列インデックス）を列順に列挙
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.bindings
            .iter()
            .map(|binding| (binding.field, binding.column))
    }
}

/// ヘッダー行からフィールドと列の対応表を構築
///
/// ヘッダーセルを左から走査し、正規化したテキストがフィールドの
/// 正規化済み列名と一致した最初の列を割り当てます。
/// 同じ名前に正規化される列が後に現れた場合は無視されます（警告ログのみ）。
///
/// # 引数
///
/// * `header` - シートの先頭行
/// * `fields` - レコードのフィールド宣言
/// * `column_count` - シートの列数
/// * `date_system` - ヘッダーセルのテキスト化に使用する日付システム
///
/// # 戻り値
///
/// * `Ok(HeaderMap)` - 構築された対応表
/// * `Err(XlsxRecordError::Config)` - 複数のフィールドが同じ列名を宣言している場合
pub(crate) fn resolve(
    header: &Row,
    fields: &[FieldDescriptor],
    column_count: usize,
    date_system: DateSystem,
) -> Result<HeaderMap, XlsxRecordError> {
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (index, field) in fields.iter().enumerate() {
        if !field.is_bound() {
            continue;
        }
        if let Some(previous) = by_name.insert(field.column.as_str(), index) {
            return Err(XlsxRecordError::Config(format!(
                "Fields '{}' and '{}' both bind column '{}'",
                fields[previous].field, field.field, field.column
            )));
        }
    }

    let mut bindings: Vec<ColumnBinding> = Vec::new();
    let scan = column_count.min(header.len());
    for column in 0..scan {
        let name = normalize_name(&render_text(header.get(column), date_system));
        if name.is_empty() {
            continue;
        }
        let Some(&field) = by_name.get(name.as_str()) else {
            continue;
        };
        if let Some(existing) = bindings.iter().find(|binding| binding.field == field) {
            warn!(
                header = %name,
                kept_column = existing.column,
                ignored_column = column,
                "Duplicate header column ignored"
            );
            continue;
        }
        bindings.push(ColumnBinding { field, column });
    }

    for (index, field) in fields.iter().enumerate() {
        if !bindings.iter().any(|binding| binding.field == index) {
            debug!(field = field.field, column = %field.column, "Field not bound to any column");
        }
    }
    debug!(
        bound = bindings.len(),
        declared = fields.len(),
        column_count,
        "Header resolved"
    );

    Ok(HeaderMap {
        bindings,
        column_count,
    })
}
