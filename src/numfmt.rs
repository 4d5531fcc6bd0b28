//! Number Format Module
//!
//! セルの数値書式が日付・時刻書式かどうかを判定するモジュール。
//! スタイルテーブルの`numFmtId`と書式コードから、数値セルを
//! `CellValue::DateTimeSerial`として扱うかを決定するために使用します。

/// ビルトイン書式IDが日付・時刻書式かどうか
///
/// 14-22、45-47は標準の日付・時刻書式、27-36、50-58は東アジア版Excelの
/// ロケール依存の日付・時刻書式です。`numFmts`で再定義されていないIDに使用します。
pub(crate) fn is_builtin_date_id(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// 書式コードが日付・時刻書式かどうかを判定
///
/// 引用符で囲まれたリテラル、`\`・`_`・`*`でエスケープされた文字、
/// `[Red]`などの角括弧内（`[h]`・`[mm]`・`[ss]`の経過時間表記を除く）は
/// 判定対象外です。それ以外に`y`・`m`・`d`・`h`・`s`が現れれば日付書式です。
///
/// # 引数
///
/// * `code` - 書式コード（例: `"yyyy-mm-dd"`、`"[Red]0.00"`）
pub(crate) fn is_date_format_code(code: &str) -> bool {
    let mut chars = code.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                for quoted in chars.by_ref() {
                    if quoted == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let mut inner = String::new();
                for bracketed in chars.by_ref() {
                    if bracketed == ']' {
                        break;
                    }
                    inner.push(bracketed.to_ascii_lowercase());
                }
                if !inner.is_empty() && inner.chars().all(|c| matches!(c, 'h' | 'm' | 's')) {
                    return true;
                }
            }
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_date_ids() {
        for id in [14, 15, 18, 22, 30, 45, 46, 47, 57] {
            assert!(is_builtin_date_id(id), "id {} should be a date format", id);
        }
        for id in [0, 1, 2, 9, 11, 37, 49, 164] {
            assert!(!is_builtin_date_id(id), "id {} should not be a date format", id);
        }
    }

    #[test]
    fn test_date_format_codes() {
        assert!(is_date_format_code("yyyy-mm-dd"));
        assert!(is_date_format_code("d/m/yy h:mm"));
        assert!(is_date_format_code("[h]:mm:ss"));
        assert!(is_date_format_code("[$-409]mmmm d, yyyy"));
        assert!(is_date_format_code("HH:MM"));
    }

    #[test]
    fn test_non_date_format_codes() {
        assert!(!is_date_format_code("General"));
        assert!(!is_date_format_code("0.00"));
        assert!(!is_date_format_code("#,##0_);[Red](#,##0)"));
        assert!(!is_date_format_code("0.00\" days\""));
        assert!(!is_date_format_code("\\d0"));
        assert!(!is_date_format_code("@"));
        assert!(!is_date_format_code("0.00E+00"));
    }
}
