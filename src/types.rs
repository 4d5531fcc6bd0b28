//! Types Module
//!
//! デコーダーが生成するセル値・行・セル座標の型を定義するモジュール。

/// デコード済みセルの値を表す列挙型
///
/// 常に1つのバリアントのみが有効です。`Number`と`DateTimeSerial`は
/// コンテナに格納されたIEEE-754倍精度値をそのまま保持します。
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 空セル
    Empty,

    /// 論理値
    Boolean(bool),

    /// 数値（f64）
    Number(f64),

    /// 文字列
    Text(String),

    /// 日付・時刻書式が適用された数値（日付シリアル値）
    DateTimeSerial(f64),

    /// エラー値（例: `#DIV/0!`）
    Error(String),
}

impl CellValue {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// デコード済みの1行
///
/// `cells`はシートの列インデックスに揃えられています。
/// 末尾の空セルは格納されないことがあるため、範囲外の列は`Empty`として扱います。
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 行インデックス（0始まり、シート上の位置）
    pub index: u32,

    /// 列インデックス順のセル値
    pub cells: Vec<CellValue>,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl Row {
    /// 空の行を生成
    pub fn new(index: u32) -> Self {
        Self {
            index,
            cells: Vec::new(),
        }
    }

    /// 列のセル値を取得（範囲外は`Empty`）
    pub fn get(&self, col: usize) -> &CellValue {
        self.cells.get(col).unwrap_or(&EMPTY_CELL)
    }

    /// 格納されている列数
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 格納されているセルがないかどうか
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 指定列にセル値を配置する（間の列は`Empty`で埋める）
    pub(crate) fn set(&mut self, col: usize, value: CellValue) {
        if col >= self.cells.len() {
            self.cells.resize(col + 1, CellValue::Empty);
        }
        self.cells[col] = value;
    }
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式のセル参照を座標に変換（例: "B3" -> (2, 1)）
    ///
    /// `$`による絶対参照記号は無視します。
    pub fn from_a1(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        let mut col: u32 = 0;
        let mut letters = 0;
        let mut digits = String::new();

        for ch in reference.chars() {
            match ch {
                '$' => {}
                'A'..='Z' | 'a'..='z' if digits.is_empty() => {
                    let value = (ch.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
                    col = col.checked_mul(26)?.checked_add(value)?;
                    letters += 1;
                }
                '0'..='9' => digits.push(ch),
                _ => return None,
            }
        }

        if letters == 0 || digits.is_empty() {
            return None;
        }

        let row = digits.parse::<u32>().ok()?.checked_sub(1)?;
        Some(Self::new(row, col - 1))
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        let col_str = Self::col_index_to_letter(self.col);
        format!("{}{}", col_str, self.row + 1)
    }

    /// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
    fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}
