//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use std::fmt;

/// ワークブックの日付システム
///
/// 日付シリアル値の起算日を表します。ワークブック全体で1つの設定です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateSystem {
    /// 1900年システム（デフォルト）
    ///
    /// シリアル値1 = 1900-01-01。Lotus 1-2-3互換のため1900-02-29が
    /// 存在するものとして扱われ、シリアル値60未満は1日ずれます。
    #[default]
    Excel1900,

    /// 1904年システム
    ///
    /// シリアル値0 = 1904-01-01。旧Mac版Excelで使用されます。
    Excel1904,
}

/// スプレッドシートコンテナの形式
///
/// 入力バイト列の先頭シグネチャから判定されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContainerFormat {
    /// ZIP + XMLパッケージ形式（.xlsx / .xlsm）
    Xlsx,

    /// OLE複合ファイルのレガシーバイナリ形式（.xls）
    Xls,
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::Xlsx => f.write_str("xlsx"),
            ContainerFormat::Xls => f.write_str("xls"),
        }
    }
}
