//! パフォーマンスベンチマーク
//!
//! このモジュールは、xlsxrecordクレートの読み込み性能を測定するためのベンチマークを提供します。
//! フィクスチャはrust_xlsxwriterでメモリ上に生成します。
//!
//! 実装するベンチマーク:
//! - レコード変換（共有文字列・数値・日付の混在した表）
//! - 型変換を行わない行デコード
//!
//! メモリ使用量の測定は別途、valgrindやheaptrackなどのツールを使用してください。

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use xlsxrecord::{record, ParserBuilder};

record! {
    #[derive(Debug, Default)]
    struct Order {
        id: u32 => "Order ID",
        customer: String => "Customer",
        amount: f64 => "Amount",
        shipped: Option<chrono::NaiveDate> => "Shipped",
        priority: bool => "Priority",
    }
}

/// 指定行数の注文表を生成
fn generate_orders(rows: u32) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Orders").unwrap();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    for (col, header) in ["Order ID", "Customer", "Amount", "Shipped", "Priority"]
        .iter()
        .enumerate()
    {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }

    let shipped = ExcelDateTime::from_ymd(2024, 6, 1).unwrap();
    for row in 1..=rows {
        worksheet.write_number(row, 0, row).unwrap();
        worksheet
            .write_string(row, 1, format!("Customer {}", row % 500))
            .unwrap();
        worksheet.write_number(row, 2, row as f64 * 1.25).unwrap();
        if row % 3 != 0 {
            worksheet
                .write_datetime_with_format(row, 3, &shipped, &date_format)
                .unwrap();
        }
        worksheet
            .write_string(row, 4, if row % 7 == 0 { "yes" } else { "no" })
            .unwrap();
    }

    workbook.save_to_buffer().unwrap()
}

/// レコード変換のベンチマーク
fn benchmark_records(c: &mut Criterion) {
    let parser = ParserBuilder::new().with_sheet_name("Orders").build().unwrap();

    let mut group = c.benchmark_group("records");
    for rows in [1_000u32, 10_000] {
        let data = generate_orders(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| {
                let mut cursor = Cursor::new(black_box(data.as_slice()));
                let count = parser
                    .parse_reader::<Order, _>(&mut cursor)
                    .unwrap()
                    .map(|order| order.unwrap())
                    .count();
                black_box(count)
            });
        });
    }
    group.finish();
}

/// 行デコードのみのベンチマーク
fn benchmark_raw_rows(c: &mut Criterion) {
    let parser = ParserBuilder::new().with_sheet_name("Orders").build().unwrap();
    let data = generate_orders(10_000);

    let mut group = c.benchmark_group("raw_rows");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(20);

    group.bench_function("decode_10000_rows", |b| {
        b.iter(|| {
            let rows = parser
                .rows(Cursor::new(black_box(data.as_slice())))
                .unwrap()
                .map(|row| row.unwrap().len())
                .sum::<usize>();
            black_box(rows)
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_records, benchmark_raw_rows);
criterion_main!(benches);
