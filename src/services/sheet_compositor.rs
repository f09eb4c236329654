//! 工作表结果组装
//!
//! 表格预览：首行作为表头，后续每行转成 `{表头: 值}` 记录，空单元格为 null。
//! 表头规则：空表头依次命名为 `__EMPTY`、`__EMPTY_1`……，重复表头追加 `_1`、`_2`。

use std::collections::HashSet;

use calamine::Data;
use serde_json::{Map, Number, Value};

use crate::models::{EmbeddedImage, ImageRecord, Sheet, SheetAnalysis, TagScan};

/// 返回的样例行数
pub const SAMPLE_ROW_LIMIT: usize = 5;

/// 表格预览
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TablePreview {
    /// 数据行数（不含表头和全空行）
    pub row_count: usize,
    pub column_names: Vec<String>,
    pub sample_data: Vec<Map<String, Value>>,
}

/// 生成表格预览
pub fn table_preview(sheet: &Sheet) -> TablePreview {
    let mut rows = sheet.cells.rows();
    let Some(header_row) = rows.next() else {
        return TablePreview::default();
    };
    let column_names = header_names(header_row);

    let mut row_count = 0;
    let mut sample_data = Vec::new();

    for row in rows {
        if row.iter().all(is_blank) {
            continue;
        }
        row_count += 1;
        if sample_data.len() < SAMPLE_ROW_LIMIT {
            let record = column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), row.get(i).map_or(Value::Null, cell_value)))
                .collect();
            sample_data.push(record);
        }
    }

    TablePreview {
        row_count,
        column_names,
        sample_data,
    }
}

/// 组装单张图片的结果
pub fn image_record(image: &EmbeddedImage, scan: TagScan, annotation: Option<String>) -> ImageRecord {
    let name = scan
        .title
        .clone()
        .unwrap_or_else(|| format!("Image {}", image.id));

    ImageRecord {
        id: image.id,
        name,
        title: scan.title,
        period: scan.period,
        annotation,
        range: image.anchor,
        format: image.format.clone(),
        raw_tags: scan.raw_texts,
    }
}

/// 组装工作表分析结果（图片保持传入顺序）
pub fn compose(preview: TablePreview, images: Vec<ImageRecord>) -> SheetAnalysis {
    SheetAnalysis {
        row_count: preview.row_count,
        column_names: preview.column_names,
        sample_data: preview.sample_data,
        images,
    }
}

fn header_names(header_row: &[Data]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut empty_count = 0;

    header_row
        .iter()
        .map(|cell| {
            let base = if is_blank(cell) {
                let name = match empty_count {
                    0 => "__EMPTY".to_string(),
                    n => format!("__EMPTY_{}", n),
                };
                empty_count += 1;
                name
            } else {
                cell.to_string()
            };

            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

/// 单元格值转 JSON：整数形式的浮点数输出为整数，日期输出为 Excel 序列号
fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::Float(f) => float_value(*f),
        Data::DateTime(dt) => float_value(dt.as_f64()),
        Data::Error(e) => Value::String(e.to_string()),
    }
}

fn float_value(f: f64) -> Value {
    const MAX_SAFE_INT: f64 = 9_007_199_254_740_991.0;
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INT {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}
