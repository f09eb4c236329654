//! 分析结果模型（返回给客户端的 JSON 结构）

use serde::Serialize;
use serde_json::{Map, Value};

use super::workbook::{Anchor, ImageFormat};

/// 图片附近单元格的标签扫描结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagScan {
    pub title: Option<String>,
    pub period: Option<String>,
    pub ai: Option<String>,
    /// 扫描窗口内所有非空文本（去重，保留首次出现顺序）
    pub raw_texts: Vec<String>,
}

/// 单张图片的分析结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: u32,
    pub name: String,
    pub title: Option<String>,
    pub period: Option<String>,
    pub annotation: Option<String>,
    pub range: Anchor,
    pub format: ImageFormat,
    pub raw_tags: Vec<String>,
}

/// 工作表分析结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetAnalysis {
    pub row_count: usize,
    pub column_names: Vec<String>,
    pub sample_data: Vec<Map<String, Value>>,
    pub images: Vec<ImageRecord>,
}
