//! 标签提取
//!
//! 扫描图片左上角附近的单元格，识别 `Title:` / `Period:` / `AI:` 前缀

use tracing::debug;

use crate::models::{Anchor, Sheet, TagScan};
use crate::services::cell_reader::cell_text;

/// 向上扫描的行数（含锚点所在行共 4 行）
pub const ROWS_ABOVE: u32 = 3;
/// 锚点列左右各扫描的列数
pub const COLS_AROUND: u32 = 2;

/// 可识别的标签类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Title,
    Period,
    Ai,
}

impl TagKind {
    const ALL: [TagKind; 3] = [TagKind::Title, TagKind::Period, TagKind::Ai];

    pub fn prefix(self) -> &'static str {
        match self {
            TagKind::Title => "title:",
            TagKind::Period => "period:",
            TagKind::Ai => "ai:",
        }
    }

    /// 前缀匹配（不区分大小写），返回去掉前缀并 trim 后的内容
    pub fn parse(text: &str) -> Option<(TagKind, &str)> {
        Self::ALL.into_iter().find_map(|kind| {
            let prefix = kind.prefix();
            let head = text.get(..prefix.len())?;
            head.eq_ignore_ascii_case(prefix)
                .then(|| (kind, text[prefix.len()..].trim()))
        })
    }
}

/// 提取图片附近的标签
///
/// 扫描窗口：行 `[row - 3, row]`，列 `[max(1, col - 2), col + 2]`（1 起，按行优先）。
/// 这里的 row / col 是锚点的原生坐标（0 起）直接当作 1 起的行列号使用，
/// 因此窗口实际落在图片上方。同一前缀出现多次时，扫描顺序中靠后的覆盖靠前的。
pub fn extract_tags(sheet: &Sheet, anchor: &Anchor) -> TagScan {
    let top = anchor.top_left;
    let rows = top.native_row.saturating_sub(ROWS_ABOVE)..=top.native_row;
    let first_col = top.native_col.saturating_sub(COLS_AROUND).max(1);
    let cols = first_col..=top.native_col.saturating_add(COLS_AROUND);

    let mut scan = TagScan::default();

    for row in rows {
        for col in cols.clone() {
            let Some(text) = cell_text(sheet, row, col) else {
                continue;
            };
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            if let Some((kind, value)) = TagKind::parse(text) {
                let value = Some(value.to_string());
                match kind {
                    TagKind::Title => scan.title = value,
                    TagKind::Period => scan.period = value,
                    TagKind::Ai => scan.ai = value,
                }
            }

            if !scan.raw_texts.iter().any(|t| t == text) {
                scan.raw_texts.push(text.to_string());
            }
        }
    }

    debug!(
        "工作表 {} 锚点 ({}, {}) 扫描到 {} 条文本",
        sheet.name,
        top.native_row,
        top.native_col,
        scan.raw_texts.len()
    );
    scan
}
