//! 单元格文本读取

use calamine::Data;

use crate::models::Sheet;

/// 读取单元格文本（行、列均从 1 开始）
///
/// 只有字符串单元格算作文本；空单元格、数字、布尔、日期、错误值都返回 None。
/// 富文本在加载时已由 calamine 按顺序无分隔拼接成一个字符串。
pub fn cell_text(sheet: &Sheet, row: u32, col: u32) -> Option<String> {
    if row == 0 || col == 0 {
        return None;
    }

    match sheet.cells.get_value((row - 1, col - 1))? {
        Data::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}
