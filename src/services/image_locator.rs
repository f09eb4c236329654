//! 图片定位
//!
//! 把工作表中的 drawing 图片引用与工作簿媒体数据关联起来

use tracing::debug;

use crate::models::{EmbeddedImage, Sheet, Workbook};

/// 列出工作表中的嵌入图片（保持 drawing 顺序）
///
/// 找不到媒体数据的图片直接忽略，不视为错误
/// （部分制作工具会写出指向不存在媒体的引用）。
pub fn locate_images(workbook: &Workbook, sheet: &Sheet) -> Vec<EmbeddedImage> {
    sheet
        .pictures
        .iter()
        .filter_map(|picture| match workbook.media_by_part(&picture.media_part) {
            Some(media) => Some(EmbeddedImage {
                id: media.id,
                anchor: picture.anchor,
                bytes: media.bytes.clone(),
                format: media.format.clone(),
            }),
            None => {
                debug!(
                    "工作表 {} 的图片缺少媒体数据 ({})，已忽略",
                    sheet.name, picture.media_part
                );
                None
            }
        })
        .collect()
}
