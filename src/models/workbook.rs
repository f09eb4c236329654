//! 工作簿内存模型
//!
//! 由 `infrastructure::xlsx_loader` 构建，一次上传对应一个 `Workbook`

use std::path::PathBuf;

use bytes::Bytes;
use calamine::{Data, Range};
use serde::{Serialize, Serializer};

/// 网格坐标（0 起，与 drawing 部件中的 `xdr:from` / `xdr:to` 一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellPos {
    pub native_row: u32,
    pub native_col: u32,
}

impl CellPos {
    pub fn new(native_row: u32, native_col: u32) -> Self {
        Self {
            native_row,
            native_col,
        }
    }
}

/// 图片锚点矩形
///
/// `oneCellAnchor` 没有右下角
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub top_left: CellPos,
    pub bottom_right: Option<CellPos>,
}

/// 图片格式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    /// 无法识别的扩展名（原样保留）
    Other(String),
}

impl ImageFormat {
    /// 从文件扩展名识别格式（不区分大小写）
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            "gif" => ImageFormat::Gif,
            other => ImageFormat::Other(other.to_string()),
        }
    }

    /// 从部件路径（如 `xl/media/image1.png`）识别格式
    pub fn from_part_name(part: &str) -> Self {
        let file = part.rsplit('/').next().unwrap_or(part);
        match file.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => ImageFormat::Other(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Other(ext) => ext,
        }
    }

    /// 可直接发给 LLM 的 MIME 类型，未知格式返回 None
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            ImageFormat::Jpeg => Some("image/jpeg"),
            ImageFormat::Png => Some("image/png"),
            ImageFormat::Gif => Some("image/gif"),
            ImageFormat::Other(_) => None,
        }
    }

    /// HTTP 响应使用的 Content-Type
    pub fn content_type(&self) -> &'static str {
        self.mime_type().unwrap_or("application/octet-stream")
    }
}

impl Serialize for ImageFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// 工作簿级别的媒体文件（`xl/media/*`）
///
/// `id` 为其在媒体列表中的序号，同一代次内唯一
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub id: u32,
    pub part: String,
    pub format: ImageFormat,
    pub bytes: Bytes,
}

/// drawing 部件中的一张图片引用（尚未关联媒体数据）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingPicture {
    pub anchor: Anchor,
    /// 解析后的媒体部件路径，如 `xl/media/image1.png`
    pub media_part: String,
}

/// 已关联媒体数据的嵌入图片
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub id: u32,
    pub anchor: Anchor,
    pub bytes: Bytes,
    pub format: ImageFormat,
}

/// 工作表
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    /// 已用区域，坐标为绝对位置（0 起）
    pub cells: Range<Data>,
    /// 按 drawing 中出现顺序排列
    pub pictures: Vec<DrawingPicture>,
}

/// 工作簿
#[derive(Debug, Clone)]
pub struct Workbook {
    pub path: PathBuf,
    pub sheets: Vec<Sheet>,
    pub media: Vec<MediaItem>,
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn media_by_id(&self, id: u32) -> Option<&MediaItem> {
        self.media.iter().find(|m| m.id == id)
    }

    pub fn media_by_part(&self, part: &str) -> Option<&MediaItem> {
        self.media.iter().find(|m| m.part == part)
    }
}
