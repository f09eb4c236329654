pub mod analysis;
pub mod workbook;

pub use analysis::{ImageRecord, SheetAnalysis, TagScan};
pub use workbook::{
    Anchor, CellPos, DrawingPicture, EmbeddedImage, ImageFormat, MediaItem, Sheet, Workbook,
};
