//! 基础设施层
//!
//! 只负责把 xlsx 包读成内存模型，不关心标签和注释

pub mod ooxml;
pub mod xlsx_loader;

pub use xlsx_loader::{load_workbook, load_workbook_from_bytes};
