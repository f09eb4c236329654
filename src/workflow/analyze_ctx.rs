//! 分析上下文
//!
//! 封装"我正在分析哪个文档（哪一代）的哪张工作表"这一信息

use std::fmt::Display;

use crate::services::Generation;

/// 工作表分析上下文
#[derive(Debug, Clone)]
pub struct AnalyzeCtx {
    /// 上传后保存的文件路径（当前文档标识）
    pub file_path: String,

    /// 工作表名称
    pub sheet_name: String,

    /// 快照时的文档代次
    pub generation: Generation,
}

impl AnalyzeCtx {
    pub fn new(file_path: String, sheet_name: String, generation: Generation) -> Self {
        Self {
            file_path,
            sheet_name,
            generation,
        }
    }
}

impl Display for AnalyzeCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[文档 {} 工作表 {} 代次 {}]",
            self.file_path, self.sheet_name, self.generation
        )
    }
}
