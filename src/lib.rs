//! # Sheet Insight
//!
//! 上传 xlsx 工作簿，定位其中的图表图片，读取图片附近的 `Title:` / `Period:` / `AI:`
//! 标签，并按 `AI:` 提示词调用 LLM 为图片生成注释。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 读取 xlsx 包：单元格（calamine）、媒体与 drawing 锚点（zip + quick-xml）
//!
//! ### ② 业务能力层（Services）
//! - `cell_reader` / `image_locator` / `tag_extractor` - 单元格文本、图片定位、标签扫描
//! - `LlmService` - LLM 调用能力（`LanguageModel` trait）
//! - `ResponseCache` - 按文档代次隔离的注释缓存
//! - `AnnotationService` - 缓存 → 超时 → 重试 → 失败转文本
//! - `sheet_compositor` - 表格预览与结果组装
//!
//! ### ③ 流程层（Workflow）
//! - `AnalyzeCtx` - 上下文封装（文档路径 + 工作表 + 代次）
//! - `AnalyzeFlow` - 一张工作表的分析流程（并发注释，按原顺序汇总）
//!
//! ### ④ 编排层（Orchestration）
//! - `DocumentSession` - 当前文档与代次切换
//! - `App` - 应用生命周期
//!
//! ### ⑤ 接口层（API）
//! - `api/` - axum 路由与错误响应

pub mod api;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{ImageRecord, SheetAnalysis, Workbook};
pub use orchestrator::{App, DocumentSession};
pub use services::{LanguageModel, ResponseCache};
pub use workflow::{AnalyzeCtx, AnalyzeFlow};
