//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `session` - 文档会话
//! - 保存上传文件、解析工作簿
//! - 维护唯一的当前文档和文档代次
//! - 新文档生效前清空注释缓存
//!
//! ### `app` - 应用生命周期
//! - 组装会话、注释服务、分析流程和 HTTP 路由
//! - 启动服务并处理 Ctrl-C 优雅退出
//!
//! ## 层次关系
//!
//! ```text
//! api (HTTP 处理)
//!     ↓
//! orchestrator::DocumentSession (当前文档快照)
//!     ↓
//! workflow::AnalyzeFlow (处理单张工作表)
//!     ↓
//! services (能力层：标签 / 注释 / 缓存 / 组装)
//!     ↓
//! infrastructure (基础设施：xlsx 读取)
//! ```

pub mod app;
pub mod session;

pub use app::App;
pub use session::{ActiveDocument, DocumentSession};
