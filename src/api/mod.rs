//! HTTP 接口层
//!
//! - `GET /` 健康检查
//! - `POST /upload` 上传工作簿（multipart 字段 `excelFile`）
//! - `POST /analyze` 分析工作表（表单或 JSON：`filePath`、`sheetName`）
//! - `GET /image/:imageId` 取当前文档中的图片

pub mod error;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use crate::config::Config;
use crate::orchestrator::DocumentSession;
use crate::services::annotation_service::{AnnotationService, AnnotationSettings};
use crate::services::{LanguageModel, ResponseCache};
use crate::workflow::AnalyzeFlow;

pub use error::ApiError;
pub use routes::router;

/// 各请求共享的状态
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<DocumentSession>,
    pub flow: Arc<AnalyzeFlow>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// 组装共享状态；`model` 为 None 表示未配置 LLM
    pub fn new(config: &Config, model: Option<Arc<dyn LanguageModel>>) -> Self {
        let cache = Arc::new(ResponseCache::new());
        let annotations = AnnotationService::new(
            model,
            Arc::clone(&cache),
            AnnotationSettings::from_config(config),
        );

        Self {
            session: Arc::new(DocumentSession::new(cache, config.upload_dir.clone())),
            flow: Arc::new(AnalyzeFlow::new(
                Arc::new(annotations),
                config.max_concurrent_annotations,
            )),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
