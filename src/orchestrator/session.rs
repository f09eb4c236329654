//! 文档会话
//!
//! 同一时刻只有一个"当前文档"。上传新文档时，在写锁内清空注释缓存（推进代次）
//! 并替换当前文档；分析和取图在读锁内拿到 (代次, 工作簿) 快照后即释放锁。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::load_workbook_from_bytes;
use crate::models::Workbook;
use crate::services::{Generation, ResponseCache};
use crate::utils::logging::log_document_activated;

/// 当前生效的文档
#[derive(Debug)]
pub struct ActiveDocument {
    /// 上传后保存的路径，也是客户端后续请求使用的文档标识
    pub path: String,
    pub generation: Generation,
    pub workbook: Arc<Workbook>,
}

impl ActiveDocument {
    /// 路径是否指向本文档
    pub fn matches(&self, file_path: &str) -> bool {
        Path::new(&self.path) == Path::new(file_path)
    }
}

/// 文档会话
pub struct DocumentSession {
    active: RwLock<Option<Arc<ActiveDocument>>>,
    cache: Arc<ResponseCache>,
    upload_dir: PathBuf,
}

impl DocumentSession {
    pub fn new(cache: Arc<ResponseCache>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            active: RwLock::new(None),
            cache,
            upload_dir: upload_dir.into(),
        }
    }

    /// 保存上传的文件并设为当前文档
    ///
    /// 文件名为 `<毫秒时间戳><原扩展名>`；工作簿解析失败时删除已保存的文件，
    /// 当前文档保持不变。
    pub async fn store_upload(
        &self,
        original_name: Option<&str>,
        data: Bytes,
    ) -> AppResult<Arc<ActiveDocument>> {
        let path = self.write_upload(original_name, &data).await?;
        let path_display = path.display().to_string();
        info!("📥 已保存上传文件: {} ({} 字节)", path_display, data.len());

        let load_path = path.clone();
        let loaded = tokio::task::spawn_blocking(move || load_workbook_from_bytes(&load_path, &data))
            .await
            .map_err(|e| AppError::Other(format!("工作簿解析任务异常: {}", e)))
            .and_then(|result| result.map_err(AppError::from));

        match loaded {
            Ok(workbook) => Ok(self.activate(path_display, workbook).await),
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    warn!("删除无效上传文件失败 ({}): {}", path_display, remove_err);
                }
                Err(e)
            }
        }
    }

    /// 清空缓存并替换当前文档（同一写锁内完成）
    pub async fn activate(&self, path: String, workbook: Workbook) -> Arc<ActiveDocument> {
        let mut active = self.active.write().await;
        let generation = self.cache.clear_all();

        let document = Arc::new(ActiveDocument {
            path,
            generation,
            workbook: Arc::new(workbook),
        });
        *active = Some(Arc::clone(&document));

        log_document_activated(
            generation.0,
            &document.path,
            document.workbook.sheets.len(),
        );
        document
    }

    /// 当前文档快照
    pub async fn current(&self) -> AppResult<Arc<ActiveDocument>> {
        self.active
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::validation("No uploaded file available"))
    }

    /// 指定路径的文档快照；路径不是当前文档时返回 NotFound
    pub async fn snapshot(&self, file_path: &str) -> AppResult<Arc<ActiveDocument>> {
        let document = self.current().await?;
        if !document.matches(file_path) {
            return Err(AppError::not_found("File not found"));
        }
        Ok(document)
    }

    async fn write_upload(&self, original_name: Option<&str>, data: &[u8]) -> AppResult<PathBuf> {
        let write_err = |path: &Path, source: std::io::Error| AppError::FileWrite {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| write_err(&self.upload_dir, e))?;

        let extension = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        // 同一毫秒内的并发上传顺延时间戳
        let mut stamp = chrono::Utc::now().timestamp_millis();
        loop {
            let path = self.upload_dir.join(format!("{}{}", stamp, extension));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(data).await.map_err(|e| write_err(&path, e))?;
                    file.flush().await.map_err(|e| write_err(&path, e))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(write_err(&path, e)),
            }
        }
    }
}
