//! 工作表分析流程 - 流程层
//!
//! 核心职责：定义"一张工作表"的完整分析流程
//!
//! 流程顺序：
//! 1. 表格预览
//! 2. 定位图片 → 扫描附近标签
//! 3. 带 `AI:` 标签的图片并发生成注释（Semaphore 限流）
//! 4. 按图片原始顺序汇总
//!
//! 注释任务是独立的 tokio 任务：客户端断开后仍会执行完毕并写入缓存。

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::models::{EmbeddedImage, SheetAnalysis, Workbook};
use crate::services::annotation_service::{AnnotationService, AI_ERROR_PREFIX};
use crate::services::{image_locator, sheet_compositor, tag_extractor};
use crate::workflow::analyze_ctx::AnalyzeCtx;

/// 工作表分析流程
///
/// - 不持有文档，只处理调用方给出的工作簿快照
/// - 单张图片的注释失败不影响其它图片
pub struct AnalyzeFlow {
    annotations: Arc<AnnotationService>,
    semaphore: Arc<Semaphore>,
}

impl AnalyzeFlow {
    pub fn new(annotations: Arc<AnnotationService>, max_concurrent: usize) -> Self {
        Self {
            annotations,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn annotations(&self) -> &Arc<AnnotationService> {
        &self.annotations
    }

    pub async fn run(&self, workbook: Arc<Workbook>, ctx: &AnalyzeCtx) -> AppResult<SheetAnalysis> {
        let sheet = workbook
            .sheet(&ctx.sheet_name)
            .ok_or_else(|| AppError::not_found("Sheet not found"))?;

        let preview = sheet_compositor::table_preview(sheet);
        let images = image_locator::locate_images(&workbook, sheet);

        info!(
            "{} 📊 数据行 {}，图片 {} 张",
            ctx,
            preview.row_count,
            images.len()
        );

        let mut scanned = Vec::with_capacity(images.len());
        let mut handles = Vec::with_capacity(images.len());
        for image in images {
            let scan = tag_extractor::extract_tags(sheet, &image.anchor);
            handles.push(
                scan.ai
                    .clone()
                    .map(|prompt| self.spawn_annotation(ctx, &image, prompt)),
            );
            scanned.push((image, scan));
        }

        let annotated = handles.iter().flatten().count();
        if annotated > 0 {
            info!("{} 🤖 {} 张图片需要 AI 注释", ctx, annotated);
        }

        // join_all 按传入顺序返回，与完成顺序无关
        let outcomes = join_all(handles.into_iter().map(|handle| async move {
            match handle {
                Some(handle) => Some(handle.await),
                None => None,
            }
        }))
        .await;

        let records = scanned
            .into_iter()
            .zip(outcomes)
            .map(|((image, scan), outcome)| {
                let annotation = match outcome {
                    Some(Ok(annotation)) => annotation,
                    Some(Err(e)) => {
                        error!("{} 图片 {} 注释任务异常: {}", ctx, image.id, e);
                        Some(format!("{} {}", AI_ERROR_PREFIX, e))
                    }
                    None => None,
                };
                sheet_compositor::image_record(&image, scan, annotation)
            })
            .collect();

        Ok(sheet_compositor::compose(preview, records))
    }

    fn spawn_annotation(
        &self,
        ctx: &AnalyzeCtx,
        image: &EmbeddedImage,
        prompt: String,
    ) -> JoinHandle<Option<String>> {
        let annotations = Arc::clone(&self.annotations);
        let semaphore = Arc::clone(&self.semaphore);
        let generation = ctx.generation;
        let image_id = image.id;
        let bytes = image.bytes.clone();
        let format = image.format.clone();

        tokio::spawn(async move {
            // Semaphore 不会被关闭，获取失败时不限流继续执行
            let _permit = semaphore.acquire_owned().await.ok();
            annotations
                .annotate(generation, image_id, Some(&prompt), Some((&bytes, &format)))
                .await
        })
    }
}
