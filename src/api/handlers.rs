//! 请求处理函数

use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{ApiError, AppState};
use crate::error::AppError;
use crate::models::SheetAnalysis;
use crate::workflow::AnalyzeCtx;

/// 上传文件的表单字段名
pub const UPLOAD_FIELD: &str = "excelFile";

pub async fn root() -> &'static str {
    "Server running"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub file_path: String,
    pub sheet_names: Vec<String>,
    /// 与 `sheetNames` 相同，兼容旧版前端
    pub sheets: Vec<String>,
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let file_name = field.file_name().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?;
            upload = Some((file_name, data));
            break;
        }
    }

    let (file_name, data) = upload
        .filter(|(_, data)| !data.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    let document = state
        .session
        .store_upload(file_name.as_deref(), data)
        .await
        .map_err(|e| ApiError::from_app(e, "Failed to read Excel file"))?;

    let sheet_names = document.workbook.sheet_names();
    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        file_path: document.path.clone(),
        sheets: sheet_names.clone(),
        sheet_names,
    }))
}

/// 分析请求参数，支持表单和 JSON 两种格式
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub file_path: Option<String>,
    pub sheet_name: Option<String>,
}

#[async_trait]
impl<S> FromRequest<S> for AnalyzeRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(body) = Json::<AnalyzeRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(body)
        } else {
            let Form(body) = Form::<AnalyzeRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(body)
        }
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    request: AnalyzeRequest,
) -> Result<Json<SheetAnalysis>, ApiError> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    let (Some(file_path), Some(sheet_name)) =
        (non_empty(request.file_path), non_empty(request.sheet_name))
    else {
        return Err(ApiError::BadRequest(
            "Missing filePath or sheetName".to_string(),
        ));
    };

    let document = state
        .session
        .snapshot(&file_path)
        .await
        .map_err(|e| ApiError::from_app(e, "Failed to analyze sheet"))?;

    let ctx = AnalyzeCtx::new(file_path, sheet_name, document.generation);
    info!("{} 🔍 开始分析", ctx);

    let analysis = state
        .flow
        .run(document.workbook.clone(), &ctx)
        .await
        .map_err(|e| {
            if let AppError::NotFound(_) = &e {
                warn!("{} 工作表不存在", ctx);
            }
            ApiError::from_app(e, "Failed to analyze sheet")
        })?;

    info!("{} ✅ 分析完成，图片 {} 张", ctx, analysis.images.len());
    Ok(Json(analysis))
}

pub async fn image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let image_id: u32 = image_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid imageId".to_string()))?;

    let document = state
        .session
        .current()
        .await
        .map_err(|e| ApiError::from_app(e, "Failed to serve image"))?;

    let media = document
        .workbook
        .media_by_id(image_id)
        .ok_or_else(|| ApiError::NotFound("Image not found".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, media.format.content_type())],
        media.bytes.clone(),
    ))
}
