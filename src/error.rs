//! 错误类型定义
//!
//! - `AppError`：请求级错误，`WorkbookError` 作为其子类
//! - `LlmError`：LLM 调用失败（图片级，转成 "AI Error: ..." 注释，不中断批次）
//! - `ConfigError`：配置加载失败（启动阶段，由 `main` 经 anyhow 直接返回）

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 请求参数缺失或非法
    #[error("参数错误: {0}")]
    Validation(String),
    /// 工作表 / 图片 / 文档不存在
    #[error("未找到: {0}")]
    NotFound(String),
    /// 工作簿相关错误
    #[error("工作簿错误: {0}")]
    Workbook(#[from] WorkbookError),
    /// 上传文件写入失败
    #[error("文件写入失败 ({path}): {source}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 其他错误（后台任务异常等）
    #[error("错误: {0}")]
    Other(String),
}

/// 工作簿读取错误
#[derive(Debug, Error)]
pub enum WorkbookError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 不是合法的 ZIP 包
    #[error("无法解析 xlsx 压缩包: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// 读取压缩包内的部件失败
    #[error("读取部件失败 ({part}): {source}")]
    PartRead {
        part: String,
        #[source]
        source: std::io::Error,
    },
    /// XML 解析失败
    #[error("XML解析失败 ({part}): {message}")]
    Xml { part: String, message: String },
    /// calamine 打开工作簿失败
    #[error("打开工作簿失败: {0}")]
    Open(#[source] calamine::XlsxError),
    /// calamine 读取单元格失败
    #[error("读取工作表单元格失败 ({sheet}): {source}")]
    Cells {
        sheet: String,
        #[source]
        source: calamine::XlsxError,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 请求构建失败
    #[error("LLM请求构建失败: {0}")]
    RequestBuild(#[source] async_openai::error::OpenAIError),
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: async_openai::error::OpenAIError,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 超时
    #[error("LLM请求超时 ({secs} 秒)")]
    Timeout { secs: u64 },
    /// 服务拒绝请求
    #[error("LLM请求被拒绝: {0}")]
    Rejected(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建参数错误
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// 创建未找到错误
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
