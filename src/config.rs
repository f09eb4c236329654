use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 配置文件路径的环境变量
pub const CONFIG_FILE_ENV: &str = "SHEET_INSIGHT_CONFIG";
/// 默认配置文件（存在时才读取）
pub const DEFAULT_CONFIG_FILE: &str = "sheet_insight.toml";

/// 程序配置
///
/// 加载顺序：默认值 → TOML 配置文件 → 环境变量（`.env` 由 main 预先载入）
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 监听地址
    pub bind_address: String,
    /// 监听端口
    pub port: u16,
    /// 上传文件存放目录
    pub upload_dir: PathBuf,
    /// 上传文件大小上限（字节）
    pub max_upload_bytes: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    /// 为空时不调用 LLM，注释返回提示文本
    pub openai_api_key: Option<String>,
    pub openai_api_base_url: String,
    /// 纯文本请求使用的模型
    pub text_model: String,
    /// 带图片请求使用的模型
    pub vision_model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// 单次 LLM 调用超时（秒）
    pub llm_timeout_secs: u64,
    /// 失败重试次数（0 表示不重试）
    pub llm_max_retries: usize,
    /// 首次重试等待时间（毫秒），之后指数退避
    pub llm_retry_backoff_ms: u64,
    /// 单次分析中同时进行的 LLM 调用数量
    pub max_concurrent_annotations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 50 * 1024 * 1024,
            verbose_logging: false,
            openai_api_key: None,
            openai_api_base_url: "https://api.openai.com/v1".to_string(),
            text_model: "gpt-3.5-turbo".to_string(),
            vision_model: "gpt-4o".to_string(),
            max_output_tokens: 300,
            temperature: 0.7,
            llm_timeout_secs: 60,
            llm_max_retries: 0,
            llm_retry_backoff_ms: 500,
            max_concurrent_annotations: 4,
        }
    }
}

impl Config {
    /// 按 默认值 → 配置文件 → 环境变量 的顺序加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_FILE_ENV).ok();
        let path = explicit
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        // 显式指定的文件必须存在，默认文件可选
        let base = if explicit.is_some() || Path::new(&path).exists() {
            Self::from_file(Path::new(&path))?
        } else {
            Self::default()
        };

        base.with_overrides(|name| std::env::var(name).ok())
    }

    /// 从 TOML 文件读取配置，未出现的字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// 解析 TOML 文本
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source,
        })
    }

    /// 应用环境变量覆盖
    ///
    /// `lookup` 返回变量值；空字符串视为未设置
    pub fn with_overrides<F>(self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let default = self;

        Ok(Self {
            bind_address: get("BIND_ADDRESS").unwrap_or(default.bind_address),
            port: parse_var(&get, "PORT", default.port, "u16")?,
            upload_dir: get("UPLOAD_DIR").map(PathBuf::from).unwrap_or(default.upload_dir),
            max_upload_bytes: parse_var(&get, "MAX_UPLOAD_BYTES", default.max_upload_bytes, "usize")?,
            verbose_logging: parse_var(&get, "VERBOSE_LOGGING", default.verbose_logging, "bool")?,
            openai_api_key: get("OPENAI_API_KEY")
                .or(default.openai_api_key)
                .filter(|k| !k.trim().is_empty()),
            openai_api_base_url: get("OPENAI_API_BASE_URL").unwrap_or(default.openai_api_base_url),
            text_model: get("TEXT_MODEL").unwrap_or(default.text_model),
            vision_model: get("VISION_MODEL").unwrap_or(default.vision_model),
            max_output_tokens: parse_var(&get, "MAX_OUTPUT_TOKENS", default.max_output_tokens, "u32")?,
            temperature: parse_var(&get, "TEMPERATURE", default.temperature, "f32")?,
            llm_timeout_secs: parse_var(&get, "LLM_TIMEOUT_SECS", default.llm_timeout_secs, "u64")?,
            llm_max_retries: parse_var(&get, "LLM_MAX_RETRIES", default.llm_max_retries, "usize")?,
            llm_retry_backoff_ms: parse_var(&get, "LLM_RETRY_BACKOFF_MS", default.llm_retry_backoff_ms, "u64")?,
            max_concurrent_annotations: parse_var(
                &get,
                "MAX_CONCURRENT_ANNOTATIONS",
                default.max_concurrent_annotations,
                "usize",
            )?
            .max(1),
        })
    }

    /// 是否配置了 LLM 密钥
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key.is_some()
    }

    /// LLM 调用超时
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// 监听地址（host:port）
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn parse_var<T, G>(get: &G, name: &str, default: T, expected_type: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        None => Ok(default),
    }
}
