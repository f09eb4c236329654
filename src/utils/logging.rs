//! 日志工具模块
//!
//! 提供日志初始化和输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化 tracing 日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info 级别。
/// 重复调用不会报错（测试中会多次初始化）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 服务启动 - 表格图表注释服务");
    info!(
        "启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🌐 监听地址: {}", config.listen_addr());
    info!("📁 上传目录: {}", config.upload_dir.display());
    info!(
        "🤖 模型: 文本 {} / 图片 {}",
        config.text_model, config.vision_model
    );
    if config.has_api_key() {
        info!("🔑 已配置 LLM 密钥，最大并发: {}", config.max_concurrent_annotations);
    } else {
        info!("⚠️ 未配置 OPENAI_API_KEY，AI 注释将返回提示文本");
    }
    info!("{}", "=".repeat(60));
}

/// 记录新文档生效信息
pub fn log_document_activated(generation: u64, file_path: &str, sheet_count: usize) {
    info!("{}", "─".repeat(60));
    info!("📄 新文档已生效: {} (代次 #{})", file_path, generation);
    info!("📑 工作表数量: {}，AI 注释缓存已清空", sheet_count);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
