//! 应用生命周期：初始化 → 监听 → 优雅退出

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::services::{LanguageModel, LlmService};
use crate::utils::logging::log_startup;

/// 应用主结构
pub struct App {
    config: Config,
    router: Router,
}

impl App {
    /// 初始化应用
    ///
    /// 未配置 `OPENAI_API_KEY` 时仍可启动，AI 注释返回提示文本
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let model = LlmService::from_config(&config)
            .map(|service| Arc::new(service) as Arc<dyn LanguageModel>);

        Ok(Self::with_model(config, model))
    }

    /// 使用指定的语言模型组装应用
    pub fn with_model(config: Config, model: Option<Arc<dyn LanguageModel>>) -> Self {
        let state = AppState::new(&config, model);
        Self {
            router: api::router(state),
            config,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 运行应用主逻辑，Ctrl-C 时停止接收新连接并等待进行中的请求完成
    pub async fn run(self) -> Result<()> {
        let addr = self.config.listen_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("无法监听 {}", addr))?;

        info!("✅ 服务已启动: http://{}", addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        info!("👋 服务已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("监听 Ctrl-C 失败: {}", e);
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，正在关闭...");
}
