//! AI 注释服务
//!
//! 根据 `AI:` 标签的提示词（以及图片本身）生成注释，结果按 (代次, 指纹) 缓存。
//! 单张图片的失败会变成 `"AI Error: ..."` 文本返回，不会中断整张表的分析。

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::models::ImageFormat;
use crate::services::llm_service::{EnrichmentRequest, ImagePayload, LanguageModel};
use crate::services::response_cache::{Fingerprint, Generation, ResponseCache, Uncacheable};
use crate::utils::truncate_text;

/// 失败注释的前缀，带此前缀的结果不缓存
pub const AI_ERROR_PREFIX: &str = "AI Error:";
/// 未配置密钥时返回的提示
pub const MISSING_API_KEY_NOTICE: &str = "OpenAI API key not configured";

/// 注释调用参数
#[derive(Debug, Clone)]
pub struct AnnotationSettings {
    pub text_model: String,
    pub vision_model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_backoff: Duration,
}

impl AnnotationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            timeout: config.llm_timeout(),
            max_retries: config.llm_max_retries,
            retry_backoff: Duration::from_millis(config.llm_retry_backoff_ms),
        }
    }
}

/// AI 注释服务
pub struct AnnotationService {
    /// None 表示未配置密钥
    model: Option<Arc<dyn LanguageModel>>,
    cache: Arc<ResponseCache>,
    settings: AnnotationSettings,
}

impl AnnotationService {
    pub fn new(
        model: Option<Arc<dyn LanguageModel>>,
        cache: Arc<ResponseCache>,
        settings: AnnotationSettings,
    ) -> Self {
        Self {
            model,
            cache,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// 生成一张图片的注释
    ///
    /// - 没有 `AI:` 标签 → None，不调用 LLM
    /// - 未配置密钥 → 固定提示文本，不调用 LLM
    /// - 缓存命中 → 直接返回缓存
    /// - 只有图片字节和 MIME 类型都具备时才附带图片，并使用图片模型
    pub async fn annotate(
        &self,
        generation: Generation,
        image_id: u32,
        ai_text: Option<&str>,
        image: Option<(&Bytes, &ImageFormat)>,
    ) -> Option<String> {
        let prompt = ai_text?;

        let Some(model) = self.model.as_ref() else {
            return Some(MISSING_API_KEY_NOTICE.to_string());
        };

        let payload = image.and_then(|(bytes, format)| {
            format.mime_type().map(|mime_type| ImagePayload {
                bytes: bytes.clone(),
                mime_type,
            })
        });
        let model_name = if payload.is_some() {
            &self.settings.vision_model
        } else {
            &self.settings.text_model
        };

        let request = EnrichmentRequest {
            model: model_name.clone(),
            prompt: prompt.to_string(),
            image: payload,
            max_output_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        };
        let fingerprint = Fingerprint::new(image_id, prompt);

        let annotation = self
            .cache
            .get_or_compute(generation, fingerprint.clone(), async {
                debug!("缓存未命中，调用 LLM: {}", fingerprint);
                match self.call_with_retry(model.as_ref(), &request).await {
                    Ok(text) if text.starts_with(AI_ERROR_PREFIX) => Err(Uncacheable(text)),
                    Ok(text) => Ok(text),
                    Err(e) => {
                        warn!(
                            "⚠️ 图片 {} 注释失败 (提示词: {}): {}",
                            image_id,
                            truncate_text(prompt, 40),
                            e
                        );
                        Err(Uncacheable(format!("{} {}", AI_ERROR_PREFIX, e)))
                    }
                }
            })
            .await;

        Some(annotation)
    }

    /// 带超时和指数退避重试的 LLM 调用，返回 trim 后的文本
    async fn call_with_retry(
        &self,
        model: &dyn LanguageModel,
        request: &EnrichmentRequest,
    ) -> Result<String, LlmError> {
        let mut attempt = 0;
        let mut backoff = self.settings.retry_backoff;

        loop {
            let result = match tokio::time::timeout(self.settings.timeout, model.complete(request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout {
                    secs: self.settings.timeout.as_secs(),
                }),
            };

            match result {
                Ok(text) => return Ok(text.trim().to_string()),
                Err(e) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(
                        "LLM 调用失败，{:?} 后进行第 {} 次重试: {}",
                        backoff, attempt, e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedModel, Step};

    fn settings() -> AnnotationSettings {
        AnnotationSettings {
            text_model: "text-model".to_string(),
            vision_model: "vision-model".to_string(),
            max_output_tokens: 300,
            temperature: 0.7,
            timeout: Duration::from_millis(200),
            max_retries: 0,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn service_with(model: Arc<ScriptedModel>, settings: AnnotationSettings) -> AnnotationService {
        AnnotationService::new(Some(model), Arc::new(ResponseCache::new()), settings)
    }

    #[tokio::test]
    async fn test_no_ai_tag_makes_no_call() {
        let model = Arc::new(ScriptedModel::replying("unused"));
        let service = service_with(model.clone(), settings());
        let generation = service.cache().generation();

        assert_eq!(service.annotate(generation, 0, None, None).await, None);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_key_returns_notice() {
        let service = AnnotationService::new(None, Arc::new(ResponseCache::new()), settings());
        let generation = service.cache().generation();

        let annotation = service.annotate(generation, 0, Some("explain"), None).await;
        assert_eq!(annotation.as_deref(), Some(MISSING_API_KEY_NOTICE));
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let model = Arc::new(ScriptedModel::replying("  Prices rose.  "));
        let service = service_with(model.clone(), settings());
        let generation = service.cache().generation();

        let first = service.annotate(generation, 7, Some("explain"), None).await;
        let second = service.annotate(generation, 7, Some("explain"), None).await;

        assert_eq!(first.as_deref(), Some("Prices rose."));
        assert_eq!(second, first);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_new_generation_calls_again() {
        let model = Arc::new(ScriptedModel::replying("ok"));
        let service = service_with(model.clone(), settings());

        let old = service.cache().generation();
        service.annotate(old, 1, Some("explain"), None).await;
        let new = service.cache().clear_all();
        service.annotate(new, 1, Some("explain"), None).await;

        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_model_selected_by_included_image() {
        let model = Arc::new(ScriptedModel::replying("ok"));
        let service = service_with(model.clone(), settings());
        let generation = service.cache().generation();
        let bytes = Bytes::from_static(b"img");

        service
            .annotate(generation, 1, Some("a"), Some((&bytes, &ImageFormat::Png)))
            .await;
        // 无法识别 MIME 的格式不附带图片，使用文本模型
        service
            .annotate(
                generation,
                2,
                Some("a"),
                Some((&bytes, &ImageFormat::Other("emf".to_string()))),
            )
            .await;
        service.annotate(generation, 3, Some("a"), None).await;

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].model, "vision-model");
        assert_eq!(
            requests[0].image.as_ref().map(|i| i.mime_type),
            Some("image/png")
        );
        assert_eq!(requests[1].model, "text-model");
        assert!(requests[1].image.is_none());
        assert_eq!(requests[2].model, "text-model");
        assert_eq!(requests[2].max_output_tokens, 300);
    }

    #[tokio::test]
    async fn test_failure_is_reported_inline_and_not_cached() {
        let model = Arc::new(ScriptedModel::new(vec![
            Step::Fail("quota exceeded".to_string()),
            Step::Reply("recovered".to_string()),
        ]));
        let service = service_with(model.clone(), settings());
        let generation = service.cache().generation();

        let first = service
            .annotate(generation, 4, Some("explain"), None)
            .await
            .unwrap();
        assert!(first.starts_with(AI_ERROR_PREFIX), "{first}");
        assert!(first.contains("quota exceeded"));

        let second = service.annotate(generation, 4, Some("explain"), None).await;
        assert_eq!(second.as_deref(), Some("recovered"));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_sentinel_reply_is_not_cached() {
        let model = Arc::new(ScriptedModel::new(vec![
            Step::Reply("AI Error: upstream said no".to_string()),
            Step::Reply("fine".to_string()),
        ]));
        let service = service_with(model.clone(), settings());
        let generation = service.cache().generation();

        let first = service.annotate(generation, 4, Some("x"), None).await;
        assert_eq!(first.as_deref(), Some("AI Error: upstream said no"));
        let second = service.annotate(generation, 4, Some("x"), None).await;
        assert_eq!(second.as_deref(), Some("fine"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_ai_error() {
        let model = Arc::new(ScriptedModel::new(vec![Step::Hang]));
        let service = service_with(model, settings());
        let generation = service.cache().generation();

        let annotation = service
            .annotate(generation, 9, Some("slow"), None)
            .await
            .unwrap();
        assert!(annotation.starts_with(AI_ERROR_PREFIX));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let model = Arc::new(ScriptedModel::new(vec![
            Step::Fail("502".to_string()),
            Step::Reply("after retry".to_string()),
        ]));
        let service = service_with(
            model.clone(),
            AnnotationSettings {
                max_retries: 2,
                ..settings()
            },
        );
        let generation = service.cache().generation();

        let annotation = service.annotate(generation, 1, Some("x"), None).await;
        assert_eq!(annotation.as_deref(), Some("after retry"));
        assert_eq!(model.call_count(), 2);
    }
}
