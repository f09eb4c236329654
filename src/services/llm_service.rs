//! LLM 服务 - 业务能力层
//!
//! 只负责"把一段提示词（可附带一张图片）发给 LLM 并拿回文本"，
//! 不关心缓存、重试和标签。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::utils::truncate_text;

/// 随请求发送的图片
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Bytes,
    pub mime_type: &'static str,
}

impl ImagePayload {
    /// `data:<mime>;base64,<data>` 形式的 URL
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// 一次注释请求
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub model: String,
    pub prompt: String,
    pub image: Option<ImagePayload>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// 语言模型能力
///
/// 生产环境由 [`LlmService`] 实现，测试中替换为脚本化的假实现
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 发送请求，返回原始文本（未 trim）
    async fn complete(&self, request: &EnrichmentRequest) -> Result<String, LlmError>;
}

/// 基于 async-openai 的 LLM 服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
}

impl LlmService {
    /// 使用给定密钥和端点创建服务
    pub fn new(api_key: &str, api_base_url: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }

    /// 从配置创建；未配置密钥时返回 None
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_key = config.openai_api_key.as_deref()?;
        Some(Self::new(api_key, &config.openai_api_base_url))
    }

    fn build_user_message(
        request: &EnrichmentRequest,
    ) -> Result<ChatCompletionRequestMessage, LlmError> {
        let user_msg = match &request.image {
            Some(image) => {
                let content_parts = vec![
                    ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartText {
                            text: request.prompt.clone(),
                        },
                    ),
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: image.data_url(),
                                detail: Some(ImageDetail::High),
                            },
                        },
                    ),
                ];

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()
            }
            None => ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.as_str())
                .build(),
        }
        .map_err(LlmError::RequestBuild)?;

        Ok(ChatCompletionRequestMessage::User(user_msg))
    }
}

#[async_trait]
impl LanguageModel for LlmService {
    async fn complete(&self, request: &EnrichmentRequest) -> Result<String, LlmError> {
        debug!(
            "调用 LLM API，模型: {}，提示词: {}",
            request.model,
            truncate_text(&request.prompt, 80)
        );
        if let Some(image) = &request.image {
            debug!("包含图片 ({}, {} 字节)", image.mime_type, image.bytes.len());
        }

        let message = Self::build_user_message(request)?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(vec![message])
            .temperature(request.temperature)
            .max_tokens(request.max_output_tokens)
            .build()
            .map_err(LlmError::RequestBuild)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|source| {
                warn!("LLM API 调用失败: {}", source);
                LlmError::ApiCallFailed {
                    model: request.model.clone(),
                    source,
                }
            })?;

        debug!("LLM API 调用成功");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::EmptyContent {
                model: request.model.clone(),
            })
    }
}
