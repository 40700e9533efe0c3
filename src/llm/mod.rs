//! LLM 层：推理后端抽象与实现（OpenAI 兼容 / Mock 替身）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::LlmSection;

pub use mock::{KeywordFamily, MockLlmClient};
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError};

/// 按配置创建后端：provider=openai 且有 API Key 或 base_url 时用真实后端，否则回退到确定性替身
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    match cfg.provider.as_str() {
        "openai" => {
            let has_key = cfg.api_key.is_some() || std::env::var("OPENAI_API_KEY").is_ok();
            if has_key || cfg.base_url.is_some() {
                tracing::info!(model = %cfg.model, "Using OpenAI-compatible reasoning backend");
                Arc::new(OpenAiClient::new(
                    cfg.base_url.as_deref(),
                    &cfg.model,
                    cfg.api_key.as_deref(),
                    cfg.temperature,
                ))
            } else {
                tracing::warn!("No API key or base_url for provider 'openai', falling back to mock backend");
                Arc::new(MockLlmClient::new())
            }
        }
        _ => {
            tracing::info!("Using deterministic mock reasoning backend");
            Arc::new(MockLlmClient::new())
        }
    }
}
