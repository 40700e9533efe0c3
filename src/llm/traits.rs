//! 推理后端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：输入拼好的 ReAct prompt，返回续写文本。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// 后端失败：不可用或超时
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend timed out after {0:?}")]
    Timeout(Duration),
}

/// LLM 客户端 trait：对 prompt 做一次非流式续写
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// 后端名称（日志与健康信息用）
    fn name(&self) -> &str;
}
