//! Planner：调用推理后端并解析其输出
//!
//! 单次调用的超时取 min(后端超时, 距整体截止时间的剩余时间)；截止时间已到时返回 DeadlineExceeded，由循环转入 TimedOut。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::llm::{LlmClient, LlmError};
use crate::react::parser::{parse_llm_output, ParsedOutput};

/// 一次规划的结果
#[derive(Debug)]
pub enum PlanOutcome {
    Parsed(ParsedOutput),
    Failed(LlmError),
    /// 整体截止时间先到
    DeadlineExceeded,
}

pub struct Planner {
    llm: Arc<dyn LlmClient>,
    call_timeout: Duration,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, call_timeout: Duration) -> Self {
        Self { llm, call_timeout }
    }

    pub async fn plan(&self, prompt: &str, deadline: Instant) -> PlanOutcome {
        let call_deadline = Instant::now() + self.call_timeout;
        let effective = call_deadline.min(deadline);
        match timeout_at(effective, self.llm.complete(prompt)).await {
            Ok(Ok(raw)) => {
                tracing::debug!(backend = self.llm.name(), chars = raw.len(), "Backend responded");
                PlanOutcome::Parsed(parse_llm_output(&raw))
            }
            Ok(Err(e)) => PlanOutcome::Failed(e),
            Err(_) if effective >= deadline => PlanOutcome::DeadlineExceeded,
            Err(_) => PlanOutcome::Failed(LlmError::Timeout(self.call_timeout)),
        }
    }
}
