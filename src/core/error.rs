//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 RetryWithPrompt / Observe / Abort。

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

/// 推理循环与服务层可能出现的错误（工具、解析、后端、预算、生命周期）
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    /// 工具执行失败：可恢复，转为 Observation 后继续下一轮
    #[error("Tool '{tool}' failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    #[error("Tool '{0}' timed out")]
    ToolTimeout(String),

    /// Action 指向未注册（或本次请求不允许）的工具：消耗一次解析重试
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// 后端输出不符合 Thought/Action/Final Answer 格式：在重试预算内可恢复
    #[error("Could not parse model output: {0}")]
    Parse(String),

    /// 生成后端失败或超时：本次查询立即终止，不重试
    #[error("Reasoning backend error: {0}")]
    Backend(#[from] LlmError),

    /// 轮数用尽：预期内的边界条件，以 IterationLimitReached 终止
    #[error("Agent stopped after reaching the iteration limit ({0})")]
    IterationBudgetExceeded(usize),

    #[error("Agent stopped after exceeding the time limit ({:.1}s)", .0.as_secs_f64())]
    TimeBudgetExceeded(Duration),

    /// 编排核心在后端与工具注册表就绪之前被调用
    #[error("Agent service is not initialized")]
    NotInitialized,

    #[error("Query cancelled: the agent service is shutting down")]
    Cancelled,

    #[error("Invalid tool name: {0}")]
    InvalidToolName(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 是否在循环内部被吸收（变成 Observation 或消耗一次重试），而非终止查询
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::ToolExecution { .. }
                | AgentError::ToolTimeout(_)
                | AgentError::ToolNotFound(_)
                | AgentError::Parse(_)
        )
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 将纠正提示作为 Observation 注入下一轮，让后端按格式重试（消耗一次解析重试）
    RetryWithPrompt(String),
    /// 把失败描述作为 Observation 交给后端，由它决定下一步
    Observe(String),
    /// 终止当前查询
    Abort,
}
