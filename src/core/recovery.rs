//! 错误恢复引擎
//!
//! 根据 AgentError 类型与剩余解析重试次数返回 RecoveryAction，供推理循环决定是重试、继续还是终止。

use crate::core::{AgentError, RecoveryAction};

/// 解析失败时注入的格式纠正提示
const FORMAT_CORRECTION: &str = "Invalid format. Follow exactly this format: \
    'Thought: ...' followed by either 'Action: <tool name>' and 'Action Input: <input>', \
    or 'Final Answer: <answer>'.";

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// retries_left 为本次查询剩余的解析重试次数；为 0 时解析类错误直接终止
    pub fn handle(&self, err: &AgentError, retries_left: usize, tool_names: &[String]) -> RecoveryAction {
        if !err.is_recoverable() {
            return RecoveryAction::Abort;
        }
        match err {
            AgentError::Parse(_) if retries_left > 0 => {
                RecoveryAction::RetryWithPrompt(FORMAT_CORRECTION.to_string())
            }
            AgentError::ToolNotFound(name) if retries_left > 0 => {
                RecoveryAction::RetryWithPrompt(format!(
                    "{name} is not a valid tool, try one of [{}].",
                    tool_names.join(", ")
                ))
            }
            AgentError::ToolExecution { .. } | AgentError::ToolTimeout(_) => {
                RecoveryAction::Observe(format!("Error: {err}"))
            }
            _ => RecoveryAction::Abort,
        }
    }
}
