//! 推理循环状态：运行阶段与终止状态
//!
//! Running 每个查询进入一次；每轮结束要么继续 Running，要么落入某个 TerminalState。

use std::time::Duration;

use serde::Serialize;

use crate::core::AgentError;
use crate::llm::LlmError;

/// 循环运行阶段（用于日志与事件推送）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Running,
    ToolDispatch,
    Finished,
}

/// 终止状态：到达后不再发起新一轮
#[derive(Clone, Debug)]
pub enum TerminalState {
    /// 后端给出最终答案（唯一的成功终态）
    FinalAnswer(String),
    /// 轮数用尽；保留最后一次输出中的思考文本作为兜底
    IterationLimitReached {
        max_iterations: usize,
        last_output: Option<String>,
    },
    TimedOut { timeout: Duration },
    ParseFailed(String),
    BackendFailed(LlmError),
    /// 服务关闭时取消进行中的查询
    Cancelled,
}

impl TerminalState {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalState::FinalAnswer(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TerminalState::FinalAnswer(_) => "final_answer",
            TerminalState::IterationLimitReached { .. } => "iteration_limit_reached",
            TerminalState::TimedOut { .. } => "timed_out",
            TerminalState::ParseFailed(_) => "parse_failed",
            TerminalState::BackendFailed(_) => "backend_failed",
            TerminalState::Cancelled => "cancelled",
        }
    }

    /// 面向用户的文本：成功时为答案，失败时为解释性错误描述（同时作为 error_message）
    pub fn message(&self) -> String {
        match self {
            TerminalState::FinalAnswer(answer) => answer.clone(),
            TerminalState::IterationLimitReached {
                max_iterations,
                last_output,
            } => {
                let err = AgentError::IterationBudgetExceeded(*max_iterations);
                match last_output.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                    Some(last) => format!("{err}. Last output:\n{last}"),
                    None => format!("{err} without a final answer."),
                }
            }
            TerminalState::TimedOut { timeout } => {
                format!("{}.", AgentError::TimeBudgetExceeded(*timeout))
            }
            TerminalState::ParseFailed(reason) => {
                format!("Could not interpret the reasoning backend output: {reason}")
            }
            TerminalState::BackendFailed(err) => format!("Reasoning backend failed: {err}"),
            TerminalState::Cancelled => format!("{}.", AgentError::Cancelled),
        }
    }
}
