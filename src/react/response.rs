//! 对外响应：把结束后的 QueryContext 与终止状态组装为 AgentResponse

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::TerminalState;
use crate::react::{QueryContext, ReasoningStep};

/// 对外的单步记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub step_number: usize,
    pub thought: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&ReasoningStep> for AgentStep {
    fn from(step: &ReasoningStep) -> Self {
        let action = step.action.as_ref().map(ToString::to_string);
        Self {
            step_number: step.number,
            thought: step.thought.clone(),
            tool_used: action.clone(),
            action,
            action_input: step.action_input.clone(),
            observation: step.observation.clone(),
            timestamp: step.timestamp,
        }
    }
}

/// 查询结果；success=false 时 response 与 error_message 相同，均为解释性文本
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: String,
    pub steps: Vec<AgentStep>,
    pub tools_used: Vec<String>,
    /// 秒
    pub processing_time: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AgentResponse {
    /// 没有任何轮次的失败响应（例如服务尚未初始化）
    pub fn failure(message: impl Into<String>, processing_time: f64) -> Self {
        let message = message.into();
        Self {
            response: message.clone(),
            steps: Vec::new(),
            tools_used: Vec::new(),
            processing_time,
            success: false,
            error_message: Some(message),
            timestamp: Utc::now(),
        }
    }
}

/// 去重并保留首次出现的顺序
pub fn dedup_tools<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.as_ref();
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

pub fn assemble(ctx: &QueryContext, terminal: &TerminalState) -> AgentResponse {
    let steps: Vec<AgentStep> = ctx.steps.iter().map(AgentStep::from).collect();
    let tools_used = dedup_tools(steps.iter().filter_map(|s| s.tool_used.as_deref()));
    let message = terminal.message();
    let success = terminal.is_success();
    AgentResponse {
        error_message: (!success).then(|| message.clone()),
        response: message,
        steps,
        tools_used,
        processing_time: ctx.elapsed_secs(),
        success,
        timestamp: Utc::now(),
    }
}
