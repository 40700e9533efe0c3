//! ReAct 过程事件：用于 SSE 展示每一轮的思考、工具调用、观察与最终结果

use serde::Serialize;

use crate::react::AgentResponse;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 第几轮 / 最多几轮
    StepUpdate { step: usize, max_steps: usize },
    /// 正在等待后端
    Thinking,
    /// 后端给出的思考文本
    ThinkingContent { text: String },
    ToolCall { tool: String, input: String },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    ToolFailure { tool: String, reason: String },
    /// 解析失败或未知工具时注入的纠正
    Recovery { action: String, detail: String },
    /// 查询结束，携带完整响应
    Final { response: Box<AgentResponse> },
    Error { text: String },
}

impl ReactEvent {
    /// SSE 的 event 名
    pub fn name(&self) -> &'static str {
        match self {
            ReactEvent::StepUpdate { .. } => "step_update",
            ReactEvent::Thinking => "thinking",
            ReactEvent::ThinkingContent { .. } => "thinking_content",
            ReactEvent::ToolCall { .. } => "tool_call",
            ReactEvent::Observation { .. } => "observation",
            ReactEvent::ToolFailure { .. } => "tool_failure",
            ReactEvent::Recovery { .. } => "recovery",
            ReactEvent::Final { .. } => "final",
            ReactEvent::Error { .. } => "error",
        }
    }
}
