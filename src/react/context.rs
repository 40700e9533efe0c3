//! 单次查询的执行上下文：原始问题、可选上下文、transcript、耗时与轮次计数
//!
//! 每个查询独占一个 QueryContext，循环结束后交给 response::assemble 消费，不跨查询共享。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use crate::tools::ToolName;

/// 一轮推理的记录；追加到 transcript 后不再修改
#[derive(Clone, Debug)]
pub struct ReasoningStep {
    /// 从 1 开始，等于该轮的轮次
    pub number: usize,
    pub thought: String,
    pub action: Option<ToolName>,
    pub action_input: Option<String>,
    pub observation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ReasoningStep {
    /// 调用了工具的一轮；observation 为工具输出或失败描述
    pub fn action(
        number: usize,
        thought: String,
        tool: ToolName,
        input: String,
        observation: String,
    ) -> Self {
        Self {
            number,
            thought,
            action: Some(tool),
            action_input: Some(input),
            observation: Some(observation),
            timestamp: Utc::now(),
        }
    }

    /// 无法解析或指向未知工具的一轮：没有 action，纠正提示作为 observation
    pub fn correction(number: usize, thought: String, observation: String) -> Self {
        Self {
            number,
            thought,
            action: None,
            action_input: None,
            observation: Some(observation),
            timestamp: Utc::now(),
        }
    }

    pub fn final_answer(number: usize, thought: String) -> Self {
        Self {
            number,
            thought,
            action: None,
            action_input: None,
            observation: None,
            timestamp: Utc::now(),
        }
    }
}

/// 单次查询的可变状态
#[derive(Debug)]
pub struct QueryContext {
    pub id: Uuid,
    pub query: String,
    pub context: Option<String>,
    /// None 表示允许所有已注册工具
    pub allowed_tools: Option<BTreeSet<String>>,
    pub steps: Vec<ReasoningStep>,
    pub started: Instant,
    parse_retries_left: usize,
}

impl QueryContext {
    pub fn new(
        query: impl Into<String>,
        context: Option<String>,
        allowed_tools: Option<BTreeSet<String>>,
        max_parse_retries: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            context: context.filter(|c| !c.trim().is_empty()),
            allowed_tools,
            steps: Vec::new(),
            started: Instant::now(),
            parse_retries_left: max_parse_retries,
        }
    }

    /// 已执行的轮数
    pub fn iteration(&self) -> usize {
        self.steps.len()
    }

    pub fn next_step_number(&self) -> usize {
        self.steps.len() + 1
    }

    pub fn push(&mut self, step: ReasoningStep) {
        debug_assert_eq!(step.number, self.next_step_number());
        self.steps.push(step);
    }

    pub fn is_allowed(&self, tool: &str) -> bool {
        self.allowed_tools
            .as_ref()
            .map_or(true, |allowed| allowed.contains(tool))
    }

    pub fn parse_retries_left(&self) -> usize {
        self.parse_retries_left
    }

    pub fn consume_parse_retry(&mut self) {
        self.parse_retries_left = self.parse_retries_left.saturating_sub(1);
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_are_numbered_by_round() {
        let mut ctx = QueryContext::new("2+2", None, None, 1);
        assert_eq!(ctx.next_step_number(), 1);
        ctx.push(ReasoningStep::correction(1, "??".into(), "Invalid format.".into()));
        ctx.push(ReasoningStep::final_answer(2, "done".into()));
        assert_eq!(ctx.iteration(), 2);
        assert!(ctx.steps[1].action.is_none());
        assert!(ctx.steps[1].observation.is_none());
    }

    #[test]
    fn test_allowed_tools_and_retries() {
        let allowed = BTreeSet::from(["calculator".to_string()]);
        let mut ctx = QueryContext::new("q", Some("  ".into()), Some(allowed), 1);
        assert!(ctx.context.is_none());
        assert!(ctx.is_allowed("calculator"));
        assert!(!ctx.is_allowed("web_search"));

        assert_eq!(ctx.parse_retries_left(), 1);
        ctx.consume_parse_retry();
        ctx.consume_parse_retry();
        assert_eq!(ctx.parse_retries_left(), 0);

        assert!(QueryContext::new("q", None, None, 0).is_allowed("anything"));
    }
}
