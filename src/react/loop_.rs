//! ReAct 主循环
//!
//! 每轮：检查取消 / 截止时间 / 轮数上限 -> 拼 prompt -> 调用后端 -> 解析 ->
//! Final Answer 则结束；Action 则校验工具并执行，结果（或失败描述）作为 Observation 写回 transcript；
//! 无法解析或未知工具时消耗一次解析重试并注入纠正提示，重试用尽则 ParseFailed。
//! 后端失败立即终止；每一轮（包括纠正轮）都计入 max_iterations。
//! 可选 event_tx：向 SSE 等前端推送 StepUpdate / Thinking / ToolCall / Observation / Recovery。

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, AgentPhase, RecoveryAction, RecoveryEngine, TerminalState};
use crate::react::parser::ParsedOutput;
use crate::react::planner::{PlanOutcome, Planner};
use crate::react::prompt::render_prompt;
use crate::react::{QueryContext, ReactEvent, ReasoningStep};
use crate::tools::ToolExecutor;

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;
const DEFAULT_MAX_ITERATIONS: usize = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);
const DEFAULT_LANGUAGE: &str = "Spanish";

/// ReAct 会话配置：必需的协作者 + 预算与可选的事件通道
pub struct ReactSession<'a> {
    pub planner: &'a Planner,
    pub executor: &'a ToolExecutor,
    pub recovery: &'a RecoveryEngine,
    /// 服务关闭时取消进行中的查询
    pub cancel_token: CancellationToken,
    pub max_iterations: usize,
    /// 单次查询的总时限
    pub timeout: Duration,
    pub language: &'a str,
    pub event_tx: Option<&'a UnboundedSender<ReactEvent>>,
}

impl<'a> ReactSession<'a> {
    pub fn new(
        planner: &'a Planner,
        executor: &'a ToolExecutor,
        recovery: &'a RecoveryEngine,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            planner,
            executor,
            recovery,
            cancel_token,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout: DEFAULT_TIMEOUT,
            language: DEFAULT_LANGUAGE,
            event_tx: None,
        }
    }

    pub fn with_limits(mut self, max_iterations: usize, timeout: Duration) -> Self {
        self.max_iterations = max_iterations;
        self.timeout = timeout;
        self
    }

    pub fn with_language(mut self, language: &'a str) -> Self {
        self.language = language;
        self
    }

    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: ReactEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn timed_out(&self) -> TerminalState {
        TerminalState::TimedOut { timeout: self.timeout }
    }

    /// 在取消令牌与截止时间的约束下等待 fut
    async fn guarded<F: Future>(&self, deadline: Instant, fut: F) -> Result<F::Output, TerminalState> {
        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(TerminalState::Cancelled),
            res = timeout_at(deadline, fut) => res.map_err(|_| self.timed_out()),
        }
    }

    /// 本次查询可派发的工具名（已注册且被请求允许）
    fn dispatchable_names(&self, ctx: &QueryContext) -> Vec<String> {
        self.executor
            .tool_names()
            .into_iter()
            .filter(|name| ctx.is_allowed(name))
            .collect()
    }

    /// prompt 中展示的工具：当前可用且被请求允许
    fn visible_tools(&self, ctx: &QueryContext) -> Vec<(String, String)> {
        self.executor
            .registry()
            .list_available()
            .into_iter()
            .filter(|t| ctx.is_allowed(t.name().as_str()))
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect()
    }

    /// 解析失败或未知工具：有重试预算则写入纠正轮并继续，否则记下这一轮后终止
    fn recover(
        &self,
        ctx: &mut QueryContext,
        number: usize,
        thought: String,
        err: AgentError,
    ) -> Option<TerminalState> {
        let names = self.dispatchable_names(ctx);
        match self.recovery.handle(&err, ctx.parse_retries_left(), &names) {
            RecoveryAction::RetryWithPrompt(correction) => {
                tracing::warn!(step = number, error = %err, "Recovering with correction prompt");
                ctx.consume_parse_retry();
                self.send_event(ReactEvent::Recovery {
                    action: "retry_with_prompt".to_string(),
                    detail: correction.clone(),
                });
                ctx.push(ReasoningStep::correction(number, thought, correction));
                None
            }
            _ => {
                tracing::warn!(step = number, error = %err, "Parse retries exhausted");
                let reason = err.to_string();
                ctx.push(ReasoningStep::correction(number, thought, reason.clone()));
                Some(TerminalState::ParseFailed(reason))
            }
        }
    }
}

/// 执行 ReAct 循环直到进入某个终止状态；ctx 中保留已完成的轮次
pub async fn react_loop(session: &ReactSession<'_>, ctx: &mut QueryContext) -> TerminalState {
    let deadline = ctx.started + session.timeout;
    let mut last_thought: Option<String> = None;

    loop {
        if session.cancel_token.is_cancelled() {
            return TerminalState::Cancelled;
        }
        if Instant::now() >= deadline {
            return session.timed_out();
        }
        if ctx.iteration() >= session.max_iterations {
            tracing::warn!(max_iterations = session.max_iterations, "Iteration limit reached");
            return TerminalState::IterationLimitReached {
                max_iterations: session.max_iterations,
                last_output: last_thought,
            };
        }

        let number = ctx.next_step_number();
        tracing::debug!(step = number, phase = ?AgentPhase::Running, "Reasoning round");
        session.send_event(ReactEvent::StepUpdate {
            step: number,
            max_steps: session.max_iterations,
        });
        session.send_event(ReactEvent::Thinking);

        let prompt = render_prompt(
            &session.visible_tools(ctx),
            session.language,
            &ctx.query,
            ctx.context.as_deref(),
            &ctx.steps,
        );
        let outcome = match session.guarded(deadline, session.planner.plan(&prompt, deadline)).await {
            Ok(outcome) => outcome,
            Err(terminal) => return terminal,
        };

        let parsed = match outcome {
            PlanOutcome::Parsed(parsed) => parsed,
            PlanOutcome::DeadlineExceeded => return session.timed_out(),
            PlanOutcome::Failed(e) => {
                if Instant::now() >= deadline {
                    return session.timed_out();
                }
                tracing::error!(step = number, error = %e, "Reasoning backend failed");
                session.send_event(ReactEvent::Error { text: e.to_string() });
                return TerminalState::BackendFailed(e);
            }
        };
        session.send_event(ReactEvent::ThinkingContent {
            text: parsed.thought().to_string(),
        });

        match parsed {
            ParsedOutput::FinalAnswer { thought, answer } => {
                tracing::info!(step = number, phase = ?AgentPhase::Finished, "Final answer");
                ctx.push(ReasoningStep::final_answer(number, thought));
                return TerminalState::FinalAnswer(answer);
            }
            ParsedOutput::Unparsable { thought, reason } => {
                last_thought = Some(thought.clone());
                if let Some(terminal) = session.recover(ctx, number, thought, AgentError::Parse(reason)) {
                    return terminal;
                }
            }
            ParsedOutput::Action { thought, tool, input } => {
                last_thought = Some(thought.clone());
                let resolved = if ctx.is_allowed(tool.trim()) {
                    session.executor.registry().resolve(&tool)
                } else {
                    Err(AgentError::ToolNotFound(tool.trim().to_string()))
                };
                let registered = match resolved {
                    Ok(registered) => registered,
                    Err(err) => {
                        if let Some(terminal) = session.recover(ctx, number, thought, err) {
                            return terminal;
                        }
                        continue;
                    }
                };

                tracing::info!(step = number, tool = %registered.name(), phase = ?AgentPhase::ToolDispatch, "Dispatching tool");
                session.send_event(ReactEvent::ToolCall {
                    tool: registered.name().to_string(),
                    input: input.clone(),
                });
                let result = match session
                    .guarded(deadline, session.executor.dispatch(&registered, &input))
                    .await
                {
                    Ok(result) => result,
                    Err(terminal) => return terminal,
                };
                let observation = match result {
                    Ok(output) => {
                        session.send_event(ReactEvent::Observation {
                            tool: registered.name().to_string(),
                            preview: preview(&output),
                        });
                        output
                    }
                    Err(err) => {
                        session.send_event(ReactEvent::ToolFailure {
                            tool: registered.name().to_string(),
                            reason: err.to_string(),
                        });
                        match session.recovery.handle(&err, ctx.parse_retries_left(), &[]) {
                            RecoveryAction::Observe(text) => text,
                            _ => format!("Error: {err}"),
                        }
                    }
                };
                ctx.push(ReasoningStep::action(
                    number,
                    thought,
                    registered.name().clone(),
                    input,
                    observation,
                ));
            }
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!("{}...", text.chars().take(OBSERVATION_PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::llm::{LlmClient, MockLlmClient};
    use crate::tools::{CalculatorTool, ToolRegistry};

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool::new()).unwrap();
        ToolExecutor::new(Arc::new(registry), Duration::from_secs(5))
    }

    async fn run(llm: Arc<dyn LlmClient>, query: &str) -> (TerminalState, QueryContext) {
        let planner = Planner::new(llm, Duration::from_secs(5));
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let session = ReactSession::new(&planner, &executor, &recovery, CancellationToken::new());
        let mut ctx = QueryContext::new(query, None, None, 1);
        let terminal = react_loop(&session, &mut ctx).await;
        (terminal, ctx)
    }

    #[tokio::test]
    async fn test_calculator_round_trip() {
        let (terminal, ctx) = run(Arc::new(MockLlmClient::new()), "2+2").await;
        assert!(terminal.is_success(), "{}", terminal.message());
        assert_eq!(ctx.steps.len(), 2);
        let obs = ctx.steps[0].observation.as_deref().unwrap();
        assert!(obs.contains("Result: 4"));
    }

    #[tokio::test]
    async fn test_recovers_from_one_unparsable_output() {
        let llm = Arc::new(MockLlmClient::scripted(["no idea", "Thought: ok\nFinal Answer: listo"]));
        let (terminal, ctx) = run(llm, "hola").await;
        assert!(matches!(terminal, TerminalState::FinalAnswer(ref a) if a == "listo"));
        assert_eq!(ctx.steps.len(), 2);
        assert!(ctx.steps[0].action.is_none());
        assert!(ctx.steps[0].observation.as_deref().unwrap().contains("Invalid format"));
    }

    #[tokio::test]
    async fn test_second_unparsable_output_is_terminal() {
        let mock = Arc::new(MockLlmClient::scripted(["no idea", "still no idea", "third"]));
        let (terminal, ctx) = run(mock.clone(), "hola").await;
        assert!(matches!(terminal, TerminalState::ParseFailed(_)));
        assert_eq!(ctx.steps.len(), 2);
        assert_eq!(ctx.steps[1].number, 2);
        assert_eq!(ctx.steps[1].thought, "still no idea");
        assert!(ctx.steps[1].action.is_none());
        assert!(ctx.steps[1].observation.as_deref().unwrap().contains("no Action or Final Answer"));
        // 后端恰好被调用两次
        assert_eq!(mock.complete("q").await.unwrap(), "third");
    }

    #[tokio::test]
    async fn test_correction_rounds_count_toward_iterations() {
        let llm = Arc::new(MockLlmClient::scripted(["no idea"]));
        let planner = Planner::new(llm, Duration::from_secs(5));
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let session = ReactSession::new(&planner, &executor, &recovery, CancellationToken::new())
            .with_limits(3, Duration::from_secs(5));
        let mut ctx = QueryContext::new("hola", None, None, 5);
        let terminal = react_loop(&session, &mut ctx).await;
        assert!(matches!(
            terminal,
            TerminalState::IterationLimitReached { max_iterations: 3, .. }
        ));
        assert_eq!(ctx.steps.len(), 3);
        assert_eq!(ctx.parse_retries_left(), 2);
    }

    #[tokio::test]
    async fn test_tool_failure_becomes_observation() {
        let llm = Arc::new(MockLlmClient::scripted([
            "Thought: divide\nAction: calculator\nAction Input: 1/0",
            "Thought: it failed\nFinal Answer: no se puede dividir entre cero",
        ]));
        let (terminal, ctx) = run(llm, "1/0").await;
        assert!(terminal.is_success());
        let obs = ctx.steps[0].observation.as_deref().unwrap();
        assert!(obs.starts_with("Error:"));
        assert!(obs.contains("division by zero"));
    }

    #[tokio::test]
    async fn test_disallowed_tool_is_unknown() {
        let llm = Arc::new(MockLlmClient::forced_action("calculator", "2+2"));
        let planner = Planner::new(llm, Duration::from_secs(5));
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let session = ReactSession::new(&planner, &executor, &recovery, CancellationToken::new());
        let allowed = std::collections::BTreeSet::from(["translator".to_string()]);
        let mut ctx = QueryContext::new("2+2", None, Some(allowed), 1);
        let terminal = react_loop(&session, &mut ctx).await;
        assert!(matches!(terminal, TerminalState::ParseFailed(_)));
        assert_eq!(ctx.steps.len(), 2);
        assert!(ctx.steps[0].observation.as_deref().unwrap().contains("calculator is not a valid tool"));
        assert!(ctx.steps[1].action.is_none());
        assert!(ctx.steps[1].observation.as_deref().unwrap().contains("Tool not found: calculator"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let planner = Planner::new(Arc::new(MockLlmClient::new()), Duration::from_secs(5));
        let executor = executor();
        let recovery = RecoveryEngine::new();
        let token = CancellationToken::new();
        token.cancel();
        let session = ReactSession::new(&planner, &executor, &recovery, token);
        let mut ctx = QueryContext::new("2+2", None, None, 1);
        assert!(matches!(react_loop(&session, &mut ctx).await, TerminalState::Cancelled));
        assert!(ctx.steps.is_empty());
    }
}
