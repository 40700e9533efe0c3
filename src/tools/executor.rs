//! 工具执行器
//!
//! 持有共享的 ToolRegistry 与单次调用超时，dispatch(tool, input) 在超时内调用 RegisteredTool::run，
//! 超时时将工具置为不可用并返回 ToolTimeout；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{RegisteredTool, ToolRegistry};

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// 执行已解析的工具；整体查询超时由调用方在外层施加
    pub async fn dispatch(&self, tool: &RegisteredTool, input: &str) -> Result<String, AgentError> {
        let start = Instant::now();
        let result = timeout(self.timeout, tool.run(input)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool.name().as_str(),
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "input_preview": input_preview(input),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(r) => r,
            Err(_) => {
                tool.mark_unavailable();
                Err(AgentError::ToolTimeout(tool.name().to_string()))
            }
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn input_preview(input: &str) -> String {
    if input.chars().count() > 200 {
        format!("{}...", input.chars().take(200).collect::<String>())
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "Sleeps for a long time"
        }

        async fn execute(&self, _input: &str) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("done".to_string())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_dispatch_timeout_marks_tool_unavailable() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool).unwrap();
        let executor = ToolExecutor::new(Arc::new(registry), Duration::from_millis(20));
        let tool = executor.registry().get("slow").unwrap();

        let err = executor.dispatch(&tool, "x").await.unwrap_err();
        assert!(matches!(err, AgentError::ToolTimeout(name) if name == "slow"));
        assert!(!tool.is_available());
        assert_eq!(tool.usage_count(), 0);
    }
}
