//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute / health_check），注册时包装为 RegisteredTool，
//! 由它维护可用性、调用次数与最近使用时间。这些字段均为原子量，并发查询之间无需全局锁。

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;

use crate::core::AgentError;

/// 日志中输入预览的最大字符数
const INPUT_PREVIEW_CHARS: usize = 100;
const MAX_TOOL_NAME_LEN: usize = 64;

/// 工具 trait：名称、描述（供推理后端理解）、执行与健康检查
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（Action 行中引用的标识）
    fn name(&self) -> &str;

    /// 工具描述（拼入 prompt）
    fn description(&self) -> &str;

    /// 执行工具；失败时返回面向人的错误描述
    async fn execute(&self, input: &str) -> Result<String, String>;

    /// 健康检查；内部失败一律报告为 false
    async fn health_check(&self) -> bool;
}

/// 经过校验的工具标识：小写 ASCII 字母、数字与下划线
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ToolName(String);

impl ToolName {
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let name = raw.trim();
        let valid = !name.is_empty()
            && name.len() <= MAX_TOOL_NAME_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(AgentError::InvalidToolName(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ToolName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// 工具状态快照（健康接口与工具列表接口返回）
#[derive(Clone, Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub last_used: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub is_available: bool,
}

/// 已注册工具：Tool 实现 + 可用性 / 调用次数 / 最近使用时间（毫秒时间戳，0 表示从未使用）
pub struct RegisteredTool {
    name: ToolName,
    tool: Arc<dyn Tool>,
    available: AtomicBool,
    usage_count: AtomicU64,
    last_used_ms: AtomicI64,
}

impl RegisteredTool {
    fn new(name: ToolName, tool: Arc<dyn Tool>) -> Self {
        Self {
            name,
            tool,
            available: AtomicBool::new(true),
            usage_count: AtomicU64::new(0),
            last_used_ms: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &ToolName {
        &self.name
    }

    pub fn description(&self) -> &str {
        self.tool.description()
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count.load(Ordering::SeqCst)
    }

    pub fn last_used(&self) -> Option<DateTime<Utc>> {
        match self.last_used_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// 执行并记账：成功时更新使用统计；失败时置为不可用并把错误交还调用方。
    /// 可用性只会由下一次成功的健康检查恢复。
    pub async fn run(&self, input: &str) -> Result<String, AgentError> {
        tracing::info!(tool = %self.name, input = %preview(input), "Running tool");
        match self.tool.execute(input).await {
            Ok(output) => {
                self.last_used_ms
                    .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
                self.usage_count.fetch_add(1, Ordering::SeqCst);
                tracing::info!(tool = %self.name, "Tool finished");
                Ok(output)
            }
            Err(reason) => {
                tracing::error!(tool = %self.name, %reason, "Tool failed");
                self.mark_unavailable();
                Err(AgentError::ToolExecution {
                    tool: self.name.to_string(),
                    reason,
                })
            }
        }
    }

    pub(crate) fn mark_unavailable(&self) {
        self.available.store(false, Ordering::SeqCst);
    }

    /// 在独立任务中跑健康检查，panic 也记为 false；结果写回可用性
    pub async fn check_health(&self) -> bool {
        let tool = Arc::clone(&self.tool);
        let healthy = match tokio::spawn(async move { tool.health_check().await }).await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::error!(tool = %self.name, error = %e, "Health check panicked");
                false
            }
        };
        self.available.store(healthy, Ordering::SeqCst);
        healthy
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.to_string(),
            description: self.description().to_string(),
            last_used: self.last_used(),
            usage_count: self.usage_count(),
            is_available: self.is_available(),
        }
    }
}

/// 工具注册表：按 ToolName 存储 Arc<RegisteredTool>；启动时注册，之后在并发查询间只读共享
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolName, Arc<RegisteredTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按名插入；同名重复注册会覆盖（幂等）
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = ToolName::parse(tool.name())?;
        tracing::info!(tool = %name, "Tool registered");
        self.tools
            .insert(name.clone(), Arc::new(RegisteredTool::new(name, tool)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.tools.get(name).cloned()
    }

    /// 把后端给出的原始工具名解析为已注册工具；非法名称与未注册名称都视为 ToolNotFound
    pub fn resolve(&self, raw: &str) -> Result<Arc<RegisteredTool>, AgentError> {
        let name = ToolName::parse(raw).map_err(|_| AgentError::ToolNotFound(raw.trim().to_string()))?;
        self.tools
            .get(&name)
            .cloned()
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))
    }

    /// 当前可用的工具（按名称排序）
    pub fn list_available(&self) -> Vec<Arc<RegisteredTool>> {
        let mut tools: Vec<_> = self
            .tools
            .values()
            .filter(|t| t.is_available())
            .cloned()
            .collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    /// 并发检查所有工具，并把结果写回各自的可用性
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let checks = self.tools.values().map(|tool| async move {
            let healthy = tool.check_health().await;
            (tool.name().to_string(), healthy)
        });
        join_all(checks).await.into_iter().collect()
    }

    pub fn tools_info(&self) -> BTreeMap<String, ToolInfo> {
        self.tools
            .iter()
            .map(|(name, tool)| (name.to_string(), tool.info()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn preview(input: &str) -> String {
    if input.chars().count() > INPUT_PREVIEW_CHARS {
        format!("{}...", input.chars().take(INPUT_PREVIEW_CHARS).collect::<String>())
    } else {
        input.to_string()
    }
}
