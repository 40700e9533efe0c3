//! Agent 服务：显式的 initialize / shutdown 生命周期
//!
//! initialize 按配置构建推理后端与工具注册表并做一次健康检查；
//! process_query 为每个请求创建独立的 QueryContext 跑 ReAct 循环，并总是返回一个 AgentResponse；
//! shutdown 取消进行中的查询并回到未初始化状态。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::core::{AgentError, RecoveryEngine};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::react::{assemble, react_loop, AgentResponse, Planner, QueryContext, ReactEvent, ReactSession};
use crate::tools::{create_registry, ToolExecutor, ToolInfo, ToolRegistry};

/// 请求中表示“全部工具”的标识
pub const ALL_TOOLS: &str = "all";

/// 初始化后共享的组件：Planner、ToolExecutor、Recovery，以及本轮生命周期的取消令牌
pub struct AgentComponents {
    pub planner: Planner,
    pub executor: ToolExecutor,
    pub recovery: RecoveryEngine,
    cancel_token: CancellationToken,
}

/// 健康检查结果
#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    /// 服务已初始化且至少一个工具健康
    pub healthy: bool,
    pub agent_service: bool,
    pub tools: BTreeMap<String, ToolInfo>,
}

pub struct AgentService {
    config: AppConfig,
    components: RwLock<Option<Arc<AgentComponents>>>,
}

impl AgentService {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            components: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 按配置创建后端与工具
    pub async fn initialize(&self) -> Result<(), AgentError> {
        let llm = create_llm_from_config(&self.config.llm);
        let registry = create_registry(&self.config.tools)?;
        self.initialize_with(llm, registry).await
    }

    /// 使用给定的后端与注册表初始化（测试与嵌入场景）
    pub async fn initialize_with(
        &self,
        llm: Arc<dyn LlmClient>,
        registry: ToolRegistry,
    ) -> Result<(), AgentError> {
        self.config.validate()?;
        let registry = Arc::new(registry);
        let health = registry.health_check_all().await;
        let healthy = health.values().filter(|ok| **ok).count();
        tracing::info!(
            backend = llm.name(),
            tools = health.len(),
            healthy,
            "Agent service initialized"
        );

        let agent = &self.config.agent;
        let components = AgentComponents {
            planner: Planner::new(llm, agent.backend_timeout()),
            executor: ToolExecutor::new(registry, agent.tool_timeout()),
            recovery: RecoveryEngine::new(),
            cancel_token: CancellationToken::new(),
        };
        let previous = self.components.write().await.replace(Arc::new(components));
        if let Some(previous) = previous {
            previous.cancel_token.cancel();
        }
        Ok(())
    }

    /// 取消进行中的查询并回到未初始化状态
    pub async fn shutdown(&self) {
        if let Some(components) = self.components.write().await.take() {
            components.cancel_token.cancel();
            tracing::info!("Agent service shut down");
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.components.read().await.is_some()
    }

    async fn components(&self) -> Option<Arc<AgentComponents>> {
        self.components.read().await.clone()
    }

    pub async fn process_query(
        &self,
        query: &str,
        context: Option<String>,
        tools: Option<Vec<String>>,
    ) -> AgentResponse {
        self.run_query(query, context, tools, None).await
    }

    /// 与 process_query 相同，但通过 event_tx 推送每轮事件，最后推送 Final
    pub async fn process_query_stream(
        &self,
        query: &str,
        context: Option<String>,
        tools: Option<Vec<String>>,
        event_tx: mpsc::UnboundedSender<ReactEvent>,
    ) -> AgentResponse {
        let response = self.run_query(query, context, tools, Some(&event_tx)).await;
        let _ = event_tx.send(ReactEvent::Final {
            response: Box::new(response.clone()),
        });
        response
    }

    async fn run_query(
        &self,
        query: &str,
        context: Option<String>,
        tools: Option<Vec<String>>,
        event_tx: Option<&mpsc::UnboundedSender<ReactEvent>>,
    ) -> AgentResponse {
        let Some(components) = self.components().await else {
            tracing::warn!("Query rejected: agent service is not initialized");
            return AgentResponse::failure(AgentError::NotInitialized.to_string(), 0.0);
        };

        let agent = &self.config.agent;
        let mut ctx = QueryContext::new(query, context, allowed_tools(tools), agent.max_parse_retries);
        let span = tracing::info_span!("query", id = %ctx.id);

        async {
            tracing::info!(query = %ctx.query, "Processing query");
            let mut session = ReactSession::new(
                &components.planner,
                &components.executor,
                &components.recovery,
                components.cancel_token.child_token(),
            )
            .with_limits(agent.max_iterations, agent.timeout())
            .with_language(&agent.response_language);
            if let Some(tx) = event_tx {
                session = session.with_event_tx(tx);
            }

            let terminal = react_loop(&session, &mut ctx).await;
            let response = assemble(&ctx, &terminal);
            tracing::info!(
                outcome = terminal.label(),
                steps = response.steps.len(),
                tools = ?response.tools_used,
                elapsed = response.processing_time,
                "Query finished"
            );
            response
        }
        .instrument(span)
        .await
    }

    /// 并发检查所有工具并刷新可用性
    pub async fn health_check(&self) -> HealthReport {
        let Some(components) = self.components().await else {
            return HealthReport {
                healthy: false,
                agent_service: false,
                tools: BTreeMap::new(),
            };
        };
        let registry = components.executor.registry();
        let results = registry.health_check_all().await;
        HealthReport {
            healthy: results.values().any(|ok| *ok),
            agent_service: true,
            tools: registry.tools_info(),
        }
    }

    /// 所有已注册工具的状态快照
    pub async fn tools_status(&self) -> BTreeMap<String, ToolInfo> {
        match self.components().await {
            Some(components) => components.executor.registry().tools_info(),
            None => BTreeMap::new(),
        }
    }

    /// 当前可用的工具
    pub async fn available_tools(&self) -> Vec<ToolInfo> {
        match self.components().await {
            Some(components) => components
                .executor
                .registry()
                .list_available()
                .iter()
                .map(|t| t.info())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// None、空列表或包含 "all" 表示不限制
fn allowed_tools(tools: Option<Vec<String>>) -> Option<BTreeSet<String>> {
    let tools = tools?;
    if tools.is_empty() || tools.iter().any(|t| t == ALL_TOOLS) {
        return None;
    }
    Some(tools.into_iter().collect())
}
