//! HTTP 接口（axum）
//!
//! GET / 、GET /health、POST /agent/query、POST /agent/query/stream（SSE）、GET /agent/tools。
//! 请求体校验失败返回 422；服务未初始化返回 503。

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::agent::AgentService;
use crate::core::AgentError;
use crate::react::{AgentResponse, ReactEvent};
use crate::tools::ToolInfo;

pub const MAX_QUERY_CHARS: usize = 1000;
pub const MAX_CONTEXT_CHARS: usize = 500;

/// 请求中可选的工具
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSelector {
    Calculator,
    Translator,
    WebSearch,
    SentimentAnalyzer,
    All,
}

impl ToolSelector {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolSelector::Calculator => "calculator",
            ToolSelector::Translator => "translator",
            ToolSelector::WebSearch => "web_search",
            ToolSelector::SentimentAnalyzer => "sentiment_analyzer",
            ToolSelector::All => crate::agent::ALL_TOOLS,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub tools: Option<Vec<ToolSelector>>,
}

impl QueryRequest {
    pub fn validate(&self) -> Result<(), String> {
        let len = self.query.chars().count();
        if self.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        if len > MAX_QUERY_CHARS {
            return Err(format!("query must be at most {MAX_QUERY_CHARS} characters (got {len})"));
        }
        if let Some(ctx) = &self.context {
            let len = ctx.chars().count();
            if len > MAX_CONTEXT_CHARS {
                return Err(format!(
                    "context must be at most {MAX_CONTEXT_CHARS} characters (got {len})"
                ));
            }
        }
        Ok(())
    }

    fn tool_names(&self) -> Option<Vec<String>> {
        self.tools
            .as_ref()
            .map(|tools| tools.iter().map(|t| t.as_str().to_string()).collect())
    }
}

#[derive(Debug, Serialize)]
struct ServiceStatus {
    agent_service: bool,
    tools: BTreeMap<String, ToolInfo>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    services: ServiceStatus,
}

#[derive(Debug, Serialize)]
struct ToolsResponse {
    tools: Vec<ToolInfo>,
    count: usize,
    timestamp: DateTime<Utc>,
}

/// 处理器错误：状态码 + JSON {"error": ...}
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unprocessable(message: String) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message,
        }
    }

    fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: AgentError::NotInitialized.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

pub fn router(service: Arc<AgentService>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/agent/query", post(query))
        .route("/agent/query/stream", post(query_stream))
        .route("/agent/tools", get(tools))
        .with_state(service)
}

async fn root(State(service): State<Arc<AgentService>>) -> Json<serde_json::Value> {
    let app = &service.config().app;
    Json(serde_json::json!({
        "name": app.name,
        "version": app.version,
        "status": "running",
        "timestamp": Utc::now(),
    }))
}

async fn health(State(service): State<Arc<AgentService>>) -> Response {
    let report = service.health_check().await;
    let body = HealthResponse {
        status: if report.healthy { "healthy" } else { "unhealthy" },
        timestamp: Utc::now(),
        services: ServiceStatus {
            agent_service: report.agent_service,
            tools: report.tools,
        },
    };
    let status = if report.agent_service {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

async fn query(
    State(service): State<Arc<AgentService>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    req.validate().map_err(ApiError::unprocessable)?;
    if !service.is_initialized().await {
        return Err(ApiError::unavailable());
    }
    let response = service
        .process_query(&req.query, req.context.clone(), req.tool_names())
        .await;
    Ok(Json(response))
}

async fn query_stream(
    State(service): State<Arc<AgentService>>,
    Json(req): Json<QueryRequest>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    req.validate().map_err(ApiError::unprocessable)?;
    if !service.is_initialized().await {
        return Err(ApiError::unavailable());
    }

    let (event_tx, event_rx) = mpsc::unbounded_channel::<ReactEvent>();
    tokio::spawn(async move {
        let tools = req.tool_names();
        service
            .process_query_stream(&req.query, req.context, tools, event_tx)
            .await;
    });

    let events = stream::unfold(event_rx, |mut rx| async move {
        let ev = rx.recv().await?;
        Some((Ok(to_sse_event(&ev)), rx))
    });
    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}

fn to_sse_event(ev: &ReactEvent) -> Event {
    match Event::default().event(ev.name()).json_data(ev) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize event");
            Event::default().event("error").data(e.to_string())
        }
    }
}

async fn tools(State(service): State<Arc<AgentService>>) -> Json<ToolsResponse> {
    let tools = service.available_tools().await;
    Json(ToolsResponse {
        count: tools.len(),
        tools,
        timestamp: Utc::now(),
    })
}
