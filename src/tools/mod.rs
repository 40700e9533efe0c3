//! 工具箱：注册表、执行器与四个内置工具（calculator、translator、web_search、sentiment_analyzer）

pub mod calculator;
pub mod executor;
pub mod registry;
pub mod sentiment;
pub mod translator;
pub mod web_search;

use std::sync::Arc;

use crate::config::ToolsSection;
use crate::core::AgentError;

pub use calculator::CalculatorTool;
pub use executor::ToolExecutor;
pub use registry::{RegisteredTool, Tool, ToolInfo, ToolName, ToolRegistry};
pub use sentiment::SentimentAnalyzerTool;
pub use translator::TranslatorTool;
pub use web_search::WebSearchTool;

/// 按 [tools] 开关构建默认注册表
pub fn create_registry(cfg: &ToolsSection) -> Result<ToolRegistry, AgentError> {
    let mut registry = ToolRegistry::new();
    if cfg.enable_web_search {
        let tool = WebSearchTool::new(&cfg.web_search).map_err(AgentError::Config)?;
        registry.register_arc(Arc::new(tool))?;
    }
    if cfg.enable_calculator {
        registry.register(CalculatorTool::new())?;
    }
    if cfg.enable_translator {
        registry.register(TranslatorTool::new())?;
    }
    if cfg.enable_sentiment {
        registry.register(SentimentAnalyzerTool::new())?;
    }
    tracing::info!(count = registry.len(), tools = ?registry.tool_names(), "Tool registry ready");
    Ok(registry)
}
