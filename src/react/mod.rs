//! 认知层：提示词、输出解析、Planner、查询上下文、ReAct 主循环与响应组装

pub mod context;
pub mod events;
pub mod loop_;
pub mod parser;
pub mod planner;
pub mod prompt;
pub mod response;

pub use context::{QueryContext, ReasoningStep};
pub use events::ReactEvent;
pub use loop_::{react_loop, ReactSession};
pub use parser::{parse_llm_output, ParsedOutput};
pub use planner::{PlanOutcome, Planner};
pub use response::{assemble, dedup_tools, AgentResponse, AgentStep};
