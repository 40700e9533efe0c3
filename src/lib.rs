//! Wren - ReAct 工具调用智能体服务
//!
//! 模块划分：
//! - **agent**: AgentService（initialize / shutdown 生命周期、处理查询、健康检查）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、恢复策略、循环状态
//! - **llm**: 推理后端抽象与实现（OpenAI 兼容 / 确定性 Mock）
//! - **observability**: 日志初始化
//! - **react**: 提示词、输出解析、Planner、ReAct 主循环、响应组装
//! - **server**: HTTP 接口（axum）
//! - **tools**: 工具注册表、执行器与内置工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod react;
pub mod server;
pub mod tools;

pub use agent::AgentService;
pub use react::AgentResponse;
