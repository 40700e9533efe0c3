//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WREN__*` 覆盖（双下划线表示嵌套，如 `WREN__LLM__PROVIDER=openai`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::AgentError;

const KNOWN_PROVIDERS: &[&str] = &["mock", "openai"];

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub server: ServerSection,
    pub agent: AgentSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名、版本、默认日志级别（RUST_LOG 优先）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub version: String,
    pub log_level: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Wren Agents".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// [server] 段：HTTP 监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerSection {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// [agent] 段：推理循环的轮数、时间与重试预算
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_iterations: usize,
    /// 单次查询的总时限（秒）
    pub timeout_secs: u64,
    /// 单次后端调用超时（秒），同时受总时限约束
    pub backend_timeout_secs: u64,
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 解析失败与未知工具共用的重试次数
    pub max_parse_retries: usize,
    /// prompt 中要求后端使用的回答语言
    pub response_language: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            timeout_secs: 45,
            backend_timeout_secs: 30,
            tool_timeout_secs: 30,
            max_parse_retries: 1,
            response_language: "Spanish".to_string(),
        }
    }
}

impl AgentSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// mock / openai
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取 OPENAI_API_KEY
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.7,
        }
    }
}

/// [tools] 段：内置工具开关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub enable_web_search: bool,
    pub enable_calculator: bool,
    pub enable_translator: bool,
    pub enable_sentiment: bool,
    pub web_search: WebSearchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            enable_web_search: true,
            enable_calculator: true,
            enable_translator: true,
            enable_sentiment: true,
            web_search: WebSearchSection::default(),
        }
    }
}

/// [tools.web_search] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSearchSection {
    pub endpoint: String,
    pub max_results: usize,
    /// DuckDuckGo 区域参数（kl）
    pub region: String,
    pub timeout_secs: u64,
    /// 不访问网络，返回固定结果
    pub offline: bool,
    /// 健康检查时是否真的发一次搜索请求
    pub probe_on_health_check: bool,
}

impl Default for WebSearchSection {
    fn default() -> Self {
        Self {
            endpoint: "https://html.duckduckgo.com/html/".to_string(),
            max_results: 5,
            region: "es-es".to_string(),
            timeout_secs: 15,
            offline: false,
            probe_on_health_check: false,
        }
    }
}

impl AppConfig {
    /// 启动前校验；非法配置直接作为启动错误
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.agent.max_iterations == 0 {
            return Err(AgentError::Config("agent.max_iterations must be >= 1".into()));
        }
        if self.agent.timeout_secs == 0 {
            return Err(AgentError::Config("agent.timeout_secs must be >= 1".into()));
        }
        if self.agent.backend_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(AgentError::Config(
                "agent.backend_timeout_secs and agent.tool_timeout_secs must be >= 1".into(),
            ));
        }
        if !KNOWN_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(AgentError::Config(format!(
                "unknown llm.provider '{}', expected one of {:?}",
                self.llm.provider, KNOWN_PROVIDERS
            )));
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 WREN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WREN__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WREN")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_iterations, 3);
        assert_eq!(cfg.agent.timeout_secs, 45);
        assert_eq!(cfg.agent.max_parse_retries, 1);
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.server.bind_addr(), "0.0.0.0:8000");
        assert!(cfg.tools.enable_calculator);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[agent]\nmax_iterations = 5\nresponse_language = \"English\"\n\n[tools]\nenable_web_search = false\n\n[tools.web_search]\noffline = true"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.agent.max_iterations, 5);
        assert_eq!(cfg.agent.response_language, "English");
        assert_eq!(cfg.agent.timeout_secs, 45);
        assert!(!cfg.tools.enable_web_search);
        assert!(cfg.tools.web_search.offline);
        assert_eq!(cfg.tools.web_search.max_results, 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.agent.max_iterations = 0;
        assert!(matches!(cfg.validate(), Err(AgentError::Config(_))));

        let mut cfg = AppConfig::default();
        cfg.llm.provider = "carrier-pigeon".into();
        assert!(cfg.validate().is_err());
    }
}
