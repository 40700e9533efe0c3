//! Mock LLM 客户端（确定性替身，无需模型）
//!
//! 关键词策略：
//! - prompt 的问题段之后还没有 Observation（第一轮）：按关键词族提议工具
//!   （加密货币/价格 → web_search，算术 → calculator，翻译 → translator），其余直接给出最终答案；
//! - 已有 Observation（工具已返回一次）：总是给出引用该关键词族的最终答案，不会再提第二个 Action。
//!
//! 另有 forced_action（不看 Observation，一直提议同一工具，模拟循环的后端）与 scripted（按顺序回放）两种模式，供测试使用。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::llm::{LlmClient, LlmError};
use crate::react::prompt::{
    CONTEXT_MARKER, OBSERVATION_MARKER, QUESTION_MARKER, QUESTION_PLACEHOLDER, THOUGHT_MARKER,
};

const WEB_SEARCH_KEYWORDS: &[&str] = &[
    "bitcoin",
    "btc",
    "ethereum",
    "precio",
    "price",
    "criptomoneda",
    "crypto",
    "cotización",
    "cotizacion",
    "currency",
];
const CALCULATOR_KEYWORDS: &[&str] = &[
    "+",
    "-",
    "*",
    "/",
    "^",
    "calcul",
    "cuanto es",
    "cuánto es",
    "how much is",
];
const TRANSLATOR_KEYWORDS: &[&str] = &["traduc", "translat", "idioma"];

/// 关键词族
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeywordFamily {
    WebSearch,
    Calculator,
    Translator,
    General,
}

impl KeywordFamily {
    /// 按固定顺序匹配：加密货币/价格优先，其次算术，再次翻译
    pub fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if hit(WEB_SEARCH_KEYWORDS) {
            KeywordFamily::WebSearch
        } else if hit(CALCULATOR_KEYWORDS) {
            KeywordFamily::Calculator
        } else if hit(TRANSLATOR_KEYWORDS) {
            KeywordFamily::Translator
        } else {
            KeywordFamily::General
        }
    }
}

enum MockMode {
    Keyword,
    ForcedAction { tool: String, input: String },
    Scripted { outputs: Vec<String>, cursor: AtomicUsize },
}

/// Mock 客户端：确定性替身后端
pub struct MockLlmClient {
    mode: MockMode,
    delay: Option<Duration>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    /// 关键词策略替身
    pub fn new() -> Self {
        Self {
            mode: MockMode::Keyword,
            delay: None,
        }
    }

    /// 无论 transcript 如何，每轮都提议同一个工具
    pub fn forced_action(tool: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            mode: MockMode::ForcedAction {
                tool: tool.into(),
                input: input.into(),
            },
            delay: None,
        }
    }

    /// 依次返回给定输出，用完后重复最后一条
    pub fn scripted<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: MockMode::Scripted {
                outputs: outputs.into_iter().map(Into::into).collect(),
                cursor: AtomicUsize::new(0),
            },
            delay: None,
        }
    }

    /// 每次 complete 前先等待，模拟慢后端
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn keyword_response(prompt: &str) -> String {
        let tail = question_section(prompt);
        let question_end = [format!("\n{CONTEXT_MARKER}"), format!("\n{THOUGHT_MARKER}")]
            .iter()
            .filter_map(|marker| tail.find(marker.as_str()))
            .min()
            .unwrap_or(tail.len());
        let question = tail[..question_end].trim();
        let observation_marker = format!("\n{OBSERVATION_MARKER}");
        let family = KeywordFamily::detect(question);

        if let Some((_, last)) = tail.rsplit_once(&observation_marker) {
            let observation = last
                .split_once(&format!("\n{THOUGHT_MARKER}"))
                .map(|(o, _)| o)
                .unwrap_or(last)
                .trim();
            return Self::final_after_observation(family, observation);
        }

        match family {
            KeywordFamily::WebSearch => format!(
                "Thought: El usuario pregunta por un precio o criptomoneda. Necesito buscar información actualizada en la web.\n\
                 Action: web_search\n\
                 Action Input: {question}"
            ),
            KeywordFamily::Calculator => format!(
                "Thought: Necesito resolver esta operación matemática usando la calculadora.\n\
                 Action: calculator\n\
                 Action Input: {}",
                extract_expression(question)
            ),
            KeywordFamily::Translator => format!(
                "Thought: El usuario quiere traducir texto. Voy a usar la herramienta de traducción.\n\
                 Action: translator\n\
                 Action Input: {question}"
            ),
            KeywordFamily::General => "Thought: Esta consulta la puedo responder directamente sin necesidad de herramientas.\n\
                 Final Answer: He recibido tu consulta. Estoy funcionando con el backend determinista de desarrollo; \
                 para respuestas completas configura un backend de generación real."
                .to_string(),
        }
    }

    fn final_after_observation(family: KeywordFamily, observation: &str) -> String {
        let (thought, answer) = match family {
            KeywordFamily::WebSearch => (
                "He obtenido información actualizada de la búsqueda web.",
                "Según la búsqueda web",
            ),
            KeywordFamily::Calculator => (
                "He completado el cálculo matemático solicitado.",
                "Resultado del cálculo",
            ),
            KeywordFamily::Translator => (
                "He completado la traducción solicitada.",
                "Traducción completada",
            ),
            KeywordFamily::General => ("He procesado la consulta.", "Consulta procesada"),
        };
        format!("Thought: {thought}\nFinal Answer: {answer}: {observation}")
    }
}

/// render_prompt 写入的问题行之后的全部内容
///
/// 问题行是格式说明之后第一处以 "Question: " 开头的行；用户问题、上下文或工具输出里再出现的 Question 不影响定位。
fn question_section(prompt: &str) -> &str {
    let format_line = format!("{QUESTION_MARKER} {QUESTION_PLACEHOLDER}\n");
    let body = prompt
        .split_once(format_line.as_str())
        .map_or(prompt, |(_, rest)| rest);
    let marker = format!("{QUESTION_MARKER} ");
    if let Some(rest) = body.strip_prefix(marker.as_str()) {
        return rest;
    }
    body.split_once(format!("\n{marker}").as_str())
        .map_or(body, |(_, rest)| rest)
}

/// 从问题中取出最长的算术片段（含数字），找不到则原样返回
fn extract_expression(question: &str) -> String {
    let Ok(re) = Regex::new(r"[0-9.,()\s+\-*/^%]+") else {
        return question.to_string();
    };
    re.find_iter(question)
        .map(|m| m.as_str().trim())
        .filter(|s| s.chars().any(|c| c.is_ascii_digit()))
        .max_by_key(|s| s.len())
        .map(str::to_string)
        .unwrap_or_else(|| question.to_string())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let output = match &self.mode {
            MockMode::Keyword => Self::keyword_response(prompt),
            MockMode::ForcedAction { tool, input } => format!(
                "Thought: Necesito usar {tool} otra vez.\nAction: {tool}\nAction Input: {input}"
            ),
            MockMode::Scripted { outputs, cursor } => {
                let i = cursor.fetch_add(1, Ordering::SeqCst);
                outputs
                    .get(i)
                    .or_else(|| outputs.last())
                    .cloned()
                    .ok_or_else(|| LlmError::Unavailable("scripted mock has no outputs".to_string()))?
            }
        };
        Ok(output)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
