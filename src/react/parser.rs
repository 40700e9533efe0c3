//! 解析后端输出：Final Answer / Action + Action Input / 无法解析
//!
//! 文本协议到此为止；之后的循环只处理 ParsedOutput。

use std::sync::OnceLock;

use regex::Regex;

use crate::react::prompt::{FINAL_ANSWER_MARKER, OBSERVATION_MARKER, THOUGHT_MARKER};

/// 未给出思考文本时的占位
const DEFAULT_THOUGHT: &str = "Thinking...";

/// 解析结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedOutput {
    FinalAnswer { thought: String, answer: String },
    /// tool 为后端给出的原始名称，由注册表校验
    Action { thought: String, tool: String, input: String },
    Unparsable { thought: String, reason: String },
}

impl ParsedOutput {
    pub fn thought(&self) -> &str {
        match self {
            ParsedOutput::FinalAnswer { thought, .. }
            | ParsedOutput::Action { thought, .. }
            | ParsedOutput::Unparsable { thought, .. } => thought,
        }
    }
}

fn action_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)").ok()
    })
    .as_ref()
}

fn action_line_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*Action\s*\d*\s*:").ok())
        .as_ref()
}

/// 第一个 Action 或 Final Answer 之前的文本即为思考，去掉开头的 "Thought:"
fn extract_thought(text: &str) -> String {
    let mut end = text.len();
    if let Some(i) = text.find(FINAL_ANSWER_MARKER) {
        end = end.min(i);
    }
    if let Some(m) = action_line_regex().and_then(|re| re.find(text)) {
        end = end.min(m.start());
    }
    let head = text[..end].trim();
    let head = head.strip_prefix(THOUGHT_MARKER).unwrap_or(head).trim();
    if head.is_empty() {
        DEFAULT_THOUGHT.to_string()
    } else {
        head.to_string()
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\'', '`'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return s[1..s.len() - 1].trim();
        }
    }
    s
}

/// 把后端的原始文本分类为最终答案、工具调用或无法解析
pub fn parse_llm_output(text: &str) -> ParsedOutput {
    let text = text.trim();
    let thought = extract_thought(text);
    let has_final = text.contains(FINAL_ANSWER_MARKER);
    let action = action_regex().and_then(|re| re.captures(text));

    if has_final && action.is_some() {
        return ParsedOutput::Unparsable {
            thought,
            reason: "output contains both a final answer and an action".to_string(),
        };
    }

    if has_final {
        let answer = text
            .rsplit_once(FINAL_ANSWER_MARKER)
            .map(|(_, answer)| answer.trim())
            .unwrap_or_default();
        if answer.is_empty() {
            return ParsedOutput::Unparsable {
                thought,
                reason: "final answer is empty".to_string(),
            };
        }
        return ParsedOutput::FinalAnswer {
            thought,
            answer: answer.to_string(),
        };
    }

    if let Some(caps) = action {
        let tool = caps.get(1).map_or("", |m| m.as_str());
        let tool = strip_quotes(tool.lines().next().unwrap_or_default());
        // 后端可能自己续写了 Observation，截掉
        let raw_input = caps.get(2).map_or("", |m| m.as_str());
        let raw_input = raw_input
            .split_once(&format!("\n{OBSERVATION_MARKER}"))
            .map(|(input, _)| input)
            .unwrap_or(raw_input);
        let input = strip_quotes(raw_input);
        if tool.is_empty() {
            return ParsedOutput::Unparsable {
                thought,
                reason: "action is missing a tool name".to_string(),
            };
        }
        return ParsedOutput::Action {
            thought,
            tool: tool.to_string(),
            input: input.to_string(),
        };
    }

    let reason = if action_line_regex().is_some_and(|re| re.is_match(text)) {
        "action is missing its Action Input".to_string()
    } else {
        "no Action or Final Answer found".to_string()
    };
    ParsedOutput::Unparsable { thought, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_answer() {
        let out = parse_llm_output("Thought: I know it\nFinal Answer: 4");
        assert_eq!(
            out,
            ParsedOutput::FinalAnswer {
                thought: "I know it".into(),
                answer: "4".into()
            }
        );
    }

    #[test]
    fn test_multiline_final_answer_is_kept() {
        let out = parse_llm_output("Final Answer: Resultado: Expression: 2+2\nResult: 4");
        match out {
            ParsedOutput::FinalAnswer { thought, answer } => {
                assert_eq!(thought, DEFAULT_THOUGHT);
                assert_eq!(answer, "Resultado: Expression: 2+2\nResult: 4");
            }
            other => panic!("expected final answer, got {other:?}"),
        }
    }

    #[test]
    fn test_action_with_input() {
        let out = parse_llm_output(
            "Thought: need math\nAction: calculator\nAction Input: \"2+2\"\nObservation: 4\nThought: done",
        );
        assert_eq!(
            out,
            ParsedOutput::Action {
                thought: "need math".into(),
                tool: "calculator".into(),
                input: "2+2".into()
            }
        );
    }

    #[test]
    fn test_action_tool_name_is_not_validated_here() {
        match parse_llm_output("Action: Fake Tool\nAction Input: x") {
            ParsedOutput::Action { tool, .. } => assert_eq!(tool, "Fake Tool"),
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn test_unparsable_cases() {
        let cases = [
            "I am just rambling",
            "Thought: hmm\nAction: calculator",
            "Action: calculator\nAction Input: 1\nFinal Answer: 1",
            "Thought: x\nFinal Answer:   ",
            "Action:\nAction Input: 1",
        ];
        for case in cases {
            assert!(
                matches!(parse_llm_output(case), ParsedOutput::Unparsable { .. }),
                "{case:?}"
            );
        }
    }

    #[test]
    fn test_missing_action_input_reason() {
        match parse_llm_output("Thought: hmm\nAction: calculator") {
            ParsedOutput::Unparsable { thought, reason } => {
                assert_eq!(thought, "hmm");
                assert!(reason.contains("Action Input"));
            }
            other => panic!("expected unparsable, got {other:?}"),
        }
    }
}
