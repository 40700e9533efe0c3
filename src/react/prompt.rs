//! ReAct 提示词模板与 Transcript（scratchpad）渲染
//!
//! 文本协议只在这里与 parser 中出现；循环其余部分只处理解析后的强类型结果。

use crate::react::ReasoningStep;

pub const QUESTION_MARKER: &str = "Question:";
pub const CONTEXT_MARKER: &str = "Context:";
pub const THOUGHT_MARKER: &str = "Thought:";
pub const ACTION_MARKER: &str = "Action:";
pub const ACTION_INPUT_MARKER: &str = "Action Input:";
pub const OBSERVATION_MARKER: &str = "Observation:";
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
/// 格式说明中 Question 行的占位文本
pub const QUESTION_PLACEHOLDER: &str = "the input question you must answer";

/// 拼装一轮推理的完整 prompt：说明、工具清单、问题（含可选上下文）与已有 transcript
pub fn render_prompt(
    tools: &[(String, String)],
    language: &str,
    question: &str,
    context: Option<&str>,
    steps: &[ReasoningStep],
) -> String {
    let tool_lines = if tools.is_empty() {
        "(no tools available)".to_string()
    } else {
        tools
            .iter()
            .map(|(name, description)| format!("{name}: {description}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let tool_names = tools
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "Answer the following questions as best you can. You have access to the following tools:\n\n\
         {tool_lines}\n\n\
         Use the following format:\n\n\
         {QUESTION_MARKER} {QUESTION_PLACEHOLDER}\n\
         {THOUGHT_MARKER} you should always think about what to do\n\
         {ACTION_MARKER} the action to take, should be one of [{tool_names}]\n\
         {ACTION_INPUT_MARKER} the input to the action\n\
         {OBSERVATION_MARKER} the result of the action\n\
         ... (this Thought/Action/Action Input/Observation can repeat N times)\n\
         {THOUGHT_MARKER} I now know the final answer\n\
         {FINAL_ANSWER_MARKER} the final answer to the original input question\n\n\
         IMPORTANT RULES:\n\
         - Always respond in {language} but keep the keywords (Thought, Action, Action Input, Final Answer) in English\n\
         - Use tools when you need specific information\n\
         - Be precise and helpful in your responses\n\
         - If you can answer directly without tools, skip to Final Answer\n\n\
         {QUESTION_MARKER} {question}\n"
    );
    if let Some(ctx) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("{CONTEXT_MARKER} {ctx}\n"));
    }
    prompt.push_str(&render_scratchpad(steps));
    prompt.push_str(THOUGHT_MARKER);
    prompt
}

/// 将已完成的轮次渲染为 Thought/Action/Action Input/Observation 块
pub fn render_scratchpad(steps: &[ReasoningStep]) -> String {
    let mut out = String::new();
    for step in steps {
        out.push_str(&format!("{THOUGHT_MARKER} {}\n", step.thought));
        if let Some(action) = &step.action {
            out.push_str(&format!("{ACTION_MARKER} {action}\n"));
            out.push_str(&format!(
                "{ACTION_INPUT_MARKER} {}\n",
                step.action_input.as_deref().unwrap_or_default()
            ));
        }
        if let Some(observation) = &step.observation {
            out.push_str(&format!("{OBSERVATION_MARKER} {observation}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolName;

    fn tools() -> Vec<(String, String)> {
        vec![
            ("calculator".to_string(), "Evaluates arithmetic".to_string()),
            ("translator".to_string(), "Translates text".to_string()),
        ]
    }

    #[test]
    fn test_prompt_lists_tools_and_question() {
        let prompt = render_prompt(&tools(), "Spanish", "2+2", None, &[]);
        assert!(prompt.contains("calculator: Evaluates arithmetic"));
        assert!(prompt.contains("should be one of [calculator, translator]"));
        assert!(prompt.contains("Question: 2+2\n"));
        assert!(prompt.contains("respond in Spanish"));
        assert!(prompt.ends_with("Thought:"));
        assert!(!prompt.contains(CONTEXT_MARKER));
    }

    #[test]
    fn test_prompt_includes_context_after_question() {
        let prompt = render_prompt(&tools(), "English", "price?", Some("finance user"), &[]);
        let q = prompt.rfind("Question: price?").unwrap();
        let c = prompt.rfind("Context: finance user").unwrap();
        assert!(c > q);
    }

    #[test]
    fn test_prompt_without_tools() {
        let prompt = render_prompt(&[], "Spanish", "hola", None, &[]);
        assert!(prompt.contains("(no tools available)"));
        assert!(prompt.contains("should be one of []"));
    }

    #[test]
    fn test_scratchpad_renders_action_and_observation() {
        let steps = vec![
            ReasoningStep::action(
                1,
                "I need the calculator".into(),
                ToolName::parse("calculator").unwrap(),
                "2+2".into(),
                "Result: 4".into(),
            ),
            ReasoningStep::correction(2, "gibberish".into(), "Invalid format.".into()),
        ];
        let pad = render_scratchpad(&steps);
        assert_eq!(
            pad,
            "Thought: I need the calculator\nAction: calculator\nAction Input: 2+2\nObservation: Result: 4\n\
             Thought: gibberish\nObservation: Invalid format.\n"
        );
    }
}
