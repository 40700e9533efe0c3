//! Translator 工具：词典式离线翻译
//!
//! 输入格式 "文本 | 目标语言"（默认 es）；源语言按常见词粗略识别（es / en）；
//! 词典内短语给出译文，其余文本标注目标语言后原样返回。

use std::collections::HashMap;

use async_trait::async_trait;

use crate::tools::Tool;

const DEFAULT_TARGET: &str = "es";

const SPANISH_HINTS: &[&str] = &["hola", "gracias", "buenos", "días", "cómo", "estás", "sí", "adiós"];
const ENGLISH_HINTS: &[&str] = &["hello", "thank", "good", "morning", "how", "are", "yes", "bye"];

/// (原文, 源语言, 目标语言, 译文)
const PHRASES: &[(&str, &str, &str, &str)] = &[
    ("hello", "en", "es", "hola"),
    ("hello world", "en", "es", "hola mundo"),
    ("good morning", "en", "es", "buenos días"),
    ("thank you", "en", "es", "gracias"),
    ("how are you", "en", "es", "cómo estás"),
    ("hola", "es", "en", "hello"),
    ("hola mundo", "es", "en", "hello world"),
    ("buenos días", "es", "en", "good morning"),
    ("gracias", "es", "en", "thank you"),
    ("cómo estás", "es", "en", "how are you"),
];

/// Translator 工具
pub struct TranslatorTool {
    languages: HashMap<&'static str, &'static str>,
}

impl Default for TranslatorTool {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslatorTool {
    pub fn new() -> Self {
        let languages = HashMap::from([
            ("es", "Spanish"),
            ("en", "English"),
            ("fr", "French"),
            ("de", "German"),
            ("it", "Italian"),
            ("pt", "Portuguese"),
            ("ru", "Russian"),
            ("ja", "Japanese"),
            ("ko", "Korean"),
            ("zh", "Chinese"),
            ("ar", "Arabic"),
        ]);
        Self { languages }
    }

    /// 拆出 (文本, 目标语言)
    fn parse_input<'a>(&self, input: &'a str) -> (&'a str, String) {
        match input.split_once('|') {
            Some((text, lang)) => (text.trim(), lang.trim().to_lowercase()),
            None => (input.trim(), DEFAULT_TARGET.to_string()),
        }
    }

    fn detect_language(text: &str) -> &'static str {
        let lower = text.to_lowercase();
        let score = |hints: &[&str]| hints.iter().filter(|w| lower.contains(*w)).count();
        if score(SPANISH_HINTS) > score(ENGLISH_HINTS) {
            "es"
        } else {
            "en"
        }
    }

    fn language_name(&self, code: &str) -> String {
        self.languages
            .get(code)
            .map(|s| s.to_string())
            .unwrap_or_else(|| code.to_uppercase())
    }

    pub fn translate(&self, text: &str, source: &str, target: &str) -> String {
        let key = text.trim().to_lowercase();
        if let Some((_, _, _, translated)) = PHRASES
            .iter()
            .find(|(phrase, src, dst, _)| *phrase == key && *src == source && *dst == target)
        {
            return translated.to_string();
        }
        if source == target {
            return text.to_string();
        }
        format!("[{}] {}", target.to_uppercase(), text)
    }
}

#[async_trait]
impl Tool for TranslatorTool {
    fn name(&self) -> &str {
        "translator"
    }

    fn description(&self) -> &str {
        "Language translator with automatic source detection. \
         Format: 'text to translate' or 'text | target_language'. \
         Examples: 'Hello world | es', 'Bonjour | en'"
    }

    async fn execute(&self, input: &str) -> Result<String, String> {
        let (text, target) = self.parse_input(input);
        if text.is_empty() {
            return Err("Nothing to translate".to_string());
        }
        if target.is_empty() || target.len() > 5 || !target.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
            return Err(format!("Invalid target language '{target}'"));
        }
        let source = Self::detect_language(text);
        let translated = self.translate(text, source, &target);
        tracing::debug!(%source, %target, "translated");
        Ok(format!(
            "Original ({}): {}\nTranslation ({}): {}\nLanguages: {} -> {}",
            self.language_name(source),
            text,
            self.language_name(&target),
            translated,
            source,
            target
        ))
    }

    async fn health_check(&self) -> bool {
        self.translate("hello", "en", "es") == "hola"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input_default_target() {
        let tool = TranslatorTool::new();
        assert_eq!(tool.parse_input("Hello world"), ("Hello world", "es".to_string()));
        assert_eq!(tool.parse_input("hola | EN "), ("hola", "en".to_string()));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(TranslatorTool::detect_language("Hola, gracias"), "es");
        assert_eq!(TranslatorTool::detect_language("Good morning"), "en");
    }

    #[tokio::test]
    async fn test_known_phrase() {
        let tool = TranslatorTool::new();
        let out = tool.execute("Hello world | es").await.unwrap();
        assert!(out.contains("Translation (Spanish): hola mundo"));
        assert!(out.contains("en -> es"));
    }

    #[tokio::test]
    async fn test_unknown_phrase_is_tagged() {
        let tool = TranslatorTool::new();
        let out = tool.execute("Guten Tag | fr").await.unwrap();
        assert!(out.contains("[FR] Guten Tag"));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let tool = TranslatorTool::new();
        assert!(tool.execute(" | es").await.is_err());
        assert!(tool.execute("hola | not a language").await.is_err());
        assert!(tool.health_check().await);
    }
}
