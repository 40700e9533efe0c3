//! Sentiment 工具：关键词计数情感分析（positive / negative / neutral）

use async_trait::async_trait;

use crate::tools::Tool;

const POSITIVE_WORDS: &[&str] = &[
    "excelente", "genial", "bueno", "fantástico", "increíble", "love", "great", "amazing", "good",
    "excellent",
];
const NEGATIVE_WORDS: &[&str] = &[
    "malo", "terrible", "horrible", "pésimo", "awful", "bad", "hate", "worst",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    fn label(self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Neutral => "NEUTRAL",
        }
    }
}

/// 返回 (情感, 置信度)；置信度 = min(0.6 + 0.1 * 命中数, 0.95)，中性固定 0.5
pub fn analyze(text: &str) -> (Sentiment, f64) {
    let lower = text.to_lowercase();
    let count = |words: &[&str]| words.iter().filter(|w| lower.contains(*w)).count();
    let positive = count(POSITIVE_WORDS);
    let negative = count(NEGATIVE_WORDS);
    let confidence = |hits: usize| (0.6 + hits as f64 * 0.1).min(0.95);
    if positive > negative {
        (Sentiment::Positive, confidence(positive))
    } else if negative > positive {
        (Sentiment::Negative, confidence(negative))
    } else {
        (Sentiment::Neutral, 0.5)
    }
}

#[derive(Debug, Default)]
pub struct SentimentAnalyzerTool;

impl SentimentAnalyzerTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for SentimentAnalyzerTool {
    fn name(&self) -> &str {
        "sentiment_analyzer"
    }

    fn description(&self) -> &str {
        "Analyze the sentiment (positive, negative, neutral) of a text. \
         Useful for opinions, reviews and comments."
    }

    async fn execute(&self, input: &str) -> Result<String, String> {
        let text = input.trim();
        if text.is_empty() {
            return Err("Empty text to analyze".to_string());
        }
        let (sentiment, confidence) = analyze(text);
        let shown: String = text.chars().take(100).collect();
        let ellipsis = if text.chars().count() > 100 { "..." } else { "" };
        Ok(format!(
            "Text: \"{shown}{ellipsis}\"\nSentiment: {}\nConfidence: {:.1}%\nMethod: keyword analysis",
            sentiment.label(),
            confidence * 100.0
        ))
    }

    async fn health_check(&self) -> bool {
        analyze("great").0 == Sentiment::Positive
    }
}
