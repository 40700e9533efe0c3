//! Web Search 工具：DuckDuckGo HTML 搜索
//!
//! GET 请求带超时与 User-Agent；用正则抽取结果标题、链接与摘要，摘要经 html2text 转为纯文本并截断到 200 字符。
//! offline 模式下不访问网络，返回一条固定结果（开发与测试用）。

use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use regex::Regex;
use reqwest::{Client, Url};

use crate::config::WebSearchSection;
use crate::tools::Tool;

const SNIPPET_MAX_CHARS: usize = 200;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// 单条搜索结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    region: String,
    max_results: usize,
    offline: bool,
    probe_on_health_check: bool,
}

impl WebSearchTool {
    pub fn new(cfg: &WebSearchSection) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            region: cfg.region.clone(),
            max_results: cfg.max_results.max(1),
            offline: cfg.offline,
            probe_on_health_check: cfg.probe_on_health_check,
        })
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, String> {
        if self.offline {
            return Ok(vec![SearchResult {
                title: format!("[OFFLINE] Result for: {query}"),
                snippet: "Web search is running in offline mode; enable network access for live results."
                    .to_string(),
                url: "https://example.com".to_string(),
            }]);
        }
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("kl", self.region.as_str())])
            .send()
            .await
            .map_err(|e| format!("Request failed: {e}"))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {e}"))?;
        Ok(parse_results(&body, max_results))
    }
}

/// 从 DuckDuckGo HTML 结果页抽取结果
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let (Ok(title_re), Ok(snippet_re)) = (
        Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#),
        Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#),
    ) else {
        return Vec::new();
    };
    let snippets: Vec<String> = snippet_re
        .captures_iter(html)
        .map(|c| html_to_text(&c[1]))
        .collect();
    title_re
        .captures_iter(html)
        .take(max_results)
        .enumerate()
        .map(|(i, c)| SearchResult {
            title: html_to_text(&c[2]),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
            url: resolve_link(&c[1]),
        })
        .collect()
}

/// DuckDuckGo 的链接是 //duckduckgo.com/l/?uddg=<目标地址>，取出真实 URL
fn resolve_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

fn html_to_text(fragment: &str) -> String {
    let text = match from_read(fragment.as_bytes(), 1000) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_tags(fragment),
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// 编号列表，摘要过长时截断
pub fn format_results(results: &[SearchResult], query: &str) -> String {
    let mut out = format!("Search results for '{query}':\n\n");
    for (i, r) in results.iter().enumerate() {
        let snippet = if r.snippet.chars().count() > SNIPPET_MAX_CHARS {
            format!("{}...", r.snippet.chars().take(SNIPPET_MAX_CHARS).collect::<String>())
        } else {
            r.snippet.clone()
        };
        out.push_str(&format!("{}. {}\n   {}\n   {}\n\n", i + 1, r.title, snippet, r.url));
    }
    out.push_str(&format!("Total: {} results", results.len()));
    out
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the internet for up-to-date information using DuckDuckGo. \
         Useful for recent data, news, prices, etc."
    }

    async fn execute(&self, input: &str) -> Result<String, String> {
        let query = input.trim();
        if query.is_empty() {
            return Err("Empty search query".to_string());
        }
        let results = self.search(query, self.max_results).await?;
        tracing::info!(query = %query, count = results.len(), "Web search completed");
        if results.is_empty() {
            return Ok(format!("No results found for: {query}"));
        }
        Ok(format_results(&results, query))
    }

    async fn health_check(&self) -> bool {
        if self.offline || !self.probe_on_health_check {
            return true;
        }
        match self.search("test", 1).await {
            Ok(results) => !results.is_empty(),
            Err(e) => {
                tracing::warn!(error = %e, "web_search health probe failed");
                false
            }
        }
    }
}
