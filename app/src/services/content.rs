//! Listing copy generated from a tool's website

use async_trait::async_trait;
use kit::FrameworkError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ensure_success;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_PAGE_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You are an expert copywriter for a directory of open source \
alternatives to proprietary software. Given the text of a tool's website, reply with a single \
JSON object and nothing else, using the keys: \"tagline\" (max 60 characters), \"description\" \
(max 160 characters), \"content\" (2-3 short markdown paragraphs, no headings), \"categories\" \
(1-3 broad category names) and \"alternatives\" (names of up to 5 proprietary products this tool \
replaces). Write in a neutral, factual tone.";

/// Generated fields plus the names of the terms to attach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub tagline: String,
    pub description: String,
    pub content: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, website_url: &str) -> Result<GeneratedContent, FrameworkError>;
}

/// Content generator over the Anthropic Messages API
pub struct AnthropicContentGenerator {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl AnthropicContentGenerator {
    pub fn new(http: reqwest::Client, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key,
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }


    async fn page_text(&self, website_url: &str) -> Result<String, FrameworkError> {
        let response = self.http.get(website_url).send().await?;
        let html = ensure_success("website", response).await?.text().await?;
        let text = html2text::from_read(html.as_bytes(), 100).unwrap_or_default();
        Ok(text.chars().take(MAX_PAGE_CHARS).collect())
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[async_trait]
impl ContentGenerator for AnthropicContentGenerator {
    async fn generate(&self, website_url: &str) -> Result<GeneratedContent, FrameworkError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FrameworkError::not_configured("anthropic"))?;

        let page = self.page_text(website_url).await?;
        tracing::debug!(model = %self.model, website_url, chars = page.len(), "generating content");

        let body = json!({
            "model": self.model,
            "max_tokens": 2048,
            "system": SYSTEM_PROMPT,
            "messages": [{
                "role": "user",
                "content": format!("Website: {}\n\n{}", website_url, page),
            }],
        });

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let message: MessagesResponse = ensure_success("anthropic", response).await?.json().await?;

        let text = message
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        parse_generated(&text)
    }
}

/// Pull the JSON object out of a model reply, tolerating code fences and
/// surrounding prose
pub fn parse_generated(reply: &str) -> Result<GeneratedContent, FrameworkError> {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        return Err(FrameworkError::upstream("anthropic", "reply contained no JSON object"));
    };
    if end < start {
        return Err(FrameworkError::upstream("anthropic", "reply contained no JSON object"));
    }

    let mut generated: GeneratedContent = serde_json::from_str(&reply[start..=end])
        .map_err(|e| FrameworkError::upstream("anthropic", format!("malformed reply: {}", e)))?;

    generated.categories.retain(|name| !name.trim().is_empty());
    generated.alternatives.retain(|name| !name.trim().is_empty());
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generated_strips_fences() {
        let reply = "Here you go:\n```json\n{\"tagline\":\"Open source Firebase\",\
            \"description\":\"Postgres development platform.\",\"content\":\"Supabase is...\",\
            \"categories\":[\"Databases\",\" \"],\"alternatives\":[\"Firebase\"]}\n```";

        let generated = parse_generated(reply).unwrap();
        assert_eq!(generated.tagline, "Open source Firebase");
        assert_eq!(generated.categories, vec!["Databases".to_string()]);
        assert_eq!(generated.alternatives, vec!["Firebase".to_string()]);
    }

    #[test]
    fn test_parse_generated_rejects_prose() {
        let err = parse_generated("I could not read that website.").unwrap_err();
        assert!(err.is_retriable());
    }
}
