//! Answering service client.
//!
//! Retrieval ends at ranked chunk text; turning that into a
//! natural-language answer is an external collaborator's job. The
//! built-in [`OpenRouterAnswerer`] posts one chat-completion request per
//! question to an OpenRouter-compatible endpoint — a single attempt, no
//! retry: transport failures surface to the caller as-is.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::AnswerConfig;
use crate::models::QueryHit;
use crate::registry::StoreRegistry;
use crate::traits::AnsweringService;

/// Chat-completions client for an OpenRouter-compatible endpoint.
///
/// Requires the `OPENROUTER_API_KEY` environment variable.
pub struct OpenRouterAnswerer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenRouterAnswerer {
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl AnsweringService for OpenRouterAnswerer {
    async fn answer(&self, context: &str, question: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful assistant analyzing a codebase. \
                                Provide clear, accurate answers based on the provided code context."
                },
                {
                    "role": "user",
                    "content": format!(
                        "Here are relevant code snippets:\n\n{}\n\nQuestion: {}",
                        context, question
                    )
                }
            ]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("answering service error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid answering service response: missing content"))
    }
}

/// Join ranked chunks into the context block sent to the service.
pub fn assemble_context(hits: &[QueryHit]) -> String {
    hits.iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// True when the only retrieved chunk is the empty-repository
/// placeholder — not worth a service round-trip.
pub fn is_placeholder_only(hits: &[QueryHit]) -> bool {
    hits.len() == 1
        && hits[0]
            .metadata
            .get("placeholder")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
}

/// Retrieve context for a question against one tenant and answer it.
pub async fn ask(
    registry: &StoreRegistry,
    answerer: &dyn AnsweringService,
    tenant_id: i64,
    question: &str,
    limit: usize,
) -> Result<String> {
    let hits = registry.query(tenant_id, question, limit).await?;

    if hits.is_empty() {
        return Ok(
            "No relevant code found for your question. The codebase might be empty or not \
             properly processed."
                .to_string(),
        );
    }

    if is_placeholder_only(&hits) {
        return Ok(
            "This codebase appears to contain no processable source code files. It may contain \
             only documentation, images, or other non-code files."
                .to_string(),
        );
    }

    let context = assemble_context(&hits);
    answerer.answer(&context, question).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str, metadata: serde_json::Value) -> QueryHit {
        QueryHit {
            text: text.to_string(),
            distance: 0.0,
            metadata,
        }
    }

    #[test]
    fn test_assemble_context_joins_with_separator() {
        let hits = vec![
            hit("fn a() {}", serde_json::json!({})),
            hit("fn b() {}", serde_json::json!({})),
        ];
        assert_eq!(assemble_context(&hits), "fn a() {}\n---\nfn b() {}");
    }

    #[test]
    fn test_placeholder_only_detection() {
        let placeholder = vec![hit("nothing here", serde_json::json!({"placeholder": true}))];
        assert!(is_placeholder_only(&placeholder));

        let real = vec![
            hit("nothing here", serde_json::json!({"placeholder": true})),
            hit("fn a() {}", serde_json::json!({})),
        ];
        assert!(!is_placeholder_only(&real));
        assert!(!is_placeholder_only(&[hit("fn a() {}", serde_json::json!({}))]));
    }
}
