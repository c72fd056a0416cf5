use safe_sweeper_core::classify::escalate::{
    AdvisorClient, AdvisorVerdict, ReviewRequest, ReviewResponse,
};
use safe_sweeper_core::error::ClassificationFailure;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

// Token pricing used to convert reported usage into spend.
const INPUT_COST_PER_MILLION: f64 = 0.14;
const OUTPUT_COST_PER_MILLION: f64 = 0.28;
const FALLBACK_CALL_COST: f64 = 0.025;

const SYSTEM_PROMPT: &str = "\
You are a filesystem cleanup risk assessor. For each submitted item, judge \
whether deleting it is safe, suspicious, or dangerous. Reply with a JSON \
array only, one object per item, each with fields: path, tier \
(\"safe\"|\"suspicious\"|\"dangerous\"), rationale (max 50 words), \
confidence (0.0-1.0), estimated_bytes_freed.";

/// Chat-completions transport for the escalated classifier. Every transport
/// or shape problem maps onto `ClassificationFailure`, which the core
/// absorbs by falling back to rule verdicts.
pub struct HttpAdvisor {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl HttpAdvisor {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> HttpAdvisor {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        HttpAdvisor {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

impl AdvisorClient for HttpAdvisor {
    fn review(&self, request: &ReviewRequest) -> Result<ReviewResponse, ClassificationFailure> {
        let items_json = serde_json::to_string_pretty(&request.items)
            .map_err(|e| ClassificationFailure::Parse(e.to_string()))?;
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Assess these items:\n{items_json}") },
            ],
        });

        debug!(
            "advisor request: {} items to {}",
            request.items.len(),
            self.api_url
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| ClassificationFailure::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassificationFailure::Network(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .map_err(|e| ClassificationFailure::Parse(e.to_string()))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ClassificationFailure::Incomplete("no choices in response".into()))?;

        let verdicts: Vec<AdvisorVerdict> = serde_json::from_str(strip_fences(content))
            .map_err(|e| ClassificationFailure::Parse(e.to_string()))?;

        let cost_usd = match chat.usage {
            Some(usage) => {
                usage.prompt_tokens as f64 / 1_000_000.0 * INPUT_COST_PER_MILLION
                    + usage.completion_tokens as f64 / 1_000_000.0 * OUTPUT_COST_PER_MILLION
            }
            None => FALLBACK_CALL_COST,
        };

        Ok(ReviewResponse { verdicts, cost_usd })
    }
}

/// Models habitually wrap JSON answers in markdown fences.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.split("```").next().unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_handles_plain_and_fenced_json() {
        assert_eq!(strip_fences("[1, 2]"), "[1, 2]");
        assert_eq!(strip_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_fences("```\n[1, 2]\n```"), "[1, 2]");
    }
}
