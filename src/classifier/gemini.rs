//! Gemini `generateContent` client.
//!
//! Direct HTTP via reqwest's blocking client — classifier calls block the
//! calling request for their full duration (including retry backoff), and
//! there is no cancellation once a call starts.

use std::time::Duration;

use serde_json::{json, Value};

use super::{Provider, ProviderError};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Per-call HTTP timeout. Generous: structured-output calls on long
/// transcripts can take tens of seconds.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", API_BASE, self.model)
    }

    /// Concatenate all text parts from the first candidate.
    fn extract_text(body: &Value) -> String {
        body["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl Provider for GeminiClient {
    fn classify(&self, prompt: &str, schema: &Value) -> Result<Value, ProviderError> {
        let request = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseJsonSchema": schema,
            },
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json()?;
        let raw = Self::extract_text(&body);
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(serde_json::from_str(trimmed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_concatenates_parts() {
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] }
            }]
        });
        assert_eq!(GeminiClient::extract_text(&body), "{\"a\":1}");
    }

    #[test]
    fn test_extract_text_handles_missing_candidates() {
        let body = serde_json::json!({ "candidates": [] });
        assert_eq!(GeminiClient::extract_text(&body), "");
    }

    #[test]
    fn test_endpoint_includes_model() {
        let client = GeminiClient::new("key", "gemini-2.5-flash-lite");
        assert!(client
            .endpoint()
            .ends_with("models/gemini-2.5-flash-lite:generateContent"));
    }
}
