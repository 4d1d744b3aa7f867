//! External classifier client.
//!
//! The orchestrator talks to the model through the [`Provider`] trait so
//! tests can script responses; the production implementation is the Gemini
//! client in [`gemini`]. Prompt assembly lives in [`prompts`], separate from
//! the code that drives the call.

pub mod gemini;
pub mod prompts;

use std::time::Duration;

use serde_json::{json, Value};

pub use gemini::GeminiClient;

/// Indicators that mark a classifier failure as a transient rate limit.
/// Matched against the status line and error body.
const RATE_LIMIT_INDICATORS: &[&str] = &[
    "ResourceExhausted",
    "TooManyRequests",
    "RESOURCE_EXHAUSTED",
    "TOO_MANY_REQUESTS",
];

/// Errors from a classifier call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Classifier response contained no text")]
    EmptyResponse,

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// True when the failure is a transient rate-limit signal worth
    /// retrying. Anything else propagates immediately.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            ProviderError::Api { status, message } => {
                *status == 429
                    || RATE_LIMIT_INDICATORS
                        .iter()
                        .any(|marker| message.contains(marker))
            }
            ProviderError::Http(err) => {
                err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
            }
            _ => false,
        }
    }

    /// True when the response was structurally unusable (empty or not the
    /// requested JSON shape). Retrying will not fix these.
    pub fn is_invalid_output(&self) -> bool {
        matches!(
            self,
            ProviderError::EmptyResponse | ProviderError::Json(_)
        )
    }
}

/// Retry budget for rate-limited classifier calls. The backoff is a fixed
/// interval, not exponential — the upstream quota window is fixed-size.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(60),
        }
    }
}

/// Seam between the orchestrator and the external model.
pub trait Provider {
    /// Send one prompt, constrained to the given JSON schema, and return
    /// the decoded JSON document. Blocks for the duration of the call.
    fn classify(&self, prompt: &str, schema: &Value) -> Result<Value, ProviderError>;
}

/// JSON schema sent with every classification request. Mirrors
/// [`crate::types::ClassificationPayload`]; the decoded response is still
/// range-checked after parsing.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sentiment": { "type": "integer", "minimum": -2, "maximum": 2 },
            "urgency": { "type": "integer", "minimum": 0, "maximum": 3 },
            "budget_tier": { "type": ["string", "null"], "enum": ["Low", "Medium", "High", null] },
            "buyer_role": { "type": ["string", "null"] },
            "use_case": { "type": ["string", "null"] },
            "origin": { "type": ["string", "null"] },
            "automatization": { "type": ["boolean", "null"] },
            "pains": { "type": "array", "items": { "type": "string" } },
            "objections": { "type": "array", "items": { "type": "string" } },
            "competitors": { "type": "array", "items": { "type": "string" } },
            "risks": { "type": "array", "items": { "type": "string" } },
            "next_step_clarity": { "type": ["integer", "null"], "minimum": 0, "maximum": 3 },
            "fit_score": { "type": "number", "minimum": 0, "maximum": 1 },
            "close_probability": { "type": "number", "minimum": 0, "maximum": 1 },
            "summary": { "type": ["string", "null"] }
        },
        "required": ["sentiment", "urgency", "fit_score", "close_probability"]
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider for orchestrator and pipeline tests.

    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use serde_json::Value;

    use super::{Provider, ProviderError};

    pub struct MockProvider {
        responses: RefCell<VecDeque<Result<Value, ProviderError>>>,
        pub calls: Cell<u32>,
        pub last_prompt: RefCell<Option<String>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                responses: RefCell::new(VecDeque::new()),
                calls: Cell::new(0),
                last_prompt: RefCell::new(None),
            }
        }

        pub fn push_ok(&self, value: Value) {
            self.responses.borrow_mut().push_back(Ok(value));
        }

        pub fn push_err(&self, err: ProviderError) {
            self.responses.borrow_mut().push_back(Err(err));
        }

        pub fn rate_limit_err() -> ProviderError {
            ProviderError::Api {
                status: 429,
                message: "RESOURCE_EXHAUSTED".to_string(),
            }
        }

        /// A payload every range check accepts.
        pub fn valid_payload() -> Value {
            serde_json::json!({
                "sentiment": 1,
                "urgency": 2,
                "budget_tier": "Medium",
                "buyer_role": "Decisor",
                "use_case": "Atención al cliente",
                "origin": "Referido",
                "automatization": true,
                "pains": ["respuesta lenta"],
                "objections": [],
                "competitors": [],
                "risks": ["presupuesto ajustado"],
                "next_step_clarity": 2,
                "fit_score": 0.75,
                "close_probability": 0.5,
                "summary": "Cliente interesado"
            })
        }
    }

    impl Provider for MockProvider {
        fn classify(&self, prompt: &str, _schema: &Value) -> Result<Value, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            *self.last_prompt.borrow_mut() = Some(prompt.to_string());
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("MockProvider ran out of scripted responses")
        }
    }
}
