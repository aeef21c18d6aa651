use std::sync::Arc;
use std::time::Duration;

use crate::outcome::Outcome;

/// What a response must look like to count as a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// The response status must equal this code.
    Status(u16),

    /// Status 200 and a JSON object body whose `field` is the string `equals`.
    JsonField { field: String, equals: String },

    /// Status 200 and a body containing `text`.
    BodyContains(String),
}

impl Default for Expectation {
    fn default() -> Self {
        Self::Status(200)
    }
}

impl Expectation {
    #[must_use]
    pub fn expected_status(&self) -> u16 {
        match self {
            Self::Status(code) => *code,
            Self::JsonField { .. } | Self::BodyContains(_) => 200,
        }
    }

    /// Classifies a received response. Never fails.
    pub fn classify(&self, status: u16, body: &[u8]) -> Outcome {
        if status != self.expected_status() {
            return Outcome::HttpError(status);
        }

        match self {
            Self::Status(_) => Outcome::Success { status },
            Self::JsonField { field, equals } => {
                match serde_json::from_slice::<serde_json::Value>(body) {
                    Ok(value) => {
                        if value.get(field).and_then(serde_json::Value::as_str)
                            == Some(equals.as_str())
                        {
                            Outcome::Success { status }
                        } else {
                            Outcome::CheckFailed {
                                status,
                                reason: format!("invalid response data (`{field}` != `{equals}`)"),
                            }
                        }
                    }
                    Err(err) => Outcome::CheckFailed {
                        status,
                        reason: format!("json parse error: {err}"),
                    },
                }
            }
            Self::BodyContains(text) => {
                if String::from_utf8_lossy(body).contains(text.as_str()) {
                    Outcome::Success { status }
                } else {
                    Outcome::CheckFailed {
                        status,
                        reason: format!("`{text}` not found in response"),
                    }
                }
            }
        }
    }
}

/// One target path plus how to pick and judge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: Arc<str>,
    /// Relative weight for weighted selection.
    pub weight: u32,
    /// Overrides the run-wide request timeout.
    pub timeout: Option<Duration>,
    pub expect: Expectation,
}

impl Endpoint {
    pub fn new(path: &str) -> Self {
        Self {
            path: Arc::from(path),
            weight: 1,
            timeout: None,
            expect: Expectation::default(),
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn expecting(mut self, expect: Expectation) -> Self {
        self.expect = expect;
        self
    }
}

/// The six application endpoints, all with equal weight.
pub fn default_endpoints() -> Vec<Endpoint> {
    [
        "/test/simple",
        "/test/cpu",
        "/test/memory",
        "/test/database",
        "/test/cache",
        "/test/mixed",
    ]
    .into_iter()
    .map(Endpoint::new)
    .collect()
}

/// User-behavior mix: mostly cheap calls, occasional slow ones, rare admin metrics scrapes.
pub fn weighted_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new("/test/simple").with_weight(40),
        Endpoint::new("/test/cpu")
            .with_weight(20)
            .expecting(Expectation::JsonField {
                field: "status".to_string(),
                equals: "ok".to_string(),
            }),
        Endpoint::new("/test/memory").with_weight(15),
        Endpoint::new("/test/database").with_weight(10),
        Endpoint::new("/test/cache").with_weight(10),
        Endpoint::new("/test/mixed").with_weight(5),
        Endpoint::new("/test/slow")
            .with_weight(3)
            .with_timeout(Duration::from_secs(10)),
        Endpoint::new("/metrics")
            .with_weight(1)
            .expecting(Expectation::BodyContains("laravel_app".to_string())),
    ]
}
