use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// How a single request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Expected status received and every body check passed.
    Success { status: u16 },

    /// The server answered with an unexpected status.
    HttpError(u16),

    /// Expected status received, but the body did not satisfy the endpoint's expectation.
    CheckFailed { status: u16, reason: String },

    /// No complete response within the request timeout.
    Timeout,

    /// Connection-level failure (refused, DNS, reset, malformed response...).
    TransportError { kind: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    HttpError,
    CheckFailed,
    Timeout,
    TransportError,
}

/// Status histogram bucket. Every outcome maps to exactly one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusKey {
    Code(u16),
    Timeout,
    TransportError,
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Timeout => f.write_str("timeout"),
            Self::TransportError => f.write_str("error"),
        }
    }
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Success,
            Self::HttpError(_) => OutcomeKind::HttpError,
            Self::CheckFailed { .. } => OutcomeKind::CheckFailed,
            Self::Timeout => OutcomeKind::Timeout,
            Self::TransportError { .. } => OutcomeKind::TransportError,
        }
    }

    #[must_use]
    pub fn status_key(&self) -> StatusKey {
        match self {
            Self::Success { status } | Self::CheckFailed { status, .. } => StatusKey::Code(*status),
            Self::HttpError(status) => StatusKey::Code(*status),
            Self::Timeout => StatusKey::Timeout,
            Self::TransportError { .. } => StatusKey::TransportError,
        }
    }

    /// HTTP status when a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.status_key() {
            StatusKey::Code(code) => Some(code),
            StatusKey::Timeout | StatusKey::TransportError => None,
        }
    }
}

/// Immutable record of one finished request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    /// 1-based id in claim order.
    pub id: u64,
    pub endpoint: Arc<str>,
    pub outcome: Outcome,
    pub latency_ms: f64,
    pub timestamp: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_outcome_has_one_bucket() {
        assert_eq!(Outcome::Success { status: 200 }.status_key(), StatusKey::Code(200));
        assert_eq!(Outcome::HttpError(500).status_key(), StatusKey::Code(500));
        assert_eq!(
            Outcome::CheckFailed {
                status: 200,
                reason: "invalid response data".to_string()
            }
            .status_key(),
            StatusKey::Code(200)
        );
        assert_eq!(Outcome::Timeout.status_key(), StatusKey::Timeout);
        assert_eq!(
            Outcome::TransportError {
                kind: "request".to_string(),
                message: "connection refused".to_string()
            }
            .status_key(),
            StatusKey::TransportError
        );
    }

    #[test]
    fn status_keys_sort_codes_first() {
        let mut keys = vec![
            StatusKey::TransportError,
            StatusKey::Code(500),
            StatusKey::Timeout,
            StatusKey::Code(200),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                StatusKey::Code(200),
                StatusKey::Code(500),
                StatusKey::Timeout,
                StatusKey::TransportError
            ]
        );
        assert_eq!(StatusKey::Timeout.to_string(), "timeout");
        assert_eq!(StatusKey::Code(404).to_string(), "404");
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(Outcome::HttpError(503).kind().to_string(), "http_error");
        assert_eq!(OutcomeKind::TransportError.to_string(), "transport_error");
    }
}
