use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::outcome::{Outcome, RequestOutcome};
use crate::stats::StatRecorder;
use crate::transport::{Transport, TransportError};

/// Per-request observability hook. Called after the outcome is recorded.
pub type OutcomeFn = Arc<dyn Fn(&RequestOutcome) + Send + Sync + 'static>;

/// Executes single requests against `base_url` and feeds the recorder.
pub struct RequestRunner<T> {
    transport: T,
    base_url: Arc<str>,
    timeout: Duration,
    recorder: Arc<StatRecorder>,
    observer: Option<OutcomeFn>,
}

impl<T: Transport> RequestRunner<T> {
    pub fn new(
        transport: T,
        base_url: &str,
        timeout: Duration,
        recorder: Arc<StatRecorder>,
    ) -> Result<Self> {
        let parsed = url::Url::parse(base_url).map_err(|err| Error::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }

        Ok(Self {
            transport,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            timeout,
            recorder,
            observer: None,
        })
    }

    #[must_use]
    pub fn with_observer(mut self, observer: OutcomeFn) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn recorder(&self) -> &Arc<StatRecorder> {
        &self.recorder
    }

    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path)
    }

    /// Runs one request to completion. Every failure becomes an [`Outcome`].
    pub async fn execute(&self, id: u64, endpoint: &Endpoint) -> RequestOutcome {
        let url = self.url_for(endpoint);
        let timeout = endpoint.timeout.unwrap_or(self.timeout);

        let started = Instant::now();
        let res = tokio::time::timeout(timeout, self.transport.get(&url)).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let timeout_ms = timeout.as_secs_f64() * 1000.0;

        let (outcome, latency_ms) = match res {
            Err(_) | Ok(Err(TransportError::Timeout)) => (Outcome::Timeout, timeout_ms),
            Ok(Err(TransportError::Failed { kind, message })) => {
                tracing::debug!(id, %url, %kind, %message, "transport failure");
                (Outcome::TransportError { kind, message }, elapsed_ms)
            }
            Ok(Ok(res)) => (endpoint.expect.classify(res.status, &res.body), elapsed_ms),
        };

        let outcome = RequestOutcome {
            id,
            endpoint: endpoint.path.clone(),
            outcome,
            latency_ms,
            timestamp: SystemTime::now(),
        };

        self.recorder.record(&outcome);
        tracing::debug!(
            id,
            endpoint = %outcome.endpoint,
            kind = %outcome.outcome.kind(),
            latency_ms = outcome.latency_ms,
            "request finished"
        );

        if let Some(observer) = &self.observer {
            // A misbehaving observer must not take the worker down with it.
            if std::panic::catch_unwind(AssertUnwindSafe(|| observer(&outcome))).is_err() {
                tracing::warn!(id, "outcome observer panicked");
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::atomic::{AtomicU64, Ordering};

    use bytes::Bytes;

    use super::*;
    use crate::endpoint::Expectation;
    use crate::outcome::StatusKey;
    use crate::transport::TransportResponse;

    enum Behavior {
        Status(u16, &'static str),
        Stall,
        Refused,
        TimeoutError,
    }

    struct Scripted {
        behavior: Behavior,
        latency: Duration,
        seen_urls: parking_lot::Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(behavior: Behavior, latency: Duration) -> Self {
            Self {
                behavior,
                latency,
                seen_urls: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Scripted {
        async fn get(&self, url: &str) -> std::result::Result<TransportResponse, TransportError> {
            self.seen_urls.lock().push(url.to_string());
            tokio::time::sleep(self.latency).await;
            match self.behavior {
                Behavior::Status(status, body) => Ok(TransportResponse {
                    status,
                    body: Bytes::from_static(body.as_bytes()),
                }),
                Behavior::Stall => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(TransportError::Timeout)
                }
                Behavior::Refused => Err(TransportError::Failed {
                    kind: "request".to_string(),
                    message: "connection refused".to_string(),
                }),
                Behavior::TimeoutError => Err(TransportError::Timeout),
            }
        }
    }

    fn runner(behavior: Behavior, latency: Duration) -> RequestRunner<Scripted> {
        RequestRunner::new(
            Scripted::new(behavior, latency),
            "http://localhost:8000/",
            Duration::from_secs(1),
            Arc::new(StatRecorder::new()),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn ok_response_is_success_with_measured_latency() {
        let r = runner(Behavior::Status(200, "{}"), Duration::from_millis(25));
        let out = r.execute(1, &Endpoint::new("/test/simple")).await;

        assert_eq!(out.outcome, Outcome::Success { status: 200 });
        assert!((out.latency_ms - 25.0).abs() < 1.0, "latency {}", out.latency_ms);
        assert_eq!(&*out.endpoint, "/test/simple");
        assert_eq!(
            r.transport.seen_urls.lock().as_slice(),
            ["http://localhost:8000/test/simple".to_string()]
        );

        let snap = r.recorder().snapshot();
        assert_eq!((snap.total, snap.success, snap.failed), (1, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn non_200_is_http_error_and_counts_as_failed() {
        let r = runner(Behavior::Status(500, "boom"), Duration::from_millis(5));
        let out = r.execute(1, &Endpoint::new("/test/database")).await;
        assert_eq!(out.outcome, Outcome::HttpError(500));

        let snap = r.recorder().snapshot();
        assert_eq!((snap.total, snap.success, snap.failed), (1, 0, 1));
        assert_eq!(snap.status_histogram.get(&StatusKey::Code(500)), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn stall_is_timeout_with_bound_latency() {
        let r = runner(Behavior::Stall, Duration::ZERO);
        let out = r.execute(7, &Endpoint::new("/test/slow")).await;
        assert_eq!(out.outcome, Outcome::Timeout);
        assert_eq!(out.latency_ms, 1000.0);

        let ep = Endpoint::new("/test/slow").with_timeout(Duration::from_millis(250));
        let out = r.execute(8, &ep).await;
        assert_eq!(out.outcome, Outcome::Timeout);
        assert_eq!(out.latency_ms, 250.0);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_timeout_is_classified_as_timeout() {
        let r = runner(Behavior::TimeoutError, Duration::from_millis(1));
        let out = r.execute(1, &Endpoint::new("/test/cache")).await;
        assert_eq!(out.outcome, Outcome::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connection_is_transport_error() {
        let r = runner(Behavior::Refused, Duration::from_millis(1));
        let out = r.execute(1, &Endpoint::new("/test/cache")).await;
        assert!(matches!(out.outcome, Outcome::TransportError { .. }));
        let snap = r.recorder().snapshot();
        assert_eq!(snap.status_histogram.get(&StatusKey::TransportError), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn body_expectation_is_applied() {
        let r = runner(Behavior::Status(200, r#"{"status":"degraded"}"#), Duration::ZERO);
        let ep = Endpoint::new("/test/cpu").expecting(Expectation::JsonField {
            field: "status".to_string(),
            equals: "ok".to_string(),
        });
        let out = r.execute(1, &ep).await;
        assert!(matches!(out.outcome, Outcome::CheckFailed { status: 200, .. }));
        assert_eq!(r.recorder().snapshot().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_each_outcome_and_panics_are_contained() {
        let seen = Arc::new(AtomicU64::new(0));
        let seen2 = seen.clone();
        let r = runner(Behavior::Status(200, ""), Duration::ZERO).with_observer(Arc::new(
            move |o: &RequestOutcome| {
                seen2.fetch_add(1, Ordering::Relaxed);
                if o.id == 2 {
                    panic!("observer bug");
                }
            },
        ));

        for id in 1..=3 {
            let out = r.execute(id, &Endpoint::new("/test/simple")).await;
            assert!(out.outcome.is_success());
        }
        assert_eq!(seen.load(Ordering::Relaxed), 3);
        assert_eq!(r.recorder().total(), 3);
    }

    #[test]
    fn invalid_base_urls_are_rejected() {
        let rec = Arc::new(StatRecorder::new());
        let bad = RequestRunner::new(
            Scripted::new(Behavior::Refused, Duration::ZERO),
            "localhost:8000",
            Duration::from_secs(1),
            rec.clone(),
        );
        assert!(matches!(bad, Err(Error::InvalidBaseUrl { .. })));

        let bad = RequestRunner::new(
            Scripted::new(Behavior::Refused, Duration::ZERO),
            "not a url",
            Duration::from_secs(1),
            rec,
        );
        assert!(matches!(bad, Err(Error::InvalidBaseUrl { .. })));
    }
}
