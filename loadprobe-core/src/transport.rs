use std::future::Future;

use bytes::Bytes;
use loadprobe_http::{HttpClient, HttpRequest};

/// A fully read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// For transports with their own deadline. [`RequestRunner`](crate::RequestRunner)
    /// classifies it exactly like its own timeout.
    #[error("request timed out")]
    Timeout,

    #[error("{kind}: {message}")]
    Failed { kind: String, message: String },
}

/// Issues one GET and reads the whole body.
///
/// The request timeout is enforced by the caller around the returned future.
pub trait Transport: Send + Sync + 'static {
    fn get(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

impl From<loadprobe_http::Error> for TransportError {
    fn from(err: loadprobe_http::Error) -> Self {
        Self::Failed {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl Transport for HttpClient {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let res = self
            .request(HttpRequest::get(url).with_header("accept", "application/json, */*"))
            .await?;
        Ok(TransportResponse {
            status: res.status,
            body: res.body,
        })
    }
}
