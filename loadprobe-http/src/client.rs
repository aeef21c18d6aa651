use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http_body_util::{BodyExt as _, Empty};
use hyper::Request;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use super::config::DEFAULT_USER_AGENT;
use super::util::{has_header, parse_target};
use super::{ClientConfig, Error, HttpRequest, HttpResponse, Result};

type Inner = Client<HttpsConnector<HttpConnector>, Empty<Bytes>>;

/// Pooled keep-alive client. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Inner,
    user_agent: HeaderValue,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self {
            inner: build_inner(&ClientConfig::default()),
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
        }
    }
}

impl HttpClient {
    pub fn with_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            inner: build_inner(config),
            user_agent: HeaderValue::from_str(&config.user_agent)?,
        })
    }

    /// Sends the request and reads the full response body.
    ///
    /// Only connecting is bounded here; callers bound the whole exchange.
    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let req = self.build(req)?;
        let (parts, body) = self.inner.request(req).await?.into_parts();
        let body = body.collect().await?.to_bytes();

        Ok(HttpResponse {
            status: parts.status.as_u16(),
            body,
        })
    }

    fn build(&self, req: HttpRequest) -> Result<Request<Empty<Bytes>>> {
        parse_target(&req.url)?;
        let uri: hyper::Uri = req
            .url
            .parse()
            .map_err(|_| Error::InvalidUrl(req.url.clone()))?;

        let mut builder = Request::builder().method(req.method).uri(uri);
        if !has_header(&req.headers, header::USER_AGENT.as_str()) {
            builder = builder.header(header::USER_AGENT, self.user_agent.clone());
        }
        for (k, v) in &req.headers {
            builder = builder.header(HeaderName::from_bytes(k.as_bytes())?, HeaderValue::from_str(v)?);
        }

        Ok(builder.body(Empty::new())?)
    }
}

fn build_inner(config: &ClientConfig) -> Inner {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(config.connect_timeout);
    http.set_nodelay(true);

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new())
        .pool_timer(TokioTimer::new())
        .pool_idle_timeout(config.idle_timeout)
        .pool_max_idle_per_host(config.max_idle_per_host)
        .build(https)
}
