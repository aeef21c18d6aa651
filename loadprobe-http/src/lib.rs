#![forbid(unsafe_code)]
//! Minimal HTTP/1.1 client used to fire load-test requests.

mod client;
mod config;
mod error;
mod types;
mod util;

pub use client::HttpClient;
pub use config::ClientConfig;
pub use error::{Error, HttpTransportErrorKind, Result};
pub use types::{HttpRequest, HttpResponse};
