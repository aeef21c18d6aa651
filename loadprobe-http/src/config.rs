use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("loadprobe/", env!("CARGO_PKG_VERSION"));

/// Connection-level settings shared by every request of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bounds TCP connect. `None` leaves it to the OS, which can take tens of seconds
    /// against an unreachable host.
    pub connect_timeout: Option<Duration>,
    pub user_agent: String,
    /// Idle keep-alive connections kept per host.
    pub max_idle_per_host: usize,
    pub idle_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(3)),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_idle_per_host: 256,
            idle_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
