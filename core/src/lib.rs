//! Core utilities and shared types for the fuzzing engine.

pub mod cancel;
pub mod ratelimiter;

use std::fmt;
use thiserror::Error;
use url::{Host, Url};

pub use cancel::CancelToken;
pub use ratelimiter::RateLimiter;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid service url: {0}")]
    InvalidUrl(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Where a captured request was sent: scheme, host and port.
///
/// `host` is a bare name or address; IPv6 literals carry no brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpService {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl HttpService {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        HttpService { scheme, host: host.into(), port }
    }

    /// Parse `http(s)://host[:port]`. Any path or query is ignored.
    pub fn from_url(s: &str) -> Result<Self, ServiceError> {
        let url = Url::parse(s).map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", s, e)))?;
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(ServiceError::UnsupportedScheme(other.to_string())),
        };
        let host = match url.host() {
            Some(Host::Domain(d)) => d.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(ServiceError::InvalidUrl(format!("{}: missing host", s))),
        };
        let port = url.port().unwrap_or_else(|| scheme.default_port());
        Ok(HttpService { scheme, host, port })
    }

    /// `host` when the port is the scheme default, `host:port` otherwise.
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') { format!("[{}]", self.host) } else { self.host.clone() };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

impl fmt::Display for HttpService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme.as_str(), self.authority())
    }
}
