//! The HTTP capability the engine drives: execute one configured GET and report the status or
//! the concrete reason it failed.
use barrage_core::RunConfig;
use reqwest::{Client, Url};
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use thiserror::Error;

/// Why a single request did not produce a response. The `Display` form is the stable kind
/// string tallied by the metrics store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection-refused")]
    ConnectionRefused,

    #[error("connect-timeout")]
    ConnectTimeout,

    #[error("read-timeout")]
    ReadTimeout,

    #[error("connection-reset")]
    ConnectionReset,

    #[error("dns-failure")]
    Dns,

    #[error("connect-error")]
    Connect,

    #[error("io-{}", kebab_case(.0))]
    Io(io::ErrorKind),

    #[error("protocol-error")]
    Protocol,
}

impl TransportError {
    pub fn kind(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let io_kind = io_error_kind(&err);

        if err.is_timeout() || io_kind == Some(io::ErrorKind::TimedOut) {
            return if err.is_connect() {
                TransportError::ConnectTimeout
            } else {
                TransportError::ReadTimeout
            };
        }

        match io_kind {
            Some(io::ErrorKind::ConnectionRefused) => return TransportError::ConnectionRefused,
            Some(io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted) => {
                return TransportError::ConnectionReset
            }
            _ => {}
        }

        if err.is_connect() {
            if is_dns_failure(&err) {
                TransportError::Dns
            } else {
                TransportError::Connect
            }
        } else if let Some(kind) = io_kind {
            TransportError::Io(kind)
        } else {
            TransportError::Protocol
        }
    }
}

/// `UnexpectedEof` becomes `unexpected-eof`.
fn kebab_case(kind: &io::ErrorKind) -> String {
    let name = format!("{kind:?}");
    let mut kebab = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                kebab.push('-');
            }
            kebab.push(c.to_ascii_lowercase());
        } else {
            kebab.push(c);
        }
    }
    kebab
}

fn sources<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&err| err.source())
}

fn io_error_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    sources(err)
        .find_map(|source| source.downcast_ref::<io::Error>())
        .map(io::Error::kind)
}

fn is_dns_failure(err: &reqwest::Error) -> bool {
    sources(err).any(|source| {
        let message = source.to_string();
        message.contains("dns error") || message.contains("failed to lookup address")
    })
}

/// Executes the run's configured request.
///
/// Implementations own their per-request timeout; a request that exceeds it resolves to
/// [`TransportError::ReadTimeout`] or [`TransportError::ConnectTimeout`] rather than hanging.
pub trait Transport: Send + Sync + 'static {
    fn execute(&self) -> impl Future<Output = Result<u16, TransportError>> + Send;
}

/// `reqwest`-backed GET against the target URL with a pooled client.
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(config: &RunConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(config.max_connections)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

impl Transport for HttpTransport {
    async fn execute(&self) -> Result<u16, TransportError> {
        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        // Drain so the connection goes back to the pool.
        response.bytes().await?;
        Ok(status.as_u16())
    }
}
