//! Remote sources for pinned assets.
//!
//! Provides a trait-based abstraction over the network so that fetch and
//! bundle retrieval can be tested without HTTP access.

use super::FetchError;
use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;

/// Timeout for establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for receiving response headers.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Source of remote asset bytes.
///
/// # Examples
///
/// ```
/// use distpack_packager::fetch::download::{HttpSource, RemoteSource};
///
/// let source = HttpSource;
/// // source.open("https://example.test/asset.jar") streams the body in production.
/// # let _ = &source as &dyn RemoteSource;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait RemoteSource {
    /// Open a stream over the body at `uri`.
    ///
    /// Redirects are followed. Only a successful final status yields a
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::RemoteFetch`] when the request fails or ends
    /// with a non-success status.
    fn open(&self, uri: &str) -> Result<Box<dyn Read>, FetchError>;
}

/// HTTP source backed by a shared `ureq` agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpSource;

impl RemoteSource for HttpSource {
    fn open(&self, uri: &str) -> Result<Box<dyn Read>, FetchError> {
        log::debug!("GET {uri}");
        let response = http_agent()
            .get(uri)
            .call()
            .map_err(|e| map_ureq_error(uri, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::RemoteFetch {
                uri: uri.to_owned(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        Ok(Box::new(response.into_body().into_reader()))
    }
}

/// Shared `ureq` agent with timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .timeout_recv_response(Some(RESPONSE_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(uri: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(code) => FetchError::RemoteFetch {
            uri: uri.to_owned(),
            status: Some(*code),
            reason: format!("HTTP {code}"),
        },
        other => FetchError::RemoteFetch {
            uri: uri.to_owned(),
            status: None,
            reason: other.to_string(),
        },
    }
}
