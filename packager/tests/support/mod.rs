//! Test support utilities for packager behavioural tests.
//!
//! Provides an in-memory [`RemoteSource`] so fetch and bundle scenarios run
//! without network access.

use distpack_packager::fetch::FetchError;
use distpack_packager::fetch::download::RemoteSource;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A remote source serving fixed bodies and statuses by URI.
#[derive(Debug, Default)]
pub struct StaticSource {
    bodies: HashMap<String, Vec<u8>>,
    statuses: HashMap<String, u16>,
    requests: AtomicUsize,
}

impl StaticSource {
    /// Serve `body` at `uri`.
    pub fn with_body(mut self, uri: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(uri.to_owned(), body);
        self
    }

    /// Answer `uri` with an HTTP error status.
    pub fn with_status(mut self, uri: &str, status: u16) -> Self {
        self.statuses.insert(uri.to_owned(), status);
        self
    }

    /// Number of `open` calls so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RemoteSource for StaticSource {
    fn open(&self, uri: &str) -> Result<Box<dyn Read>, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(body) = self.bodies.get(uri) {
            return Ok(Box::new(Cursor::new(body.clone())));
        }
        let status = self.statuses.get(uri).copied().unwrap_or(404);
        Err(FetchError::RemoteFetch {
            uri: uri.to_owned(),
            status: Some(status),
            reason: format!("HTTP {status}"),
        })
    }
}
