//! Endpoint pool with deterministic round-robin rotation.
//!
//! All configured endpoints are treated as equivalent. Rotation may skip
//! endpoints flagged unhealthy, but always yields an endpoint: when every
//! endpoint is flagged, rotation falls back to plain round-robin.

use tracing::{debug, warn};
use whalewatch_core::CoreError;

/// A feed endpoint: an address plus an opaque health flag.
#[derive(Debug, Clone)]
struct Endpoint {
    url: String,
    healthy: bool,
}

/// Ordered pool of equivalent feed endpoints with a rotation cursor.
///
/// Owned exclusively by one stream supervisor. No I/O.
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
    cursor: usize,
}

impl EndpointPool {
    /// Build a pool from configured addresses.
    ///
    /// An empty list is a configuration error: the stream must refuse to
    /// start rather than run with nowhere to connect.
    pub fn new(urls: Vec<String>) -> Result<Self, CoreError> {
        if urls.is_empty() {
            return Err(CoreError::InvalidConfig(
                "endpoint list must not be empty".to_string(),
            ));
        }
        let endpoints = urls
            .into_iter()
            .map(|url| Endpoint { url, healthy: true })
            .collect();
        Ok(Self {
            endpoints,
            cursor: 0,
        })
    }

    /// Current endpoint address.
    pub fn current(&self) -> &str {
        &self.endpoints[self.cursor].url
    }

    /// Advance the cursor circularly and return the new endpoint.
    ///
    /// Unhealthy endpoints are skipped; if all are unhealthy the cursor
    /// advances by exactly one position so rotation still wraps.
    pub fn rotate(&mut self) -> &str {
        for _ in 0..self.endpoints.len() {
            self.cursor = (self.cursor + 1) % self.endpoints.len();
            if self.endpoints[self.cursor].healthy {
                debug!(endpoint = %self.endpoints[self.cursor].url, "rotated endpoint");
                return &self.endpoints[self.cursor].url;
            }
        }

        warn!("all endpoints flagged unhealthy, falling back to round-robin");
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        &self.endpoints[self.cursor].url
    }

    /// Flag the current endpoint as unhealthy.
    pub fn mark_unhealthy(&mut self) {
        self.endpoints[self.cursor].healthy = false;
    }

    /// Clear the health flag on the current endpoint.
    pub fn mark_healthy(&mut self) {
        self.endpoints[self.cursor].healthy = true;
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
