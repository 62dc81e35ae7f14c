//! DNS-over-HTTPS client with per-request deadlines.

use std::net::Ipv4Addr;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio::time::timeout;

use crate::doh::types::{DohError, DohJsonResponse};

const DNS_JSON: &str = "application/dns-json";
const DNS_MESSAGE: &str = "application/dns-message";

/// Client for a single DNS-over-HTTPS endpoint.
#[derive(Clone)]
pub struct DohClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl DohClient {
    /// Create a client for `url`, bounding every request by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DohError> {
        let http = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            http,
            url: url.into(),
            timeout,
        })
    }

    /// Resolve the first IPv4 address of `domain` through a JSON A-record lookup.
    pub async fn lookup_ipv4(&self, domain: &str) -> Result<Ipv4Addr, DohError> {
        let request = self
            .http
            .get(&self.url)
            .query(&[("name", domain), ("type", "A")])
            .header(ACCEPT, DNS_JSON)
            .send();

        let body = timeout(self.timeout, async {
            let response = request.await?;
            if !response.status().is_success() {
                return Err(DohError::Status(response.status()));
            }
            Ok(response.bytes().await?)
        })
        .await
        .map_err(|_| DohError::Timeout)??;

        let answer: DohJsonResponse = serde_json::from_slice(&body)?;
        let ip = answer
            .first_ipv4()
            .ok_or_else(|| DohError::NoAnswer(domain.to_string()))?;

        tracing::debug!(domain = %domain, ip = %ip, "Resolved via DoH");
        Ok(ip)
    }

    /// Send one raw DNS message and return the raw response message.
    pub async fn exchange(&self, query: Bytes) -> Result<Bytes, DohError> {
        let query_len = query.len();
        let request = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, DNS_MESSAGE)
            .header(ACCEPT, DNS_MESSAGE)
            .body(query)
            .send();

        let answer = timeout(self.timeout, async {
            let response = request.await?;
            if !response.status().is_success() {
                return Err(DohError::Status(response.status()));
            }
            Ok(response.bytes().await?)
        })
        .await
        .map_err(|_| DohError::Timeout)??;

        tracing::trace!(query_len, answer_len = answer.len(), "DoH exchange complete");
        Ok(answer)
    }
}

impl std::fmt::Debug for DohClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DohClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
