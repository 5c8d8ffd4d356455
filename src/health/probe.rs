//! Endpoint probes.
//!
//! A probe sends one minimal request to an endpoint and reports whether it
//! answered. The monitor owns timing and status bookkeeping; probes only
//! talk to the endpoint.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::config::schema::EndpointConfig;
use crate::selection::endpoint::Endpoint;

/// Why a probe did not pass.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("endpoint is rate limited")]
    RateLimited,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(String),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("no probe target for endpoint '{0}'")]
    NoTarget(String),
}

/// Liveness check for a single endpoint.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ProbeError>;
}

/// HTTP GET probe against a per-endpoint health URL.
///
/// A 2xx response passes and 429 reports [`ProbeError::RateLimited`].
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    targets: HashMap<String, Url>,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            targets: HashMap::new(),
        }
    }

    /// Probe targets taken from each endpoint's `health_url`.
    pub fn from_config(endpoints: &[EndpointConfig]) -> Self {
        let mut probe = Self::new(reqwest::Client::new());
        for endpoint in endpoints {
            if let Some(url) = &endpoint.health_url {
                probe = probe.with_target(endpoint.id.clone(), url.clone());
            }
        }
        probe
    }

    pub fn with_target(mut self, endpoint_id: impl Into<String>, url: Url) -> Self {
        self.targets.insert(endpoint_id.into(), url);
        self
    }

    pub fn target(&self, endpoint_id: &str) -> Option<&Url> {
        self.targets.get(endpoint_id)
    }
}

#[async_trait]
impl EndpointProbe for HttpProbe {
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ProbeError> {
        let url = self
            .targets
            .get(endpoint.id())
            .ok_or_else(|| ProbeError::NoTarget(endpoint.id().to_string()))?;

        let response = self
            .client
            .get(url.clone())
            .header("user-agent", "invocation-guard-health-check")
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(ProbeError::RateLimited)
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_target() {
        let probe = HttpProbe::new(reqwest::Client::new());
        let endpoint = Endpoint::new("unknown", "");
        assert!(matches!(probe.probe(&endpoint).await, Err(ProbeError::NoTarget(id)) if id == "unknown"));
    }

    #[test]
    fn test_targets_from_config() {
        let endpoints = vec![
            EndpointConfig {
                id: "a".into(),
                description: String::new(),
                rate_limit_rpm: None,
                health_url: Some(Url::parse("http://127.0.0.1:8080/health").unwrap()),
            },
            EndpointConfig {
                id: "b".into(),
                description: String::new(),
                rate_limit_rpm: None,
                health_url: None,
            },
        ];
        let probe = HttpProbe::from_config(&endpoints);
        assert_eq!(probe.target("a").map(Url::path), Some("/health"));
        assert!(probe.target("b").is_none());
    }
}
