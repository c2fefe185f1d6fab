//! Cluster-wide ingress throughput source.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use sweep_core::SweepError;
use tracing::debug;

/// Aggregation window for an ingress query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricWindow {
    /// How far back to look
    pub lookback: Duration,
    /// Aggregation period within the lookback
    pub period: Duration,
}

impl Default for MetricWindow {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(300),
            period: Duration::from_secs(300),
        }
    }
}

/// Aggregate ingress over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngressSample {
    pub mb_per_sec: f64,
    /// Largest deviation between brokers within the window
    #[serde(default)]
    pub max_deviation: f64,
}

#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn ingress_throughput(&self, window: MetricWindow) -> Result<IngressSample>;
}

/// Queries an HTTP metrics endpoint for cluster ingress.
pub struct HttpMetricSource {
    client: reqwest::Client,
    endpoint: String,
    cluster_id: String,
}

impl HttpMetricSource {
    pub fn new(endpoint: impl Into<String>, cluster_id: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SweepError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cluster_id: cluster_id.into(),
        })
    }

    pub fn ingress_url(&self) -> String {
        format!("{}/ingress", self.endpoint)
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    async fn ingress_throughput(&self, window: MetricWindow) -> Result<IngressSample> {
        let url = self.ingress_url();
        debug!("Querying ingress from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("cluster_id", self.cluster_id.clone()),
                ("window_secs", window.lookback.as_secs().to_string()),
                ("period_secs", window.period.as_secs().to_string()),
            ])
            .send()
            .await
            .map_err(|e| SweepError::TransientMetricQuery(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SweepError::TransientMetricQuery(format!("{url} returned {status}")).into());
        }

        let sample = response
            .json::<IngressSample>()
            .await
            .map_err(|e| SweepError::TransientMetricQuery(format!("invalid response from {url}: {e}")))?;
        Ok(sample)
    }
}
