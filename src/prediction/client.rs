//! Scoring service client
//!
//! [`ScoringService`] is the seam between the bridge and the remote crop
//! recommendation service. [`HttpScoringClient`] is the production
//! implementation: one JSON `POST` per request, no retries.

use crate::config::ScoringConfig;
use crate::error::{AgrolinkError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use super::form::PredictionRequest;

/// Successful response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub suitable_crop: String,
}

/// Remote crop scoring
pub trait ScoringService: Send + Sync {
    /// Submit a request and return the recommended crop label
    fn predict(&self, request: &PredictionRequest) -> impl Future<Output = Result<String>> + Send;
}

/// JSON-over-HTTP scoring client
#[derive(Debug, Clone)]
pub struct HttpScoringClient {
    client: reqwest::Client,
    url: String,
}

impl HttpScoringClient {
    /// Client for the endpoint and timeout in `config`
    pub fn new(config: &ScoringConfig) -> Result<Self> {
        Self::with_url(config.predict_url(), Duration::from_secs(config.timeout_secs))
    }

    /// Client for an explicit endpoint URL
    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgrolinkError::NetworkFailed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ScoringService for HttpScoringClient {
    async fn predict(&self, request: &PredictionRequest) -> Result<String> {
        tracing::info!("Submitting prediction request to {}", self.url);
        tracing::debug!("Prediction request: {:?}", request);

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| AgrolinkError::NetworkFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = status.canonical_reason().unwrap_or("unknown status").to_string();
            tracing::warn!("Scoring service rejected request: HTTP {}", status.as_u16());
            return Err(AgrolinkError::ServiceRejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: PredictionResponse = response.json().await.map_err(|e| {
            AgrolinkError::NetworkFailed(format!("Invalid response body: {}", e))
        })?;
        tracing::info!("Scoring service suggested '{}'", body.suitable_crop);
        Ok(body.suitable_crop)
    }
}
