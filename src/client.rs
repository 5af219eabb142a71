//! Recommendation service client
//!
//! The service is an opaque endpoint: POST a query plus conversation
//! context, get back reply text and optional book cards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::context::RequestContext;
use crate::error::{ChatError, ChatResult};
use crate::models::Recommendation;

const RECOMMEND_PATH: &str = "/get_recommendation";

/// Outgoing recommendation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationRequest {
    pub query: String,
    pub context: RequestContext,
}

/// Service reply
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecommendationResponse {
    pub response: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub recommendations: Option<Vec<Recommendation>>,
}

/// Anything that can answer a recommendation request
#[async_trait]
pub trait RecommendationService: Send + Sync {
    async fn recommend(&self, request: &RecommendationRequest) -> ChatResult<RecommendationResponse>;
}

/// HTTP implementation against the service base URL
#[derive(Debug, Clone)]
pub struct HttpRecommender {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpRecommender {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}{}", endpoint.trim_end_matches('/'), RECOMMEND_PATH),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RecommendationService for HttpRecommender {
    async fn recommend(&self, request: &RecommendationRequest) -> ChatResult<RecommendationResponse> {
        tracing::debug!(url = %self.url, follow_up = request.context.is_follow_up, "requesting recommendations");

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Transport(format!("API error {}: {}", status, body)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        parse_response(&body)
    }
}

/// Decode a service reply
pub fn parse_response(body: &[u8]) -> ChatResult<RecommendationResponse> {
    serde_json::from_slice(body).map_err(|e| ChatError::Parse(e.to_string()))
}

/// Check that the service answers at all
pub async fn check_connectivity(endpoint: &str) -> anyhow::Result<()> {
    use anyhow::Context;

    let client = reqwest::Client::new();
    client
        .get(endpoint)
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))?;
    Ok(())
}
