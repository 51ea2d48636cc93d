//! REST API client for the exchange

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

use super::auth::{generate_auth_headers, AuthHeaders};
use super::messages::*;
use super::retry::RetryPolicy;
use crate::common::errors::{EngineError, Result};
use crate::common::types::{MarketSnapshot, OrderRequest, OrderResult};
use crate::config::types::{ApiCredentials, ExchangeConfig};

/// REST API client for market quotes and order entry
///
/// Every call goes through the retry policy; errors returned here are the
/// typed failure left after the policy gave up.
#[derive(Debug, Clone)]
pub struct ExchangeRestClient {
    /// HTTP client
    client: Client,
    /// Base URL for the REST API, without trailing slash
    base_url: String,
    /// Path component of the base URL, used as the signing prefix
    base_path: String,
    /// Optional API credentials for signed endpoints
    credentials: Option<ApiCredentials>,
    /// Retry policy applied to every request
    retry: RetryPolicy,
}

impl ExchangeRestClient {
    /// Create a new REST client (unauthenticated)
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(5))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let base_path = url::Url::parse(&base_url)
            .map_err(|e| EngineError::Configuration(format!("invalid exchange URL: {}", e)))?
            .path()
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            base_path,
            credentials: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Build a signed client from configuration
    pub fn from_config(config: &ExchangeConfig) -> Result<Self> {
        Ok(Self::with_timeout(&config.rest_url, config.request_timeout())?
            .with_credentials(config.credentials()?)
            .with_retry_policy(RetryPolicy::new(config.max_attempts, config.backoff_base())))
    }

    /// Set API credentials for authenticated requests
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generate authentication headers if credentials are set
    fn auth_headers(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<Option<AuthHeaders>> {
        match &self.credentials {
            Some(creds) => Ok(Some(generate_auth_headers(creds, method, path, body)?)),
            None => Ok(None),
        }
    }

    /// Path that is signed for an endpoint, e.g. `/trade-api/v2/order`
    fn signing_path(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_path, endpoint)
    }

    // ========================================================================
    // Market Data
    // ========================================================================

    /// Get the current quote for a market
    #[instrument(skip(self))]
    pub async fn get_market(&self, market_id: &str) -> Result<MarketSnapshot> {
        let endpoint = format!("/markets/{}", market_id);
        let url = format!("{}{}", self.base_url, endpoint);
        let path = self.signing_path(&endpoint);
        let (url, path) = (&url, &path);

        self.retry
            .run("GET market", || async move {
                debug!("Fetching market from: {}", url);
                let mut request = self.client.get(url);
                if let Some(headers) = self.auth_headers("GET", path, None)? {
                    request = headers.apply_to_request(request);
                }

                let response = Self::check_status(request.send().await?, market_id).await?;
                let envelope: MarketEnvelope = response.json().await?;
                envelope.market.to_snapshot().ok_or_else(|| {
                    EngineError::InvalidResponse(format!(
                        "price out of range for {}: {}",
                        market_id, envelope.market.price
                    ))
                })
            })
            .await
    }

    // ========================================================================
    // Order Entry (Authentication Required)
    // ========================================================================

    /// Submit an IOC order
    #[instrument(skip(self), fields(market_id = %order.market_id, action = %order.action))]
    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderResult> {
        if self.credentials.is_none() {
            return Err(EngineError::Authentication(
                "order entry requires API credentials".to_string(),
            ));
        }

        let url = format!("{}/order", self.base_url);
        let path = self.signing_path("/order");
        let body = serde_json::to_string(&OrderBody::from(order))?;
        let (url, path, body) = (&url, &path, body.as_str());

        self.retry
            .run("POST order", || async move {
                debug!("Submitting order: {}", body);
                let mut request = self
                    .client
                    .post(url)
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.to_string());
                if let Some(headers) = self.auth_headers("POST", path, Some(body))? {
                    request = headers.apply_to_request(request);
                }

                let response = Self::check_status(request.send().await?, &order.market_id).await?;
                let ack: OrderResponse = response.json().await?;
                Ok::<_, EngineError>(OrderResult {
                    order_id: ack.order.order_id,
                    fill_price: ack.order.fill_price.unwrap_or(order.price),
                })
            })
            .await
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Map non-success statuses onto typed errors
    async fn check_status(response: Response, market_id: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_seconds = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(EngineError::RateLimit {
                message: format!("exchange returned {}", status),
                retry_after_seconds,
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(EngineError::MarketNotFound(market_id.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or(body);
        Err(EngineError::InvalidResponse(format!(
            "Server returned status {}: {}",
            status, detail
        )))
    }
}
