//! HTTP client with connection pooling and retry logic

use devnet_config::NetworkConfig;
use devnet_errors::{ChainError, Error};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 4,
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            user_agent: format!("devnet/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&NetworkConfig> for NetConfig {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout),
            retry_count: config.retries,
            retry_delay: Duration::from_secs(config.retry_delay),
            ..Self::default()
        }
    }
}

/// HTTP client wrapper with retry logic
#[derive(Clone)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ChainError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Execute a GET request with retries
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retry attempts.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        reqwest::Url::parse(url).map_err(|e| ChainError::InvalidUrl(format!("{url}: {e}")))?;
        self.retry_request(|| self.client.get(url).send()).await
    }

    /// GET `url` and decode a JSON body
    ///
    /// # Errors
    ///
    /// Returns `HttpError` for non-success statuses and `InvalidResponse` if
    /// the body does not decode as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        let response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::HttpError {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            }
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChainError::RequestFailed(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ChainError::InvalidResponse {
                endpoint: url.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Execute a request with retries
    async fn retry_request<F, Fut>(&self, mut f: F) -> Result<Response, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay * attempt).await;
            }

            match f().await {
                Ok(response) if response.status().is_server_error() => {
                    tracing::debug!(status = %response.status(), attempt, "server error, retrying");
                    if attempt == self.config.retry_count {
                        return Ok(response);
                    }
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    let retry = Self::should_retry(&e);
                    tracing::debug!(error = %e, attempt, retry, "request failed");
                    last_error = Some(e);
                    if !retry {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) if e.is_timeout() => Err(ChainError::Timeout {
                url: e
                    .url()
                    .map(std::string::ToString::to_string)
                    .unwrap_or_default(),
            }
            .into()),
            Some(e) if e.is_connect() => Err(ChainError::ConnectionRefused(e.to_string()).into()),
            Some(e) => Err(ChainError::RequestFailed(e.to_string()).into()),
            None => Err(ChainError::RequestFailed("Unknown error".to_string()).into()),
        }
    }

    /// Determine if an error should be retried
    fn should_retry(error: &reqwest::Error) -> bool {
        error.is_timeout()
            || error.is_connect()
            || error.status().is_none_or(|s| s.is_server_error())
    }
}
