use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HubConfig;

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("hub not configured")]
    Unconfigured,
    #[error("hub request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("hub api error {status}: {body}")]
    Api { status: u16, body: String },
}

/// Thin client for the external Hub (AI + email) service. Bearer-style
/// authenticated JSON request/response; a 429 answer is retried exactly once
/// after the server-supplied delay, everything else fails immediately.
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HubClient {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    pub async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, HubError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.token.as_deref().ok_or(HubError::Unconfigured)?;
        let url = format!("{}{}", self.base_url, path);

        let mut retried = false;
        loop {
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header(reqwest::header::AUTHORIZATION, format!("WorkerHub {token}"));
            if let Some(body) = body {
                req = req.json(body);
            }
            let res = req.send().await?;

            if res.status() == StatusCode::TOO_MANY_REQUESTS && !retried {
                let delay = retry_after_secs(res.headers());
                warn!(path = %path, delay_secs = delay, "hub rate limited, retrying once");
                tokio::time::sleep(Duration::from_secs(delay)).await;
                retried = true;
                continue;
            }

            if !res.status().is_success() {
                let status = res.status().as_u16();
                let body = res.text().await.unwrap_or_default();
                return Err(HubError::Api { status, body });
            }

            debug!(path = %path, "hub request ok");
            return Ok(res.json::<T>().await?);
        }
    }
}

fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn client(token: Option<&str>) -> HubClient {
        HubClient::new(&HubConfig {
            url: "https://hub.invalid/api/".into(),
            token: token.map(String::from),
        })
    }

    #[test]
    fn configured_iff_token_present() {
        assert!(!client(None).is_configured());
        assert!(client(Some("t")).is_configured());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        assert_eq!(client(None).base_url, "https://hub.invalid/api");
    }

    #[tokio::test]
    async fn unconfigured_request_short_circuits() {
        let err = client(None)
            .request::<(), serde_json::Value>(Method::GET, "/hub/ai/v1/models", None)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Unconfigured));
    }

    #[test]
    fn retry_after_header_parses_with_default() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), DEFAULT_RETRY_AFTER_SECS);
        headers.insert(RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), 12);
        headers.insert(RETRY_AFTER, "garbage".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), DEFAULT_RETRY_AFTER_SECS);
    }
}
