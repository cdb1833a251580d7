use std::time::Duration;

use funnel_core::config::CrmConfig;
use funnel_core::SourceError;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Paging and throttling knobs for the Nicoka API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportSettings {
    pub page_size: u32,
    pub rate_limit_delay: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            page_size: 200,
            rate_limit_delay: Duration::from_millis(100),
            retry_delay: Duration::from_millis(500),
            max_retries: 3,
        }
    }
}

impl From<&CrmConfig> for TransportSettings {
    fn from(config: &CrmConfig) -> Self {
        Self {
            page_size: config.page_size,
            rate_limit_delay: config.rate_limit_delay(),
            retry_delay: config.retry_delay(),
            max_retries: config.max_retries,
        }
    }
}

/// Read-only HTTP client for the Nicoka REST API.
#[derive(Clone)]
pub struct NicokaClient {
    http: Client,
    base_url: String,
    api_token: Option<SecretString>,
    settings: TransportSettings,
}

impl NicokaClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<SecretString>,
        settings: TransportSettings,
    ) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| SourceError::Configuration(format!("http client: {err}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, api_token, settings })
    }

    pub fn from_config(config: &CrmConfig) -> Result<Self, SourceError> {
        Self::new(config.resolved_base_url(), config.api_token.clone(), config.into())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn settings(&self) -> TransportSettings {
        self.settings
    }

    /// Every record of a listing endpoint, following `limit`/`offset` pages.
    pub async fn fetch_all(&self, endpoint: &str) -> Result<Vec<Value>, SourceError> {
        let limit = u64::from(self.settings.page_size.max(1));
        let mut records = Vec::new();
        let mut offset = 0_u64;

        loop {
            let payload = self.fetch_page(endpoint, limit, offset).await?;
            let data = match payload.get("data") {
                Some(data) if is_truthy(data) => data,
                _ => &payload,
            };
            let Some(items) = data.as_array() else {
                break;
            };
            records.extend(items.iter().cloned());
            debug!(
                event_name = "funnel.crm.page_fetched",
                endpoint,
                offset,
                count = items.len() as u64,
                "fetched crm page"
            );

            let has_pages = payload.get("pages").is_some_and(is_truthy);
            let total = payload.get("total").and_then(as_u64).unwrap_or(0);
            if !has_pages || offset + limit >= total {
                break;
            }
            offset += limit;
            tokio::time::sleep(self.settings.rate_limit_delay).await;
        }

        Ok(records)
    }

    async fn fetch_page(
        &self,
        endpoint: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Value, SourceError> {
        let token = self.api_token.as_ref().ok_or_else(|| {
            SourceError::Configuration("crm api token is not configured".to_string())
        })?;
        let url = format!("{}{}", self.base_url, endpoint);
        let attempts = self.settings.max_retries.max(1);

        for attempt in 1..=attempts {
            let response = self
                .http
                .get(&url)
                .bearer_auth(token.expose_secret())
                .query(&[("limit", limit), ("offset", offset)])
                .send()
                .await
                .map_err(|err| unavailable(endpoint, err.to_string()))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(
                    event_name = "funnel.crm.throttled",
                    endpoint,
                    attempt,
                    max_attempts = attempts,
                    "crm rate limited request"
                );
                if attempt < attempts {
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(unavailable(endpoint, format!("HTTP {}: {}", status.as_u16(), body)));
            }

            return response.json::<Value>().await.map_err(|err| SourceError::Decode {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            });
        }

        Err(SourceError::Throttled { endpoint: endpoint.to_string(), attempts })
    }
}

fn unavailable(endpoint: &str, message: String) -> SourceError {
    SourceError::Unavailable { endpoint: endpoint.to_string(), message }
}

// Mirrors the API's loose flags: null, false, 0 and "" are all "absent".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => {
            number.as_u64().or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
        }
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{as_u64, is_truthy};

    #[test]
    fn truthiness_follows_loose_flags() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!(3)));
        assert!(is_truthy(&json!([])));
    }

    #[test]
    fn totals_accept_numbers_and_numeric_strings() {
        assert_eq!(as_u64(&json!(450)), Some(450));
        assert_eq!(as_u64(&json!("450")), Some(450));
        assert_eq!(as_u64(&json!("n/a")), None);
    }
}
