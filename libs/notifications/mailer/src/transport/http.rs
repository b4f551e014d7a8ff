//! Transactional API over HTTPS.

use super::{ApiTransport, TransportError, TransportResponse};
use crate::config::ApiConfig;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Posts message bodies to `{base_url}/{version}/send` with basic auth.
pub struct HttpApiTransport {
    client: Client,
    url: String,
    public_key: String,
    private_key: String,
}

impl HttpApiTransport {
    /// Fails when either key is missing.
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        if !config.has_credentials() {
            return Err(TransportError::Config(
                "API public and private keys are required".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.send_url(),
            public_key: config.public_key.clone(),
            private_key: config.private_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ApiTransport for HttpApiTransport {
    fn post(&self, body: &Value) -> Result<TransportResponse, TransportError> {
        debug!(url = %self.url, "Posting message to API");

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.public_key, Some(&self.private_key))
            .json(body)
            .send()?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let text = response.text()?;
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if status.is_success() {
            Ok(TransportResponse::accepted(data, reason))
        } else {
            error!(status = %status, "API rejected the message");
            Ok(TransportResponse::rejected(data, reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_is_config_error() {
        let config = ApiConfig {
            public_key: "pub".to_string(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            HttpApiTransport::new(&config),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn test_url_from_config() {
        let config = ApiConfig {
            public_key: "pub".to_string(),
            private_key: "priv".to_string(),
            base_url: "http://localhost:8025/".to_string(),
            version: "v3".to_string(),
            ..ApiConfig::default()
        };
        let transport = HttpApiTransport::new(&config).unwrap();
        assert_eq!(transport.url(), "http://localhost:8025/v3/send");
    }
}
