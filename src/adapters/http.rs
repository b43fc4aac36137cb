use crate::config::toml_config::BrokerConfig;
use crate::domain::ports::RemoteVerifier;
use crate::utils::error::{BrokerError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const ROOT_DATAVERSE_PATH: &str = "/api/dataverses/:root";
const GENERIC_CREDENTIAL_MESSAGE: &str = "Could not validate credentials with the Dataverse server";

/// Dataverse API 的共同回應外殼
#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Verifies Dataverse backends over HTTP. Single attempt, bounded by the
/// client timeout.
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    client: Client,
}

impl HttpVerifier {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::build(timeout, None)
    }

    pub fn from_config(config: &BrokerConfig) -> Result<Self> {
        Self::build(config.verifier_timeout(), config.user_agent())
    }

    fn build(timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl RemoteVerifier for HttpVerifier {
    async fn ping_liveness(&self, url: &str) -> Result<()> {
        tracing::debug!("Pinging Dataverse at {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::warn!("❌ Liveness check failed for {}: {}", url, e);
            BrokerError::BackendUnreachable {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!("❌ Liveness check for {} returned 404", url);
            return Err(BrokerError::BackendUnreachable {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            });
        }

        tracing::debug!("Liveness check for {} returned {}", url, response.status());
        Ok(())
    }

    async fn ping_credential(&self, server_url: &str, token: &str) -> Result<()> {
        let endpoint = format!("{}{}", server_url.trim_end_matches('/'), ROOT_DATAVERSE_PATH);
        tracing::debug!("Validating credentials against {}", endpoint);

        let to_unreachable = |e: reqwest::Error| BrokerError::BackendUnreachable {
            url: endpoint.clone(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(&endpoint)
            .query(&[("key", token)])
            .send()
            .await
            .map_err(to_unreachable)?;
        let body = response.bytes().await.map_err(to_unreachable)?;

        match serde_json::from_slice::<StatusEnvelope>(&body) {
            Ok(envelope) if envelope.status.as_deref() == Some("OK") => Ok(()),
            Ok(envelope) => {
                tracing::warn!("❌ Credential rejected with status {:?}", envelope.status);
                Err(BrokerError::InvalidCredential {
                    message: envelope
                        .message
                        .unwrap_or_else(|| GENERIC_CREDENTIAL_MESSAGE.to_string()),
                })
            }
            Err(e) => {
                tracing::warn!("❌ Unparseable credential response: {}", e);
                Err(BrokerError::InvalidCredential {
                    message: GENERIC_CREDENTIAL_MESSAGE.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn verifier() -> HttpVerifier {
        HttpVerifier::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_liveness_success_ignores_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/dataverse/demo");
            then.status(200).body("<html>not json</html>");
        });

        verifier()
            .ping_liveness(&server.url("/dataverse/demo"))
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_liveness_server_error_is_still_reachable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(500);
        });

        assert!(verifier().ping_liveness(&server.url("/")).await.is_ok());
    }

    #[tokio::test]
    async fn test_liveness_not_found_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let result = verifier().ping_liveness(&server.url("/missing")).await;
        assert!(matches!(result, Err(BrokerError::BackendUnreachable { .. })));
    }

    #[tokio::test]
    async fn test_liveness_transport_error_fails() {
        // 沒有服務監聽的埠
        let result = verifier().ping_liveness("http://127.0.0.1:9/").await;
        assert!(matches!(result, Err(BrokerError::BackendUnreachable { .. })));
    }

    #[tokio::test]
    async fn test_liveness_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_secs(3));
        });

        let verifier = HttpVerifier::new(Duration::from_millis(500)).unwrap();
        let started = std::time::Instant::now();
        let result = verifier.ping_liveness(&server.url("/slow")).await;

        assert!(matches!(result, Err(BrokerError::BackendUnreachable { .. })));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_credential_ok() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/dataverses/:root")
                .query_param("key", "good-token");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"status": "OK", "data": {"alias": "root"}}));
        });

        verifier()
            .ping_credential(&server.base_url(), "good-token")
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_credential_rejected_carries_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/dataverses/:root");
            then.status(401)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "status": "ERROR",
                    "message": "Bad api key 'not-real-token'"
                }));
        });

        let result = verifier()
            .ping_credential(&server.base_url(), "not-real-token")
            .await;

        match result {
            Err(BrokerError::InvalidCredential { message }) => {
                assert_eq!(message, "Bad api key 'not-real-token'")
            }
            other => panic!("expected InvalidCredential, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_credential_unparseable_uses_generic_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/dataverses/:root");
            then.status(502).body("Bad Gateway");
        });

        let result = verifier()
            .ping_credential(&format!("{}/", server.base_url()), "tok")
            .await;

        match result {
            Err(BrokerError::InvalidCredential { message }) => {
                assert_eq!(message, GENERIC_CREDENTIAL_MESSAGE)
            }
            other => panic!("expected InvalidCredential, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_credential_envelope_without_status_keeps_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/dataverses/:root");
            then.status(401)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"message": "Bad api key 'x'"}));
        });

        let result = verifier().ping_credential(&server.base_url(), "x").await;

        match result {
            Err(BrokerError::InvalidCredential { message }) => {
                assert_eq!(message, "Bad api key 'x'")
            }
            other => panic!("expected InvalidCredential, got {:?}", other),
        }
    }
}
