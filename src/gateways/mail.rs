//! Mail relay client: JSON POST with a bearer secret.

use serde_json::json;

use crate::config::MailGatewayConfig;

use super::GatewayError;

/// Client for the mail relay.
pub struct MailClient {
    http: reqwest::Client,
    config: MailGatewayConfig,
}

impl MailClient {
    pub fn new(config: MailGatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Send one message through the relay.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), GatewayError> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or(GatewayError::NotConfigured("MAIL_ENDPOINT"))?;

        let mut request = self.http.post(endpoint).json(&json!({
            "from": self.config.from,
            "to": to,
            "subject": subject,
            "body": body,
        }));
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(to, "mail delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: Option<String>) -> MailGatewayConfig {
        MailGatewayConfig {
            endpoint,
            token: Some("relay-token".to_string()),
            from: "noreply@formbase.local".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "to": "user@example.com",
                "subject": "Login code"
            })))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = MailClient::new(config(Some(server.uri())));
        client
            .send("user@example.com", "Login code", "123456")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upstream_failure_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("relay down"))
            .mount(&server)
            .await;

        let client = MailClient::new(config(Some(server.uri())));
        let result = client.send("user@example.com", "s", "b").await;
        match result {
            Err(GatewayError::Upstream { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "relay down");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint() {
        let client = MailClient::new(config(None));
        let result = client.send("user@example.com", "s", "b").await;
        assert!(matches!(result, Err(GatewayError::NotConfigured(_))));
    }
}
