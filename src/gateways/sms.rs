//! SMS gateway client.
//!
//! Speaks the tencent-cloud SendSms JSON API (version 2019-07-11) directly:
//! a TC3-HMAC-SHA256 signed POST, no vendor SDK. The endpoint is
//! configurable so tests can point it at a mock server.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::SmsGatewayConfig;

use super::GatewayError;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "sms";
const ACTION: &str = "SendSms";
const VERSION: &str = "2019-07-11";

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute the TC3-HMAC-SHA256 authorization header value.
pub(crate) fn tc3_authorization(
    secret_id: &str,
    secret_key: &str,
    host: &str,
    payload: &str,
    timestamp: i64,
    date: &str,
) -> String {
    let canonical_request = format!(
        "POST\n/\n\ncontent-type:application/json; charset=utf-8\nhost:{host}\n\ncontent-type;host\n{}",
        sha256_hex(payload.as_bytes())
    );
    let credential_scope = format!("{date}/{SERVICE}/tc3_request");
    let string_to_sign = format!(
        "TC3-HMAC-SHA256\n{timestamp}\n{credential_scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let secret_date = hmac_sha256(format!("TC3{secret_key}").as_bytes(), date.as_bytes());
    let secret_service = hmac_sha256(&secret_date, SERVICE.as_bytes());
    let secret_signing = hmac_sha256(&secret_service, b"tc3_request");
    let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes()));

    format!(
        "TC3-HMAC-SHA256 Credential={secret_id}/{credential_scope}, SignedHeaders=content-type;host, Signature={signature}"
    )
}

/// Client for the SMS gateway.
pub struct SmsClient {
    http: reqwest::Client,
    config: SmsGatewayConfig,
}

impl SmsClient {
    pub fn new(config: SmsGatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn credentials(&self) -> Result<(&str, &str, &str, &str), GatewayError> {
        let secret_id = self
            .config
            .secret_id
            .as_deref()
            .ok_or(GatewayError::NotConfigured("SMS_SECRET_ID"))?;
        let secret_key = self
            .config
            .secret_key
            .as_deref()
            .ok_or(GatewayError::NotConfigured("SMS_SECRET_KEY"))?;
        let sign_name = self
            .config
            .sign_name
            .as_deref()
            .ok_or(GatewayError::NotConfigured("SMS_SIGN_NAME"))?;
        let template_id = self
            .config
            .template_id
            .as_deref()
            .ok_or(GatewayError::NotConfigured("SMS_TEMPLATE_ID"))?;
        Ok((secret_id, secret_key, sign_name, template_id))
    }

    /// Send a templated message (login codes and notices alike) to one
    /// phone number.
    pub async fn send(&self, phone: &str, param: &str) -> Result<(), GatewayError> {
        let (secret_id, secret_key, sign_name, template_id) = self.credentials()?;

        let url = Url::parse(&self.config.endpoint)
            .map_err(|_| GatewayError::NotConfigured("SMS_ENDPOINT"))?;
        let host = url.host_str().unwrap_or_default().to_string();

        let payload = json!({
            "PhoneNumberSet": [format!("+86{phone}")],
            "Sign": sign_name,
            "TemplateID": template_id,
            "TemplateParamSet": [param],
        })
        .to_string();

        let now = Utc::now();
        let timestamp = now.timestamp();
        let date = now.format("%Y-%m-%d").to_string();
        let authorization =
            tc3_authorization(secret_id, secret_key, &host, &payload, timestamp, &date);

        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Authorization", authorization)
            .header("X-TC-Action", ACTION)
            .header("X-TC-Version", VERSION)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Region", &self.config.region)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
        let code = parsed["Response"]["SendStatusSet"][0]["Code"]
            .as_str()
            .unwrap_or_default();
        if code != "Ok" {
            return Err(GatewayError::Rejected(body));
        }

        tracing::info!(phone, "SMS delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> SmsGatewayConfig {
        SmsGatewayConfig {
            endpoint: endpoint.to_string(),
            secret_id: Some("AKIDtest".to_string()),
            secret_key: Some("secret".to_string()),
            sign_name: Some("Formbase".to_string()),
            template_id: Some("12345".to_string()),
            region: "ap-guangzhou".to_string(),
        }
    }

    #[test]
    fn test_tc3_signature_shape_and_stability() {
        let a = tc3_authorization("id", "key", "host", "{}", 1_700_000_000, "2023-11-14");
        let b = tc3_authorization("id", "key", "host", "{}", 1_700_000_000, "2023-11-14");
        assert_eq!(a, b);
        assert!(a.starts_with("TC3-HMAC-SHA256 Credential=id/2023-11-14/sms/tc3_request"));
        let signature = a.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));

        // Different payloads sign differently.
        let c = tc3_authorization("id", "key", "host", "{\"x\":1}", 1_700_000_000, "2023-11-14");
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_send_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header_exists("Authorization"))
            .and(header_exists("X-TC-Timestamp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Response": {"SendStatusSet": [{"Code": "Ok"}]}
            })))
            .mount(&server)
            .await;

        let client = SmsClient::new(config(&server.uri()));
        client.send("13800000000", "123456").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_rejected_by_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Response": {"SendStatusSet": [{"Code": "LimitExceeded"}]}
            })))
            .mount(&server)
            .await;

        let client = SmsClient::new(config(&server.uri()));
        let result = client.send("13800000000", "123456").await;
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let mut cfg = config("https://sms.tencentcloudapi.com");
        cfg.secret_key = None;
        let client = SmsClient::new(cfg);
        let result = client.send("13800000000", "123456").await;
        assert!(matches!(result, Err(GatewayError::NotConfigured(_))));
    }
}
