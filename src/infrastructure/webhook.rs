use crate::config::DeliverySettings;
use crate::domain::ports::DynamicFulfiller;
use crate::domain::webhook::{DynamicPayload, parse_credentials};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "X-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| {
            PipelineError::ConfigError("webhook secret cannot key HMAC-SHA256".to_string())
        })?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Posts signed delivery requests to merchant endpoints.
pub struct WebhookDeliveryClient {
    client: Client,
    secret: String,
}

impl WebhookDeliveryClient {
    pub fn new(settings: &DeliverySettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.webhook_timeout).build()?;
        Ok(Self {
            client,
            secret: settings.webhook_secret.clone(),
        })
    }
}

#[async_trait]
impl DynamicFulfiller for WebhookDeliveryClient {
    async fn fetch_credentials(&self, url: &str, payload: &DynamicPayload) -> Result<Vec<String>> {
        // Signed bytes must be exactly the bytes sent.
        let body = serde_json::to_vec(payload)?;
        let signature = sign(&self.secret, &body)?;

        tracing::debug!(url, item_id = %payload.item.id, "Calling delivery webhook");
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::WebhookError(format!("{} responded with {}", url, status)));
        }
        let text = response.text().await?;
        Ok(parse_credentials(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_known_vector() {
        // RFC 4231 test case 2.
        let signature = sign("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_empty_secret_still_signs() {
        let signature = sign("", b"{}").unwrap();
        assert_eq!(signature.len(), 64);
    }
}
