use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

/// Details the gateway holds for a payment intent.
///
/// `receipt` carries the internal order id we attached at intent creation.
/// Settlement trusts it over anything the client sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDetails {
    pub id: String,
    pub receipt: String,
    pub amount: i64,
    pub currency: String,
}

/// Payment gateway abstraction used by checkout and settlement.
///
/// The production implementation talks to Razorpay; tests swap in a fake.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount` minor units, tagging it with
    /// `receipt` so the order can be recovered later from the intent alone.
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        receipt: Uuid,
    ) -> Result<String, ServiceError>;

    /// Fetch an existing intent by its gateway id.
    async fn fetch_intent(&self, intent_id: &str) -> Result<IntentDetails, ServiceError>;
}

/// Verify a settlement signature.
///
/// The gateway signs `"{intent_id}|{payment_id}"` with HMAC-SHA256 keyed by
/// the shared secret and sends the lowercase hex digest. Comparison is
/// constant time so the check leaks no prefix information.
pub fn verify_settlement_signature(
    secret: &str,
    intent_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<bool, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("Invalid gateway secret".to_string()))?;
    mac.update(format!("{}|{}", intent_id, payment_id).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    Ok(constant_time_eq(&expected, signature))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Razorpay order payload for intent creation.
#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: String,
}

#[derive(Debug, Deserialize)]
struct GatewayOrder {
    id: String,
    receipt: Option<String>,
    amount: i64,
    currency: String,
}

/// Razorpay-backed gateway client.
#[derive(Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(base_url: String, key_id: String, key_secret: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id,
            key_secret,
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(skip(self))]
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        receipt: Uuid,
    ) -> Result<String, ServiceError> {
        let body = CreateOrderBody {
            amount,
            currency,
            receipt: receipt.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gateway intent creation request failed: {}", e);
                ServiceError::GatewayUnavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Gateway rejected intent creation with status {}", status);
            return Err(ServiceError::GatewayUnavailable(format!(
                "intent creation returned {}",
                status
            )));
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayUnavailable(e.to_string()))?;

        Ok(order.id)
    }

    #[instrument(skip(self))]
    async fn fetch_intent(&self, intent_id: &str) -> Result<IntentDetails, ServiceError> {
        let response = self
            .client
            .get(format!("{}/orders/{}", self.base_url, intent_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| {
                error!("Gateway intent fetch request failed: {}", e);
                ServiceError::GatewayUnavailable(e.to_string())
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(format!(
                "Payment intent {} not found",
                intent_id
            )));
        }

        if !response.status().is_success() {
            return Err(ServiceError::GatewayUnavailable(format!(
                "intent fetch returned {}",
                response.status()
            )));
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayUnavailable(e.to_string()))?;

        let receipt = order.receipt.ok_or_else(|| {
            ServiceError::GatewayUnavailable("intent is missing its receipt".to_string())
        })?;

        Ok(IntentDetails {
            id: order.id,
            receipt,
            amount: order.amount,
            currency: order.currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, intent_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}|{}", intent_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let sig = sign("gw_secret", "order_abc", "pay_xyz");
        assert!(verify_settlement_signature("gw_secret", "order_abc", "pay_xyz", &sig).unwrap());
    }

    #[test]
    fn wrong_secret_fails() {
        let sig = sign("other_secret", "order_abc", "pay_xyz");
        assert!(!verify_settlement_signature("gw_secret", "order_abc", "pay_xyz", &sig).unwrap());
    }

    #[test]
    fn swapped_fields_fail() {
        let sig = sign("gw_secret", "order_abc", "pay_xyz");
        assert!(!verify_settlement_signature("gw_secret", "pay_xyz", "order_abc", &sig).unwrap());
    }

    #[test]
    fn truncated_signature_fails() {
        let sig = sign("gw_secret", "order_abc", "pay_xyz");
        assert!(
            !verify_settlement_signature("gw_secret", "order_abc", "pay_xyz", &sig[..32]).unwrap()
        );
    }

    #[test]
    fn constant_time_eq_handles_lengths() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
