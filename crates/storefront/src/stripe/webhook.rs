//! Webhook signature verification and event payloads.
//!
//! The `Stripe-Signature` header looks like `t=1492774577,v1=5257a8...,v1=...`.
//! A delivery is authentic when one of the `v1` values equals
//! `HMAC-SHA256(secret, "{t}.{body}")` and `t` is recent.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

use crate::models::PaymentDetails;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed delivery, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Why a delivery was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,

    #[error("malformed Stripe-Signature header")]
    Malformed,

    #[error("timestamp outside the tolerance window")]
    Expired,

    #[error("no signature matches the payload")]
    Mismatch,
}

/// Verify a webhook delivery.
///
/// # Errors
///
/// See [`SignatureError`].
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    for signature in &signatures {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        // verify_slice compares in constant time
        if mac.verify_slice(signature).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Compute the `v1` signature for a payload. Used to sign test deliveries.
#[must_use]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Envelope of a webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The fields of a Checkout Session we act on.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedSession {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub shipping_details: Option<ShippingDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub address: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShippingDetails {
    #[serde(default)]
    pub address: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CompletedSession {
    /// Raw `metadata.draft_order_id`, if present and non-empty.
    #[must_use]
    pub fn draft_order_ref(&self) -> Option<&str> {
        self.metadata
            .get("draft_order_id")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Payment details for a draft order: the customer's billing address.
    #[must_use]
    pub fn draft_payment(&self) -> PaymentDetails {
        let customer = self.customer_details.as_ref();
        PaymentDetails {
            session_id: self.id.clone(),
            address: customer.and_then(|c| c.address.clone()),
            customer_name: customer.and_then(|c| c.name.clone()),
            customer_email: customer.and_then(|c| c.email.clone()),
        }
    }

    /// Payment details for a cart order: the collected shipping address,
    /// falling back to the customer address.
    #[must_use]
    pub fn order_payment(&self) -> PaymentDetails {
        let mut details = self.draft_payment();
        if let Some(shipping) = &self.shipping_details {
            if shipping.address.is_some() {
                details.address.clone_from(&shipping.address);
            }
            if details.customer_name.is_none() {
                details.customer_name.clone_from(&shipping.name);
            }
        }
        details
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const NOW: i64 = 1_760_000_000;

    fn header_for(payload: &[u8], secret: &str, t: i64) -> String {
        format!("t={t},v1={}", sign_payload(payload, secret, t))
    }

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = header_for(payload, SECRET, NOW);
        assert_eq!(
            verify_signature(payload, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Ok(())
        );
    }

    #[test]
    fn test_any_v1_may_match() {
        let payload = b"{}";
        let good = sign_payload(payload, SECRET, NOW);
        let header = format!("t={NOW},v1={},v1={good},v0=abc", "00".repeat(32));
        assert!(verify_signature(payload, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_wrong_secret_or_modified_payload() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = header_for(payload, "whsec_other", NOW);
        assert_eq!(
            verify_signature(payload, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::Mismatch)
        );

        let header = header_for(payload, SECRET, NOW);
        let tampered = br#"{"type":"checkout.session.completed","x":1}"#;
        assert_eq!(
            verify_signature(tampered, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let payload = b"{}";
        let header = header_for(payload, SECRET, NOW - 600);
        assert_eq!(
            verify_signature(payload, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        for t in [i64::MIN, i64::MAX, -1] {
            let header = format!("t={t},v1={}", "00".repeat(32));
            assert_eq!(
                verify_signature(b"{}", &header, "whsec_x", NOW, DEFAULT_TOLERANCE_SECS),
                Err(SignatureError::Expired),
                "{t}"
            );
        }
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "garbage", "v1=abcd", "t=1760000000", "t=abc,v1=zz"] {
            assert_eq!(
                verify_signature(b"{}", header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
                Err(SignatureError::Malformed),
                "{header}"
            );
        }
    }

    #[test]
    fn test_completed_session_fields() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_9",
                "metadata": { "draft_order_id": " " },
                "customer_details": {
                    "name": "Maria Souza",
                    "email": "maria@example.com",
                    "address": { "city": "Aracaju", "postal_code": "49095806" }
                },
                "shipping_details": {
                    "name": "Maria S.",
                    "address": { "city": "São Paulo", "postal_code": "01310100" }
                }
            }}
        }))
        .unwrap();

        let session: CompletedSession = serde_json::from_value(event.data.object).unwrap();
        assert_eq!(session.draft_order_ref(), None);

        let draft = session.draft_payment();
        assert_eq!(draft.address.unwrap()["city"], "Aracaju");

        let order = session.order_payment();
        assert_eq!(order.address.unwrap()["city"], "São Paulo");
        assert_eq!(order.customer_name.as_deref(), Some("Maria Souza"));
        assert_eq!(order.customer_email.as_deref(), Some("maria@example.com"));
    }
}
