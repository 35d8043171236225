//! Webhook signature verification and event decoding
//!
//! Stripe signs each delivery with an HMAC-SHA256 over
//! `"{timestamp}.{payload}"`, carried in the `stripe-signature`
//! header as `t=<timestamp>,v1=<hex digest>`. Deliveries older than
//! the tolerance window are rejected even with a valid digest.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{Result, ShopError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed delivery
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Current unix time, for callers of [`verify_signature`]
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Parse `t=<timestamp>,v1=<hex>` out of the signature header
fn parse_signature_header(header: &str) -> Result<(i64, String)> {
    let mut timestamp: Option<i64> = None;
    let mut v1: Option<String> = None;

    for part in header.split(',') {
        let kv: Vec<&str> = part.trim().splitn(2, '=').collect();
        if kv.len() == 2 {
            match kv[0] {
                "t" => timestamp = kv[1].parse().ok(),
                "v1" => v1 = Some(kv[1].to_string()),
                _ => {}
            }
        }
    }

    let timestamp = timestamp.ok_or_else(|| ShopError::InvalidSignature {
        message: "missing timestamp".to_string(),
    })?;
    let v1 = v1.ok_or_else(|| ShopError::InvalidSignature {
        message: "missing v1 signature".to_string(),
    })?;

    Ok((timestamp, v1))
}

/// Verify a delivery's signature against the signing secret.
///
/// `now` is passed in rather than read from the clock so the
/// tolerance check is deterministic under test.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<()> {
    let (timestamp, v1) = parse_signature_header(header)?;

    // The header is attacker-controlled; keep the math total. Only
    // stale deliveries are rejected, matching Stripe's tolerance.
    if timestamp <= 0 {
        return Err(ShopError::InvalidSignature {
            message: "invalid timestamp".to_string(),
        });
    }
    let age = now.saturating_sub(timestamp);
    if age > SIGNATURE_TOLERANCE_SECS {
        return Err(ShopError::InvalidSignature {
            message: format!("timestamp outside tolerance ({}s old)", age),
        });
    }

    let expected = hex::decode(&v1).map_err(|_| ShopError::InvalidSignature {
        message: "v1 signature is not valid hex".to_string(),
    })?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        ShopError::InvalidSignature {
            message: format!("bad signing secret: {}", e),
        }
    })?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    mac.verify_slice(&expected)
        .map_err(|_| ShopError::InvalidSignature {
            message: "digest mismatch".to_string(),
        })
}

/// A verified webhook event, decoded just far enough to dispatch on
#[derive(Deserialize, Debug)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Deserialize, Debug)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Fields we read off a `checkout.session` object
#[derive(Deserialize, Debug)]
pub struct CheckoutSessionObject {
    pub client_reference_id: Option<String>,
    pub payment_status: Option<String>,
    pub customer: Option<String>,
}

/// Fields we read off a `subscription` object
#[derive(Deserialize, Debug)]
pub struct SubscriptionObject {
    pub customer: Option<String>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Deserialize, Debug, Default)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Deserialize, Debug)]
pub struct SubscriptionItem {
    pub price: SubscriptionPrice,
}

#[derive(Deserialize, Debug)]
pub struct SubscriptionPrice {
    pub id: String,
}

impl Event {
    pub fn checkout_session(&self) -> Result<CheckoutSessionObject> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| ShopError::InvalidPayload {
            message: format!("not a checkout session object: {}", e),
        })
    }

    pub fn subscription(&self) -> Result<SubscriptionObject> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| ShopError::InvalidPayload {
            message: format!("not a subscription object: {}", e),
        })
    }
}

impl SubscriptionObject {
    /// Price id of the first subscription item, if any
    pub fn first_price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }
}

/// Verify the signature and decode the payload into an [`Event`]
pub fn construct_event(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<Event> {
    verify_signature(payload, header, secret, now)?;
    serde_json::from_slice(payload).map_err(|e| ShopError::InvalidPayload {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        let digest = hex::encode(mac.finalize().into_bytes());
        format!("t={},v1={}", timestamp, digest)
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = sign(payload, SECRET, now);
        assert!(verify_signature(payload, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = sign(payload, SECRET, now);
        let result = verify_signature(b"{\"type\":\"evil\"}", &header, SECRET, now);
        assert!(matches!(result, Err(ShopError::InvalidSignature { .. })));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = sign(payload, "whsec_other", now);
        let result = verify_signature(payload, &header, SECRET, now);
        assert!(matches!(result, Err(ShopError::InvalidSignature { .. })));
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let payload = br#"{}"#;
        let now = 1_700_000_000;
        // Signed 10 minutes ago, past the 5-minute tolerance
        let header = sign(payload, SECRET, now - 600);
        let result = verify_signature(payload, &header, SECRET, now);
        assert!(matches!(result, Err(ShopError::InvalidSignature { .. })));
    }

    #[test]
    fn test_extreme_timestamp_rejected() {
        // i64::MIN in the header must come back as a signature error,
        // never a panic, regardless of overflow checks
        let result = verify_signature(
            b"{}",
            "t=-9223372036854775808,v1=00",
            SECRET,
            1_700_000_000,
        );
        assert!(matches!(result, Err(ShopError::InvalidSignature { .. })));

        let result = verify_signature(b"{}", "t=9223372036854775807,v1=00", SECRET, 1_700_000_000);
        assert!(matches!(result, Err(ShopError::InvalidSignature { .. })));

        let result = verify_signature(b"{}", "t=0,v1=00", SECRET, 1_700_000_000);
        assert!(matches!(result, Err(ShopError::InvalidSignature { .. })));
    }

    #[test]
    fn test_slightly_future_timestamp_accepted() {
        // Clock skew ahead of us is not staleness
        let payload = br#"{}"#;
        let now = 1_700_000_000;
        let header = sign(payload, SECRET, now + 30);
        assert!(verify_signature(payload, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let result = verify_signature(b"{}", "v1=deadbeef", SECRET, 1_700_000_000);
        assert!(matches!(result, Err(ShopError::InvalidSignature { .. })));

        let result = verify_signature(b"{}", "t=123", SECRET, 1_700_000_000);
        assert!(matches!(result, Err(ShopError::InvalidSignature { .. })));
    }

    #[test]
    fn test_checkout_session_decode() {
        let payload = br#"{
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "object": "checkout.session",
                    "client_reference_id": "ref-123",
                    "payment_status": "paid",
                    "customer": "cus_42"
                }
            }
        }"#;
        let now = 1_700_000_000;
        let header = sign(payload, SECRET, now);

        let event = construct_event(payload, &header, SECRET, now).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");

        let session = event.checkout_session().unwrap();
        assert_eq!(session.client_reference_id.as_deref(), Some("ref-123"));
        assert_eq!(session.payment_status.as_deref(), Some("paid"));
        assert_eq!(session.customer.as_deref(), Some("cus_42"));
    }

    #[test]
    fn test_subscription_decode() {
        let payload = br#"{
            "type": "customer.subscription.updated",
            "data": {
                "object": {
                    "object": "subscription",
                    "customer": "cus_42",
                    "items": {
                        "data": [
                            {"price": {"id": "price_gold456"}}
                        ]
                    }
                }
            }
        }"#;
        let event: Event = serde_json::from_slice(payload).unwrap();
        let sub = event.subscription().unwrap();
        assert_eq!(sub.customer.as_deref(), Some("cus_42"));
        assert_eq!(sub.first_price_id(), Some("price_gold456"));
    }

    #[test]
    fn test_subscription_without_items() {
        let payload = br#"{
            "type": "customer.subscription.deleted",
            "data": {"object": {"customer": "cus_42"}}
        }"#;
        let event: Event = serde_json::from_slice(payload).unwrap();
        let sub = event.subscription().unwrap();
        assert_eq!(sub.first_price_id(), None);
    }
}
