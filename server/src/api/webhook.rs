//! Payment provider webhook
//!
//! POST /api/payments/webhook — receives provider confirmations (raw body
//! for HMAC signature verification) and feeds the settlement reconciler.
//! The provider always gets a fast, detail-free response; a redelivered
//! confirmation is acknowledged without touching any row.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::AppError;
use crate::orders::settlement::{self, SettlementEvent};
use crate::state::AppState;

/// Replay window for signed events, in seconds
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify the webhook signature header (`t=<unix>,v1=<hex hmac>`).
///
/// The signed payload is `<timestamp>.<body>` keyed with the shared webhook
/// secret. Comparison is constant-time; events outside the replay window are
/// rejected even with a valid signature.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now_secs: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err("Invalid signature header");
    }

    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(signed_payload.as_bytes());

    let sig_bytes = hex::decode(signature).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")?;

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now_secs - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct ProviderEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: SessionObject,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    /// Provider checkout session id, matched against the INIT payment
    id: String,
    /// Paid amount in minor units
    amount_total: i64,
    currency: String,
}

fn ack() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "OK" })))
}

fn reject(status: StatusCode) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "status": "ERROR" })))
}

/// Handle an incoming provider webhook event
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let sig_header = match headers
        .get("payment-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(s) => s,
        None => {
            tracing::warn!("Missing payment-signature header");
            return reject(StatusCode::BAD_REQUEST);
        }
    };

    let now_secs = chrono::Utc::now().timestamp();
    if let Err(e) = verify_webhook_signature(
        &body,
        sig_header,
        &state.config.payment_webhook_secret,
        now_secs,
    ) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return reject(StatusCode::BAD_REQUEST);
    }

    let event: ProviderEvent = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return reject(StatusCode::BAD_REQUEST);
        }
    };

    tracing::info!(event_type = %event.event_type, "Received payment webhook");

    if event.event_type != "checkout.session.completed" {
        tracing::debug!(event_type = %event.event_type, "Unhandled webhook event type");
        return ack();
    }

    let raw_payload: serde_json::Value =
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    let session = event.data.object;

    let settlement = SettlementEvent {
        session_id: session.id,
        amount_minor: session.amount_total,
        currency: session.currency,
        payload: raw_payload,
    };
    let session_id = settlement.session_id.clone();

    match settlement::settle(&state.pool, &state.config.payment_provider, settlement).await {
        Ok(_) => ack(),
        // No INIT payment: either a redelivery (already settled) or an
        // unknown session. Both get acknowledged so the provider stops
        // retrying.
        Err(AppError::PaymentNotFound) => {
            tracing::info!(session_id = %session_id, "No pending payment for session, acknowledging");
            ack()
        }
        Err(AppError::AmountMismatch) => {
            tracing::warn!(session_id = %session_id, "Confirmed amount mismatch, rejecting");
            reject(StatusCode::BAD_REQUEST)
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Settlement failed");
            reject(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn sign(body: &[u8], timestamp: i64, secret: &str) -> String {
        let signed = format!("{timestamp}.{}", std::str::from_utf8(body).unwrap());
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed.as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={sig}")
    }

    #[test]
    fn valid_signature_inside_window_passes() {
        let body = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(body, 1_000_000, SECRET);
        assert!(verify_webhook_signature(body, &header, SECRET, 1_000_100).is_ok());
    }

    #[test]
    fn tampered_body_fails() {
        let body = br#"{"amount_total":10000}"#;
        let header = sign(body, 1_000_000, SECRET);
        let tampered = br#"{"amount_total":99999}"#;
        assert!(verify_webhook_signature(tampered, &header, SECRET, 1_000_000).is_err());
    }

    #[test]
    fn wrong_secret_fails() {
        let body = br#"{}"#;
        let header = sign(body, 1_000_000, "other-secret");
        assert!(verify_webhook_signature(body, &header, SECRET, 1_000_000).is_err());
    }

    #[test]
    fn stale_timestamp_fails_even_with_valid_signature() {
        let body = br#"{}"#;
        let header = sign(body, 1_000_000, SECRET);
        assert!(
            verify_webhook_signature(body, &header, SECRET, 1_000_000 + 301).is_err()
        );
        assert!(
            verify_webhook_signature(body, &header, SECRET, 1_000_000 + 300).is_ok()
        );
    }

    #[test]
    fn malformed_header_fails() {
        let body = br#"{}"#;
        assert!(verify_webhook_signature(body, "garbage", SECRET, 0).is_err());
        assert!(verify_webhook_signature(body, "t=123", SECRET, 0).is_err());
        assert!(verify_webhook_signature(body, "v1=abcd", SECRET, 0).is_err());
    }
}
