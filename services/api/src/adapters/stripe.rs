//! services/api/src/adapters/stripe.rs
//!
//! This module contains the adapter for Stripe Checkout. It implements the
//! `PaymentService` port from the `core` crate: hosted checkout sessions are
//! created over the REST API and webhook events are authenticated with the
//! endpoint's signing secret.

use async_trait::async_trait;
use course_market_core::ports::{
    CheckoutRequest, CheckoutSession, PaymentEvent, PaymentService, PortError, PortResult,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_API_BASE: &str = "https://api.stripe.com";
/// Maximum accepted age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `PaymentService` port using Stripe Checkout.
#[derive(Clone)]
pub struct StripeAdapter {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
}

impl StripeAdapter {
    /// Creates a new `StripeAdapter` talking to the public Stripe API.
    pub fn new(secret_key: String, webhook_secret: String) -> PortResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            secret_key,
            webhook_secret,
        })
    }

    /// Points the adapter at a different API host (e.g. a local mock).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Deserialize)]
struct WebhookData {
    object: SessionObject,
}

#[derive(Deserialize)]
struct SessionObject {
    id: Option<String>,
    amount_total: Option<i64>,
    /// `paid`, `unpaid` or `no_payment_required`.
    payment_status: Option<String>,
}

/// Builds the form body for `POST /v1/checkout/sessions`.
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            request.currency.clone(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            request.product_name.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            request.unit_amount.to_string(),
        ),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];
    if let Some(image) = &request.product_image {
        form.push((
            "line_items[0][price_data][product_data][images][0]".to_string(),
            image.clone(),
        ));
    }
    for (key, value) in &request.metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }
    form
}

//=========================================================================================
// Webhook Signatures
//=========================================================================================

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> PortResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PortError::Unexpected(format!("invalid webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Produces a `Stripe-Signature` header value for `payload`.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> PortResult<String> {
    let signature = compute_signature(secret, timestamp, payload)?;
    Ok(format!("t={},v1={}", timestamp, hex::encode(signature)))
}

/// Checks a `Stripe-Signature` header against the raw payload.
///
/// Any `v1` entry may match; the timestamp must be within the tolerance of `now`.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
) -> PortResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PortError::Validation("Webhook signature has no timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(PortError::Validation(
            "Webhook signature has no v1 entry".to_string(),
        ));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PortError::Validation(
            "Webhook timestamp is outside the tolerance zone".to_string(),
        ));
    }

    let expected = compute_signature(secret, timestamp, payload)?;
    let matched = candidates.iter().any(|candidate| match hex::decode(candidate) {
        Ok(actual) => actual.len() == expected.len()
            && bool::from(actual.as_slice().ct_eq(expected.as_slice())),
        Err(_) => false,
    });
    if !matched {
        return Err(PortError::Validation(
            "Webhook signature does not match the payload".to_string(),
        ));
    }
    Ok(())
}

/// Reduces a verified Stripe event to the variants the core acts on.
pub fn parse_event(payload: &[u8]) -> PortResult<PaymentEvent> {
    let envelope: WebhookEnvelope = serde_json::from_slice(payload)
        .map_err(|e| PortError::Validation(format!("Malformed webhook payload: {e}")))?;

    let session_id = || {
        envelope
            .data
            .object
            .id
            .clone()
            .ok_or_else(|| PortError::Validation("Webhook event has no session id".to_string()))
    };

    match envelope.event_type.as_str() {
        // Delayed payment methods finish the session before the money arrives.
        "checkout.session.completed"
            if envelope.data.object.payment_status.as_deref() == Some("unpaid") =>
        {
            Ok(PaymentEvent::PaymentPending {
                session_id: session_id()?,
            })
        }
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            Ok(PaymentEvent::CheckoutCompleted {
                session_id: session_id()?,
                amount_total: envelope.data.object.amount_total,
            })
        }
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            Ok(PaymentEvent::CheckoutFailed {
                session_id: session_id()?,
            })
        }
        other => Ok(PaymentEvent::Other {
            event_type: other.to_string(),
        }),
    }
}

//=========================================================================================
// `PaymentService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PaymentService for StripeAdapter {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> PortResult<CheckoutSession> {
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&checkout_form(&request))
            .send()
            .await
            .map_err(|e| PortError::ExternalService(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| PortError::ExternalService(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| format!("Stripe responded with {}", status));
            warn!(status = %status, "Stripe rejected checkout session: {}", message);
            return Err(PortError::ExternalService(message));
        }

        let session: SessionResponse = serde_json::from_slice(&body)
            .map_err(|e| PortError::ExternalService(format!("Malformed Stripe response: {e}")))?;
        let url = session.url.ok_or_else(|| {
            PortError::ExternalService("Stripe session has no checkout URL".to_string())
        })?;
        debug!(session_id = %session.id, "Stripe checkout session opened");

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PortResult<PaymentEvent> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature,
            chrono::Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }
}
