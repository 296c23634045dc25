//! Shared fixtures for the integration tests: an in-memory store, a scripted
//! payment provider that verifies real webhook signatures, and catalog seeding.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use api_lib::adapters::stripe::{parse_event, signature_header, verify_signature};
use api_lib::adapters::MemoryDb;
use api_lib::config::Config;
use async_trait::async_trait;
use chrono::Utc;
use course_market_core::checkout::{CheckoutOrchestrator, CheckoutSettings};
use course_market_core::domain::{Course, NewCourse, NewLecture, NewUser, Role, User};
use course_market_core::ports::{
    CheckoutRequest, CheckoutSession, DatabaseService, PaymentEvent, PaymentService, PortError,
    PortResult,
};
use course_market_core::progress::ProgressOrchestrator;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const JWT_SECRET: &str = "jwt-test-secret";
pub const FRONTEND_URL: &str = "http://localhost:5173";

/// Payment provider double. Sessions are numbered; signatures are checked
/// with the same code the Stripe adapter uses.
#[derive(Default)]
pub struct FakePayments {
    counter: AtomicUsize,
    unavailable: AtomicBool,
    pub requests: Mutex<Vec<CheckoutRequest>>,
}

impl FakePayments {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn last_request(&self) -> Option<CheckoutRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentService for FakePayments {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> PortResult<CheckoutSession> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::ExternalService(
                "provider is down".to_string(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request);
        let id = format!("cs_test_{}", n);
        Ok(CheckoutSession {
            url: format!("https://checkout.example.com/pay/{}", id),
            id,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PortResult<PaymentEvent> {
        verify_signature(WEBHOOK_SECRET, payload, signature, Utc::now().timestamp())?;
        parse_event(payload)
    }
}

pub fn settings() -> CheckoutSettings {
    CheckoutSettings {
        currency: "inr".to_string(),
        frontend_url: FRONTEND_URL.to_string(),
    }
}

pub fn config() -> Config {
    Config::from_lookup(|key| match key {
        "SECRET_KEY" => Some(JWT_SECRET.to_string()),
        "STRIPE_SECRET_KEY" => Some("sk_test_unused".to_string()),
        "WEBHOOK_ENDPOINT_SECRET" => Some(WEBHOOK_SECRET.to_string()),
        _ => None,
    })
    .unwrap()
}

pub struct Fixture {
    pub db: Arc<MemoryDb>,
    pub payments: Arc<FakePayments>,
    pub checkout: CheckoutOrchestrator,
    pub progress: ProgressOrchestrator,
}

impl Fixture {
    pub fn new() -> Self {
        let db = Arc::new(MemoryDb::new());
        let payments = Arc::new(FakePayments::default());
        Self {
            checkout: CheckoutOrchestrator::new(db.clone(), payments.clone(), settings()),
            progress: ProgressOrchestrator::new(db.clone()),
            db,
            payments,
        }
    }
}

pub async fn seed_user(db: &dyn DatabaseService, name: &str, role: Role) -> User {
    db.create_user(NewUser {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        hashed_password: "not-a-real-hash".to_string(),
        role,
    })
    .await
    .unwrap()
}

/// Creates a published course with `lectures` lectures and an optional price.
pub async fn seed_course(
    db: &dyn DatabaseService,
    creator: Uuid,
    price: Option<Decimal>,
    lectures: usize,
) -> Course {
    let course = db
        .create_course(NewCourse {
            creator_id: creator,
            title: "Rust for Backend Developers".to_string(),
            category: "Programming".to_string(),
        })
        .await
        .unwrap();
    for i in 0..lectures {
        db.create_lecture(NewLecture {
            course_id: course.id,
            title: format!("Lecture {}", i + 1),
            video_url: Some(format!("https://videos.example.com/{}.mp4", i + 1)),
            public_id: None,
            is_preview_free: false,
        })
        .await
        .unwrap();
    }
    let mut course = db.get_course(course.id).await.unwrap();
    course.price = price;
    course.is_published = true;
    db.update_course(&course).await.unwrap()
}

pub fn completed_event(session_id: &str, amount_total: Option<i64>) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_test_completed",
        "object": "event",
        "type": "checkout.session.completed",
        "data": { "object": { "id": session_id, "object": "checkout.session", "amount_total": amount_total } }
    }))
    .unwrap()
}

pub fn expired_event(session_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_test_expired",
        "object": "event",
        "type": "checkout.session.expired",
        "data": { "object": { "id": session_id, "object": "checkout.session" } }
    }))
    .unwrap()
}

pub fn sign(payload: &[u8]) -> String {
    signature_header(WEBHOOK_SECRET, Utc::now().timestamp(), payload).unwrap()
}

/// A signed-payload body for any checkout-session event type.
pub fn session_event(event_type: &str, session: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_test_session",
        "object": "event",
        "type": event_type,
        "data": { "object": session }
    }))
    .unwrap()
}
