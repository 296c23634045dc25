//! crates/course_market_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the marketplace's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store and payment provider.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Course, CourseDetails, CourseSearch, Lecture, NewCourse, NewLecture, NewUser, ProgressRecord,
    Purchase, PurchasedCourse, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and orchestrator operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("External service failure: {0}")]
    ExternalService(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistence Port
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    /// Fails with `Validation` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_credentials(&self, email: &str) -> PortResult<UserCredentials>;

    /// Adds `course_id` to the user's enrolled set. Adding twice is a no-op.
    async fn add_enrolled_course(&self, user_id: Uuid, course_id: Uuid) -> PortResult<()>;

    async fn update_user_name(&self, user_id: Uuid, name: &str) -> PortResult<User>;

    // --- Courses and Lectures ---
    async fn create_course(&self, course: NewCourse) -> PortResult<Course>;

    async fn get_course(&self, course_id: Uuid) -> PortResult<Course>;

    async fn get_course_details(&self, course_id: Uuid) -> PortResult<CourseDetails>;

    /// Persists the editable fields of an existing course.
    async fn update_course(&self, course: &Course) -> PortResult<Course>;

    async fn list_courses_by_creator(&self, creator_id: Uuid) -> PortResult<Vec<Course>>;

    async fn list_published_courses(&self) -> PortResult<Vec<Course>>;

    /// Published courses matching `search`. Fails with `Validation` when the
    /// query is not a valid pattern.
    async fn search_courses(&self, search: &CourseSearch) -> PortResult<Vec<Course>>;

    /// Removes a course with its lectures, progress records and unfinished
    /// purchases. Fails with `Validation` once the course has been sold.
    async fn delete_course(&self, course_id: Uuid) -> PortResult<()>;

    async fn list_courses_by_ids(&self, course_ids: &[Uuid]) -> PortResult<Vec<Course>>;

    /// Adds `user_id` to the course's enrolled set. Adding twice is a no-op.
    async fn add_enrolled_student(&self, course_id: Uuid, user_id: Uuid) -> PortResult<()>;

    /// Creates a lecture and appends it to its course's lecture list.
    async fn create_lecture(&self, lecture: NewLecture) -> PortResult<Lecture>;

    async fn get_lecture(&self, lecture_id: Uuid) -> PortResult<Lecture>;

    /// Persists title, video and preview flag of an existing lecture.
    async fn update_lecture(&self, lecture: &Lecture) -> PortResult<Lecture>;

    /// Deletes a lecture and drops it from its course's lecture list.
    async fn delete_lecture(&self, lecture_id: Uuid) -> PortResult<()>;

    async fn set_lectures_preview_free(&self, lecture_ids: &[Uuid]) -> PortResult<()>;

    // --- Purchases ---
    async fn insert_purchase(&self, purchase: &Purchase) -> PortResult<()>;

    async fn attach_payment_session(&self, purchase_id: Uuid, session_id: &str) -> PortResult<()>;

    async fn find_purchase_by_session(&self, session_id: &str) -> PortResult<Option<Purchase>>;

    /// Writes back the status and amount of an existing purchase.
    ///
    /// The write only lands while the stored status is still `pending` or
    /// already equals `purchase.status`; returns `false` when another writer
    /// settled the purchase first.
    async fn update_purchase(&self, purchase: &Purchase) -> PortResult<bool>;

    async fn find_purchases(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Vec<Purchase>>;

    async fn list_completed_purchases(&self) -> PortResult<Vec<PurchasedCourse>>;

    // --- Progress ---
    async fn get_progress(&self, user_id: Uuid, course_id: Uuid)
        -> PortResult<Option<ProgressRecord>>;

    /// Inserts or replaces the record keyed by `(user_id, course_id)`.
    async fn save_progress(&self, record: &ProgressRecord) -> PortResult<()>;
}

//=========================================================================================
// Payment Provider Port
//=========================================================================================

/// Everything the provider needs to open a hosted checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub product_name: String,
    pub product_image: Option<String>,
    /// Price in minor currency units.
    pub unit_amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// A verified provider event, reduced to what the core acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutCompleted {
        session_id: String,
        /// Authoritative total in minor currency units, when the provider reports one.
        amount_total: Option<i64>,
    },
    CheckoutFailed {
        session_id: String,
    },
    /// The session finished but the payment has not cleared yet.
    PaymentPending {
        session_id: String,
    },
    Other {
        event_type: String,
    },
}

#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutRequest)
        -> PortResult<CheckoutSession>;

    /// Verifies `payload` against the provider signature and parses the event.
    ///
    /// `payload` must be the request body exactly as received.
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> PortResult<PaymentEvent>;
}
