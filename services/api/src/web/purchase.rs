//! services/api/src/web/purchase.rs
//!
//! Checkout, payment webhook and purchase-status endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use bytes::Bytes;
use course_market_core::checkout::ConfirmationOutcome;
use course_market_core::domain::Role;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::parse_id;
use crate::web::state::AppState;
use crate::web::views::{CourseDetailsView, PurchasedCourseView};

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub course_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Serialize, ToSchema)]
pub struct PurchaseStatusResponse {
    pub course: CourseDetailsView,
    pub purchased: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedCoursesResponse {
    pub purchased_courses: Vec<PurchasedCourseView>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Start a hosted checkout for a course.
#[utoipa::path(
    post,
    path = "/api/v1/purchase/checkout/create-checkout-session",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Missing or invalid course id, or already purchased"),
        (status = 404, description = "Course not found"),
        (status = 502, description = "Payment provider failure")
    )
)]
pub async fn create_checkout_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let raw_id = req
        .course_id
        .ok_or_else(|| ApiError::BadRequest("courseId is required".to_string()))?;
    let course_id = parse_id(&raw_id, "course")?;

    let started = state.checkout.initiate_checkout(auth.id, course_id).await?;

    Ok(Json(CheckoutResponse {
        success: true,
        url: started.checkout_url,
    }))
}

/// Payment provider callback. The body is verified exactly as received.
#[utoipa::path(
    post,
    path = "/api/v1/purchase/webhook",
    request_body(content_type = "application/json", description = "Raw provider event."),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Signature verification failed"),
        (status = 404, description = "No purchase for the checkout session")
    ),
    params(
        ("stripe-signature" = String, Header, description = "Provider signature of the raw body.")
    )
)]
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing webhook signature".to_string()))?;

    let outcome = state
        .checkout
        .handle_payment_confirmation(&body, signature)
        .await
        .map_err(|e| {
            warn!("Webhook rejected: {}", e);
            e
        })?;

    match outcome {
        ConfirmationOutcome::Completed { purchase_id } => {
            info!(purchase_id = %purchase_id, "Webhook completed purchase")
        }
        ConfirmationOutcome::Failed { purchase_id } => {
            info!(purchase_id = %purchase_id, "Webhook failed purchase")
        }
        ConfirmationOutcome::Ignored => {}
    }

    Ok((StatusCode::OK, Json(WebhookAck { received: true })))
}

/// Course details with whether the caller has bought it.
#[utoipa::path(
    get,
    path = "/api/v1/purchase/course/{courseId}/details-with-status",
    responses(
        (status = 200, description = "Course with purchase status", body = PurchaseStatusResponse),
        (status = 400, description = "Invalid course id"),
        (status = 404, description = "Course not found")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn purchase_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let status = state
        .checkout
        .get_purchase_status(auth.id, course_id)
        .await?;

    Ok(Json(PurchaseStatusResponse {
        course: CourseDetailsView::from(&status.course),
        purchased: status.purchased,
    }))
}

/// Every completed purchase, with course and buyer. Instructors only.
#[utoipa::path(
    get,
    path = "/api/v1/purchase/",
    responses(
        (status = 200, description = "Completed purchases", body = PurchasedCoursesResponse),
        (status = 403, description = "Caller is not an instructor")
    )
)]
pub async fn list_purchased_courses_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Instructor)?;
    let purchased = state.checkout.list_purchased_courses().await?;

    Ok(Json(PurchasedCoursesResponse {
        purchased_courses: purchased.iter().map(PurchasedCourseView::from).collect(),
    }))
}
