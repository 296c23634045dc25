pub mod auth;
pub mod middleware;
pub mod progress;
pub mod purchase;
pub mod rest;
pub mod state;
pub mod views;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ApiError;
pub use middleware::require_auth;
use state::AppState;

/// Prefix every API route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

/// Parses a path id, reporting `Invalid <what> ID` on malformed input.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} ID", what)))
}

/// Builds the API router: public routes, then routes behind `require_auth`.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/user/register", post(auth::register_handler))
        .route("/user/login", post(auth::login_handler))
        .route("/user/logout", post(auth::logout_handler))
        .route("/purchase/webhook", post(purchase::webhook_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/user/profile", get(auth::profile_handler))
        .route("/user/profile/update", put(auth::update_profile_handler))
        .route("/course", post(rest::create_course_handler))
        .route("/course/search", get(rest::search_courses_handler))
        .route("/course/published", get(rest::list_published_courses_handler))
        .route("/course/creator", get(rest::list_creator_courses_handler))
        .route(
            "/course/creator/{courseId}",
            get(rest::get_course_handler)
                .put(rest::edit_course_handler)
                .delete(rest::delete_course_handler),
        )
        .route(
            "/course/creator/{courseId}/publish",
            patch(rest::toggle_publish_handler),
        )
        .route(
            "/course/creator/{courseId}/lecture",
            post(rest::create_lecture_handler).get(rest::list_lectures_handler),
        )
        .route(
            "/course/creator/{courseId}/lecture/{lectureId}",
            put(rest::edit_lecture_handler),
        )
        .route(
            "/course/creator/lecture/{lectureId}",
            get(rest::get_lecture_handler).delete(rest::remove_lecture_handler),
        )
        .route(
            "/purchase/checkout/create-checkout-session",
            post(purchase::create_checkout_session_handler),
        )
        .route(
            "/purchase/course/{courseId}/details-with-status",
            get(purchase::purchase_status_handler),
        )
        .route("/purchase", get(purchase::list_purchased_courses_handler))
        .route("/purchase/", get(purchase::list_purchased_courses_handler))
        .route("/progress/{courseId}", get(progress::get_progress_handler))
        .route(
            "/progress/{courseId}/lecture/{lectureId}/view",
            post(progress::record_lecture_view_handler),
        )
        .route(
            "/progress/{courseId}/complete",
            patch(progress::mark_complete_handler),
        )
        .route(
            "/progress/{courseId}/incomplete",
            patch(progress::mark_incomplete_handler),
        )
        .route(
            "/progress/{courseId}/reset",
            patch(progress::reset_progress_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state);

    Router::new()
        .nest(API_PREFIX, api_router)
        .layer(TraceLayer::new_for_http())
}
