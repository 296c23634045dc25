//! services/api/src/web/progress.rs
//!
//! Course-progress endpoints for the signed-in user.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use course_market_core::domain::UpsertOutcome;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::parse_id;
use crate::web::state::AppState;
use crate::web::views::{CourseDetailsView, LectureProgressView};

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressData {
    pub course_details: CourseDetailsView,
    pub progress: Vec<LectureProgressView>,
    pub completed: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ProgressResponse {
    pub data: ProgressData,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LectureViewResponse {
    pub message: String,
    pub completed: bool,
    /// `viewed/total`, e.g. `2/3`.
    pub progress_count: String,
    /// True when this view created the progress record.
    pub created: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub message: String,
    pub completed: bool,
    pub total_lectures: usize,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub message: String,
    pub completed: bool,
    pub lecture_progress: Vec<LectureProgressView>,
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/v1/progress/{courseId}",
    responses(
        (status = 200, description = "Course details with the caller's progress", body = ProgressResponse),
        (status = 404, description = "Course not found")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn get_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let progress = state.progress.get_progress(auth.id, course_id).await?;

    Ok(Json(ProgressResponse {
        data: ProgressData {
            course_details: CourseDetailsView::from(&progress.course),
            progress: progress
                .progress
                .iter()
                .map(LectureProgressView::from)
                .collect(),
            completed: progress.completed,
        },
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/progress/{courseId}/lecture/{lectureId}/view",
    responses(
        (status = 200, description = "Lecture marked as viewed", body = LectureViewResponse),
        (status = 404, description = "Course or lecture not found")
    ),
    params(
        ("courseId" = String, Path, description = "Course id"),
        ("lectureId" = String, Path, description = "Lecture id")
    )
)]
pub async fn record_lecture_view_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((course_id, lecture_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let lecture_id = parse_id(&lecture_id, "lecture")?;

    let result = state
        .progress
        .record_lecture_view(auth.id, course_id, lecture_id)
        .await?;

    Ok(Json(LectureViewResponse {
        message: "Lecture progress updated successfully.".to_string(),
        completed: result.completed,
        progress_count: format!("{}/{}", result.viewed, result.total),
        created: result.outcome == UpsertOutcome::Created,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/progress/{courseId}/complete",
    responses(
        (status = 200, description = "Course marked as completed", body = CompletionResponse),
        (status = 404, description = "No progress recorded for this course")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn mark_complete_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    set_completion(state, auth, course_id, true).await
}

#[utoipa::path(
    patch,
    path = "/api/v1/progress/{courseId}/incomplete",
    responses(
        (status = 200, description = "Course marked as incomplete", body = CompletionResponse),
        (status = 404, description = "No progress recorded for this course")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn mark_incomplete_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    set_completion(state, auth, course_id, false).await
}

async fn set_completion(
    state: Arc<AppState>,
    auth: AuthUser,
    course_id: String,
    completed: bool,
) -> Result<Json<CompletionResponse>, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let result = state
        .progress
        .set_completion(auth.id, course_id, completed)
        .await?;

    let message = if result.completed {
        "Course marked as completed."
    } else {
        "Course marked as incomplete."
    };
    Ok(Json(CompletionResponse {
        message: message.to_string(),
        completed: result.completed,
        total_lectures: result.total_lectures,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/progress/{courseId}/reset",
    responses(
        (status = 200, description = "Progress cleared", body = ResetResponse),
        (status = 404, description = "No progress recorded for this course")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn reset_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    state.progress.reset_progress(auth.id, course_id).await?;

    Ok(Json(ResetResponse {
        message: "Course progress has been reset.".to_string(),
        completed: false,
        lecture_progress: Vec::new(),
    }))
}
