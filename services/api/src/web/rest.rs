//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the course catalog endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::parse_id;
use crate::web::state::AppState;
use crate::web::{auth, progress, purchase, views};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use course_market_core::domain::{
    Course, CourseSearch, CourseUpdate, Lecture, LectureUpdate, NewCourse, NewLecture, PriceSort,
    Role,
};
use course_market_core::ports::PortError;
use regex::RegexBuilder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::profile_handler,
        auth::update_profile_handler,
        create_course_handler,
        list_published_courses_handler,
        search_courses_handler,
        list_creator_courses_handler,
        get_course_handler,
        edit_course_handler,
        toggle_publish_handler,
        delete_course_handler,
        create_lecture_handler,
        list_lectures_handler,
        get_lecture_handler,
        edit_lecture_handler,
        remove_lecture_handler,
        purchase::create_checkout_session_handler,
        purchase::webhook_handler,
        purchase::purchase_status_handler,
        purchase::list_purchased_courses_handler,
        progress::get_progress_handler,
        progress::record_lecture_view_handler,
        progress::mark_complete_handler,
        progress::mark_incomplete_handler,
        progress::reset_progress_handler,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::ProfileView,
            auth::ProfileResponse,
            auth::UpdateProfileRequest,
            auth::UpdateProfileResponse,
            CreateCourseRequest,
            EditCourseRequest,
            CreateLectureRequest,
            EditLectureRequest,
            CourseResponse,
            CourseDetailsResponse,
            CourseListResponse,
            LectureResponse,
            LectureListResponse,
            purchase::CreateCheckoutRequest,
            purchase::CheckoutResponse,
            purchase::WebhookAck,
            purchase::PurchaseStatusResponse,
            purchase::PurchasedCoursesResponse,
            progress::ProgressData,
            progress::ProgressResponse,
            progress::LectureViewResponse,
            progress::CompletionResponse,
            progress::ResetResponse,
            views::LectureView,
            views::CourseFields,
            views::CourseView,
            views::CourseDetailsView,
            views::UserView,
            views::BuyerView,
            views::PurchaseView,
            views::PurchasedCourseView,
            views::LectureProgressView,
            views::MessageResponse,
        )
    ),
    tags(
        (name = "Course Market API", description = "Course catalog, checkout and learning progress.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    pub course_title: Option<String>,
    pub category: Option<String>,
}

/// Partial course edit. Absent fields are left unchanged.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditCourseRequest {
    pub course_title: Option<String>,
    pub sub_title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub course_level: Option<String>,
    pub course_price: Option<Decimal>,
    pub is_published: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLectureRequest {
    pub lecture_title: Option<String>,
    pub video_url: Option<String>,
    pub public_id: Option<String>,
    #[serde(default)]
    pub is_preview_free: bool,
}

/// Partial lecture edit. The video changes only when both `videoUrl` and
/// `publicId` are sent.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditLectureRequest {
    pub lecture_title: Option<String>,
    pub video_url: Option<String>,
    pub public_id: Option<String>,
    pub is_preview_free: Option<bool>,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Case-insensitive pattern matched against title, subtitle and category.
    pub query: Option<String>,
    /// Comma-separated list of categories to keep.
    pub categories: Option<String>,
    /// `low` or `high`.
    pub sort_by_price: Option<String>,
}

impl SearchQuery {
    fn into_search(self) -> Result<CourseSearch, ApiError> {
        let query = self.query.unwrap_or_default();
        RegexBuilder::new(&query)
            .case_insensitive(true)
            .build()
            .map_err(|_| ApiError::BadRequest("Invalid search query".to_string()))?;
        let categories = self
            .categories
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        Ok(CourseSearch {
            query,
            categories,
            sort: self.sort_by_price.as_deref().and_then(PriceSort::from_query),
        })
    }
}

#[derive(Deserialize, IntoParams)]
pub struct PublishQuery {
    /// `true` to publish, `false` to unpublish. Toggles when absent.
    pub publish: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct CourseResponse {
    pub success: bool,
    pub message: String,
    pub course: views::CourseView,
}

#[derive(Serialize, ToSchema)]
pub struct CourseDetailsResponse {
    pub success: bool,
    pub course: views::CourseDetailsView,
}

#[derive(Serialize, ToSchema)]
pub struct CourseListResponse {
    pub success: bool,
    pub courses: Vec<views::CourseView>,
}

#[derive(Serialize, ToSchema)]
pub struct LectureResponse {
    pub success: bool,
    pub message: String,
    pub lecture: views::LectureView,
}

#[derive(Serialize, ToSchema)]
pub struct LectureListResponse {
    pub success: bool,
    pub lectures: Vec<views::LectureView>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Loads a course and checks that `auth` created it.
async fn owned_course(
    state: &AppState,
    auth: &AuthUser,
    course_id: Uuid,
) -> Result<Course, ApiError> {
    let course = state.db.get_course(course_id).await?;
    if course.creator_id != auth.id {
        return Err(PortError::Unauthorized(
            "You are not the creator of this course".to_string(),
        )
        .into());
    }
    Ok(course)
}

/// Loads a lecture together with its course, checking that `auth` created the course.
async fn owned_lecture(
    state: &AppState,
    auth: &AuthUser,
    lecture_id: Uuid,
) -> Result<(Course, Lecture), ApiError> {
    let lecture = state.db.get_lecture(lecture_id).await?;
    let course = owned_course(state, auth, lecture.course_id).await?;
    Ok((course, lecture))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a draft course. Instructors only.
#[utoipa::path(
    post,
    path = "/api/v1/course",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 400, description = "Title or category missing"),
        (status = 403, description = "Caller is not an instructor")
    )
)]
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<CreateCourseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(Role::Instructor)?;
    let Json(req) = payload?;
    let (Some(title), Some(category)) = (non_blank(req.course_title), non_blank(req.category))
    else {
        return Err(ApiError::BadRequest(
            "Course title and category are required".to_string(),
        ));
    };

    let course = state
        .db
        .create_course(NewCourse {
            creator_id: auth.id,
            title,
            category,
        })
        .await?;
    info!(course_id = %course.id, creator_id = %auth.id, "Course created");

    Ok((
        StatusCode::CREATED,
        Json(CourseResponse {
            success: true,
            message: "Course created".to_string(),
            course: views::CourseView::from(&course),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/course/published",
    responses(
        (status = 200, description = "All published courses", body = CourseListResponse)
    )
)]
pub async fn list_published_courses_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let courses = state.db.list_published_courses().await?;
    Ok(Json(CourseListResponse {
        success: true,
        courses: courses.iter().map(views::CourseView::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/course/creator",
    responses(
        (status = 200, description = "Courses created by the caller", body = CourseListResponse)
    )
)]
pub async fn list_creator_courses_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let courses = state.db.list_courses_by_creator(auth.id).await?;
    Ok(Json(CourseListResponse {
        success: true,
        courses: courses.iter().map(views::CourseView::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/course/creator/{courseId}",
    responses(
        (status = 200, description = "Course with lectures", body = CourseDetailsResponse),
        (status = 404, description = "Course not found")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn get_course_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let details = state.db.get_course_details(course_id).await?;
    Ok(Json(CourseDetailsResponse {
        success: true,
        course: views::CourseDetailsView::from(&details),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/course/creator/{courseId}",
    request_body = EditCourseRequest,
    responses(
        (status = 200, description = "Course updated", body = CourseResponse),
        (status = 400, description = "Invalid field value"),
        (status = 403, description = "Caller did not create this course"),
        (status = 404, description = "Course not found")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn edit_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(course_id): Path<String>,
    payload: Result<Json<EditCourseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let Json(req) = payload?;
    if req.course_price.is_some_and(|p| p.is_sign_negative()) {
        return Err(ApiError::BadRequest(
            "Course price cannot be negative".to_string(),
        ));
    }

    let mut course = owned_course(&state, &auth, course_id).await?;
    CourseUpdate {
        title: non_blank(req.course_title),
        subtitle: req.sub_title,
        description: req.description,
        category: non_blank(req.category),
        level: req.course_level,
        price: req.course_price,
        is_published: req.is_published,
    }
    .apply(&mut course);
    let course = state.db.update_course(&course).await?;

    Ok(Json(CourseResponse {
        success: true,
        message: "Course updated".to_string(),
        course: views::CourseView::from(&course),
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/course/creator/{courseId}/publish",
    responses(
        (status = 200, description = "Publish flag changed", body = CourseResponse),
        (status = 400, description = "A course needs lectures before it can be published"),
        (status = 403, description = "Caller did not create this course"),
        (status = 404, description = "Course not found")
    ),
    params(("courseId" = String, Path, description = "Course id"), PublishQuery)
)]
pub async fn toggle_publish_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(course_id): Path<String>,
    Query(query): Query<PublishQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let mut course = owned_course(&state, &auth, course_id).await?;

    let publish = query.publish.unwrap_or(!course.is_published);
    if publish && course.lectures.is_empty() {
        return Err(ApiError::BadRequest(
            "Add at least one lecture before publishing".to_string(),
        ));
    }
    CourseUpdate {
        is_published: Some(publish),
        ..Default::default()
    }
    .apply(&mut course);
    let course = state.db.update_course(&course).await?;
    info!(course_id = %course.id, published = publish, "Course publish flag changed");

    let message = if publish {
        "Course is published"
    } else {
        "Course is unpublished"
    };
    Ok(Json(CourseResponse {
        success: true,
        message: message.to_string(),
        course: views::CourseView::from(&course),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/course/creator/{courseId}/lecture",
    request_body = CreateLectureRequest,
    responses(
        (status = 201, description = "Lecture created", body = LectureResponse),
        (status = 400, description = "Lecture title missing"),
        (status = 403, description = "Caller did not create this course"),
        (status = 404, description = "Course not found")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn create_lecture_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(course_id): Path<String>,
    payload: Result<Json<CreateLectureRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let Json(req) = payload?;
    let Some(title) = non_blank(req.lecture_title) else {
        return Err(ApiError::BadRequest("Lecture title is required".to_string()));
    };
    owned_course(&state, &auth, course_id).await?;

    let lecture = state
        .db
        .create_lecture(NewLecture {
            course_id,
            title,
            video_url: req.video_url,
            public_id: req.public_id,
            is_preview_free: req.is_preview_free,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LectureResponse {
            success: true,
            message: "Lecture created".to_string(),
            lecture: views::LectureView::from(&lecture),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/course/search",
    responses(
        (status = 200, description = "Published courses matching the query", body = CourseListResponse),
        (status = 400, description = "Query is not a valid pattern")
    ),
    params(SearchQuery)
)]
pub async fn search_courses_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let search = query.into_search()?;
    let courses = state.db.search_courses(&search).await?;
    Ok(Json(CourseListResponse {
        success: true,
        courses: courses.iter().map(views::CourseView::from).collect(),
    }))
}

/// Delete a course with its lectures. Refused once the course has buyers.
#[utoipa::path(
    delete,
    path = "/api/v1/course/creator/{courseId}",
    responses(
        (status = 200, description = "Course deleted", body = views::MessageResponse),
        (status = 400, description = "Course has been purchased"),
        (status = 403, description = "Caller did not create this course"),
        (status = 404, description = "Course not found")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn delete_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    owned_course(&state, &auth, course_id).await?;

    state.db.delete_course(course_id).await?;
    info!(course_id = %course_id, "Course deleted");

    Ok(Json(views::MessageResponse {
        success: true,
        message: "Course deleted".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/course/creator/{courseId}/lecture",
    responses(
        (status = 200, description = "Lectures in course order", body = LectureListResponse),
        (status = 404, description = "Course not found")
    ),
    params(("courseId" = String, Path, description = "Course id"))
)]
pub async fn list_lectures_handler(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let details = state.db.get_course_details(course_id).await?;
    Ok(Json(LectureListResponse {
        success: true,
        lectures: details.lectures.iter().map(views::LectureView::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/course/creator/lecture/{lectureId}",
    responses(
        (status = 200, description = "A single lecture", body = LectureResponse),
        (status = 404, description = "Lecture not found")
    ),
    params(("lectureId" = String, Path, description = "Lecture id"))
)]
pub async fn get_lecture_handler(
    State(state): State<Arc<AppState>>,
    Path(lecture_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lecture_id = parse_id(&lecture_id, "lecture")?;
    let lecture = state.db.get_lecture(lecture_id).await?;
    Ok(Json(LectureResponse {
        success: true,
        message: "Lecture found".to_string(),
        lecture: views::LectureView::from(&lecture),
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/course/creator/{courseId}/lecture/{lectureId}",
    request_body = EditLectureRequest,
    responses(
        (status = 200, description = "Lecture updated", body = LectureResponse),
        (status = 403, description = "Caller did not create this course"),
        (status = 404, description = "Course or lecture not found")
    ),
    params(
        ("courseId" = String, Path, description = "Course id"),
        ("lectureId" = String, Path, description = "Lecture id")
    )
)]
pub async fn edit_lecture_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((course_id, lecture_id)): Path<(String, String)>,
    payload: Result<Json<EditLectureRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = parse_id(&course_id, "course")?;
    let lecture_id = parse_id(&lecture_id, "lecture")?;
    let Json(req) = payload?;

    let (course, mut lecture) = owned_lecture(&state, &auth, lecture_id).await?;
    if course.id != course_id {
        return Err(PortError::NotFound("Lecture not found in this course".to_string()).into());
    }
    LectureUpdate {
        title: non_blank(req.lecture_title),
        video_url: non_blank(req.video_url),
        public_id: non_blank(req.public_id),
        is_preview_free: req.is_preview_free,
    }
    .apply(&mut lecture);
    let lecture = state.db.update_lecture(&lecture).await?;

    Ok(Json(LectureResponse {
        success: true,
        message: "Lecture updated".to_string(),
        lecture: views::LectureView::from(&lecture),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/course/creator/lecture/{lectureId}",
    responses(
        (status = 200, description = "Lecture removed", body = views::MessageResponse),
        (status = 403, description = "Caller did not create this course"),
        (status = 404, description = "Lecture not found")
    ),
    params(("lectureId" = String, Path, description = "Lecture id"))
)]
pub async fn remove_lecture_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(lecture_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lecture_id = parse_id(&lecture_id, "lecture")?;
    let (course, _) = owned_lecture(&state, &auth, lecture_id).await?;

    state.db.delete_lecture(lecture_id).await?;
    info!(lecture_id = %lecture_id, course_id = %course.id, "Lecture removed");

    Ok(Json(views::MessageResponse {
        success: true,
        message: "Lecture removed".to_string(),
    }))
}
