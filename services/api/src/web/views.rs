//! services/api/src/web/views.rs
//!
//! JSON representations of the domain types. Field names follow the browser
//! client's camelCase conventions.

use course_market_core::domain::{
    Course, CourseDetails, Lecture, LectureProgress, Purchase, PurchasedCourse, User,
};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Catalog
//=========================================================================================

#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LectureView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub lecture_title: String,
    pub video_url: Option<String>,
    pub public_id: Option<String>,
    pub is_preview_free: bool,
}

impl From<&Lecture> for LectureView {
    fn from(lecture: &Lecture) -> Self {
        Self {
            id: lecture.id,
            course_id: lecture.course_id,
            lecture_title: lecture.title.clone(),
            video_url: lecture.video_url.clone(),
            public_id: lecture.public_id.clone(),
            is_preview_free: lecture.is_preview_free,
        }
    }
}

/// Course fields shared by the summary and the detailed representation.
#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseFields {
    pub id: Uuid,
    pub creator: Uuid,
    pub course_title: String,
    pub sub_title: Option<String>,
    pub description: Option<String>,
    pub category: String,
    pub course_level: Option<String>,
    pub course_price: Option<Decimal>,
    pub course_thumbnail: Option<String>,
    pub is_published: bool,
    pub enrolled_students: Vec<Uuid>,
}

impl From<&Course> for CourseFields {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id,
            creator: course.creator_id,
            course_title: course.title.clone(),
            sub_title: course.subtitle.clone(),
            description: course.description.clone(),
            category: course.category.clone(),
            course_level: course.level.clone(),
            course_price: course.price,
            course_thumbnail: course.thumbnail_url.clone(),
            is_published: course.is_published,
            enrolled_students: course.enrolled_students.clone(),
        }
    }
}

/// A course with its lectures as ids.
#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    #[serde(flatten)]
    pub fields: CourseFields,
    pub lectures: Vec<Uuid>,
}

impl From<&Course> for CourseView {
    fn from(course: &Course) -> Self {
        Self {
            fields: CourseFields::from(course),
            lectures: course.lectures.clone(),
        }
    }
}

/// A course with its lectures populated.
#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetailsView {
    #[serde(flatten)]
    pub fields: CourseFields,
    pub lectures: Vec<LectureView>,
}

impl From<&CourseDetails> for CourseDetailsView {
    fn from(details: &CourseDetails) -> Self {
        Self {
            fields: CourseFields::from(&details.course),
            lectures: details.lectures.iter().map(LectureView::from).collect(),
        }
    }
}

//=========================================================================================
// Users
//=========================================================================================

#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub photo_url: Option<String>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.to_string(),
            photo_url: user.photo_url.clone(),
        }
    }
}

//=========================================================================================
// Purchases and Progress
//=========================================================================================

#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BuyerView {
    pub name: String,
    pub email: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub status: String,
    pub payment_id: Option<String>,
}

impl From<&Purchase> for PurchaseView {
    fn from(purchase: &Purchase) -> Self {
        Self {
            id: purchase.id,
            course_id: purchase.course_id,
            user_id: purchase.user_id,
            amount: purchase.amount,
            status: purchase.status.to_string(),
            payment_id: purchase.payment_session_id.clone(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedCourseView {
    #[serde(flatten)]
    pub purchase: PurchaseView,
    pub course: CourseView,
    pub user: BuyerView,
}

impl From<&PurchasedCourse> for PurchasedCourseView {
    fn from(purchased: &PurchasedCourse) -> Self {
        Self {
            purchase: PurchaseView::from(&purchased.purchase),
            course: CourseView::from(&purchased.course),
            user: BuyerView {
                name: purchased.buyer_name.clone(),
                email: purchased.buyer_email.clone(),
            },
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LectureProgressView {
    pub lecture_id: Uuid,
    pub viewed: bool,
}

impl From<&LectureProgress> for LectureProgressView {
    fn from(entry: &LectureProgress) -> Self {
        Self {
            lecture_id: entry.lecture_id,
            viewed: entry.viewed,
        }
    }
}

/// Generic acknowledgement body.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}
