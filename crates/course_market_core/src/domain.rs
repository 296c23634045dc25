//! crates/course_market_core/src/domain.rs
//!
//! Defines the pure, core data structures for the marketplace.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::PortError;

//=========================================================================================
// Users
//=========================================================================================

/// The role a user account was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Instructor,
    #[default]
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }
}

impl FromStr for Role {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            other => Err(PortError::Validation(format!("Unknown role '{}'", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub photo_url: Option<String>,
    /// One side of the entitlement relation; mirrored by `Course::enrolled_students`.
    pub enrolled_courses: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub hashed_password: String,
}

/// Input for registering a new account. The email is expected to be normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
}

//=========================================================================================
// Catalog
//=========================================================================================

#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub category: String,
    pub level: Option<String>,
    /// `None` until the instructor sets a price; such a course cannot be bought.
    pub price: Option<Decimal>,
    pub thumbnail_url: Option<String>,
    pub is_published: bool,
    pub lectures: Vec<Uuid>,
    pub enrolled_students: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A course with its lectures resolved, in course order.
#[derive(Debug, Clone)]
pub struct CourseDetails {
    pub course: Course,
    pub lectures: Vec<Lecture>,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub creator_id: Uuid,
    pub title: String,
    pub category: String,
}

/// A partial edit of a course. Unset fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub price: Option<Decimal>,
    pub is_published: Option<bool>,
}

impl CourseUpdate {
    pub fn apply(self, course: &mut Course) {
        if let Some(title) = self.title {
            course.title = title;
        }
        if let Some(subtitle) = self.subtitle {
            course.subtitle = Some(subtitle);
        }
        if let Some(description) = self.description {
            course.description = Some(description);
        }
        if let Some(category) = self.category {
            course.category = category;
        }
        if let Some(level) = self.level {
            course.level = Some(level);
        }
        if let Some(price) = self.price {
            course.price = Some(price);
        }
        if let Some(is_published) = self.is_published {
            course.is_published = is_published;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lecture {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub video_url: Option<String>,
    pub public_id: Option<String>,
    pub is_preview_free: bool,
}

#[derive(Debug, Clone)]
pub struct NewLecture {
    pub course_id: Uuid,
    pub title: String,
    pub video_url: Option<String>,
    pub public_id: Option<String>,
    pub is_preview_free: bool,
}

/// A partial edit of a lecture. The video is replaced only when both the
/// URL and its media id are given.
#[derive(Debug, Clone, Default)]
pub struct LectureUpdate {
    pub title: Option<String>,
    pub video_url: Option<String>,
    pub public_id: Option<String>,
    pub is_preview_free: Option<bool>,
}

impl LectureUpdate {
    pub fn apply(self, lecture: &mut Lecture) {
        if let Some(title) = self.title {
            lecture.title = title;
        }
        if let (Some(video_url), Some(public_id)) = (self.video_url, self.public_id) {
            lecture.video_url = Some(video_url);
            lecture.public_id = Some(public_id);
        }
        if let Some(is_preview_free) = self.is_preview_free {
            lecture.is_preview_free = is_preview_free;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSort {
    LowToHigh,
    HighToLow,
}

impl PriceSort {
    /// Parses the `low` / `high` query values; anything else means unsorted.
    pub fn from_query(value: &str) -> Option<Self> {
        match value {
            "low" => Some(PriceSort::LowToHigh),
            "high" => Some(PriceSort::HighToLow),
            _ => None,
        }
    }
}

/// Catalog search over published courses.
///
/// `query` is a case-insensitive pattern matched against title, subtitle and
/// category. A non-empty `categories` list restricts results to those
/// categories exactly.
#[derive(Debug, Clone, Default)]
pub struct CourseSearch {
    pub query: String,
    pub categories: Vec<String>,
    pub sort: Option<PriceSort>,
}

/// Orders courses by price; unpriced courses go last either way.
pub fn sort_by_price(courses: &mut [Course], sort: PriceSort) {
    courses.sort_by(|a, b| match (a.price, b.price) {
        (Some(x), Some(y)) => match sort {
            PriceSort::LowToHigh => x.cmp(&y),
            PriceSort::HighToLow => y.cmp(&x),
        },
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

//=========================================================================================
// Purchases
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
        }
    }
}

impl FromStr for PurchaseStatus {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PurchaseStatus::Pending),
            "completed" => Ok(PurchaseStatus::Completed),
            "failed" => Ok(PurchaseStatus::Failed),
            other => Err(PortError::Unexpected(format!(
                "Unknown purchase status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record of one checkout attempt and its outcome. Purchases are never deleted.
#[derive(Debug, Clone)]
pub struct Purchase {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub status: PurchaseStatus,
    /// Assigned once the payment provider has opened a checkout session.
    pub payment_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    pub fn new_pending(user_id: Uuid, course_id: Uuid, amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            course_id,
            user_id,
            amount,
            status: PurchaseStatus::Pending,
            payment_session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the purchase to `next`.
    ///
    /// Only `pending -> completed` and `pending -> failed` are real transitions.
    /// Re-applying the current status is accepted and reports `false`.
    pub fn transition_to(&mut self, next: PurchaseStatus) -> Result<bool, PortError> {
        if self.status == next {
            return Ok(false);
        }
        match (self.status, next) {
            (PurchaseStatus::Pending, PurchaseStatus::Completed)
            | (PurchaseStatus::Pending, PurchaseStatus::Failed) => {
                self.status = next;
                self.updated_at = Utc::now();
                Ok(true)
            }
            (from, to) => Err(PortError::Validation(format!(
                "Purchase {} cannot move from {} to {}",
                self.id, from, to
            ))),
        }
    }
}

/// Converts an amount in minor currency units (paise, cents) to the major unit.
pub fn amount_from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Converts a major-unit amount to minor units, rounding to the nearest unit.
pub fn amount_to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED).round().to_i64()
}

/// A completed purchase joined with the course and a summary of the buyer.
#[derive(Debug, Clone)]
pub struct PurchasedCourse {
    pub purchase: Purchase,
    pub course: Course,
    pub buyer_name: String,
    pub buyer_email: String,
}

//=========================================================================================
// Progress
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LectureProgress {
    pub lecture_id: Uuid,
    pub viewed: bool,
}

/// Per-user, per-course record of viewed lectures.
#[derive(Debug, Clone)]
pub struct ProgressRecord {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub completed: bool,
    /// At most one entry per lecture; order is not significant.
    pub lecture_progress: Vec<LectureProgress>,
    pub updated_at: DateTime<Utc>,
}

/// Whether an upsert materialized a new record or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl ProgressRecord {
    pub fn new(user_id: Uuid, course_id: Uuid) -> Self {
        Self {
            user_id,
            course_id,
            completed: false,
            lecture_progress: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Marks a single lecture as viewed, adding an entry if it is new.
    pub fn mark_viewed(&mut self, lecture_id: Uuid) {
        match self
            .lecture_progress
            .iter_mut()
            .find(|entry| entry.lecture_id == lecture_id)
        {
            Some(entry) => entry.viewed = true,
            None => self.lecture_progress.push(LectureProgress {
                lecture_id,
                viewed: true,
            }),
        }
        self.updated_at = Utc::now();
    }

    pub fn is_viewed(&self, lecture_id: Uuid) -> bool {
        self.lecture_progress
            .iter()
            .any(|entry| entry.lecture_id == lecture_id && entry.viewed)
    }

    /// Counts the course lectures that have a viewed entry.
    pub fn viewed_count(&self, course_lectures: &[Uuid]) -> usize {
        course_lectures
            .iter()
            .filter(|lecture_id| self.is_viewed(**lecture_id))
            .count()
    }

    /// Recomputes `completed` against the course's current lecture list.
    pub fn recompute(&mut self, course_lectures: &[Uuid]) -> bool {
        let viewed = self.viewed_count(course_lectures);
        self.completed = !course_lectures.is_empty() && viewed == course_lectures.len();
        self.completed
    }

    /// Marks the course complete, adding viewed entries for untouched lectures.
    pub fn complete_all(&mut self, course_lectures: &[Uuid]) {
        for entry in &mut self.lecture_progress {
            entry.viewed = true;
        }
        for lecture_id in course_lectures {
            if !self
                .lecture_progress
                .iter()
                .any(|entry| entry.lecture_id == *lecture_id)
            {
                self.lecture_progress.push(LectureProgress {
                    lecture_id: *lecture_id,
                    viewed: true,
                });
            }
        }
        self.completed = true;
        self.updated_at = Utc::now();
    }

    /// Marks every existing entry unviewed. The entries themselves are kept.
    pub fn mark_incomplete(&mut self) {
        for entry in &mut self.lecture_progress {
            entry.viewed = false;
        }
        self.completed = false;
        self.updated_at = Utc::now();
    }

    pub fn reset(&mut self) {
        self.lecture_progress.clear();
        self.completed = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lectures(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn viewing_every_lecture_completes_the_course() {
        let course_lectures = lectures(3);
        let mut record = ProgressRecord::new(Uuid::new_v4(), Uuid::new_v4());

        record.mark_viewed(course_lectures[0]);
        record.mark_viewed(course_lectures[1]);
        assert!(!record.recompute(&course_lectures));
        assert_eq!(record.lecture_progress.len(), 2);

        record.mark_viewed(course_lectures[2]);
        assert!(record.recompute(&course_lectures));
    }

    #[test]
    fn repeated_view_does_not_add_entries() {
        let course_lectures = lectures(2);
        let mut record = ProgressRecord::new(Uuid::new_v4(), Uuid::new_v4());

        record.mark_viewed(course_lectures[0]);
        record.recompute(&course_lectures);
        let once = record.lecture_progress.clone();

        record.mark_viewed(course_lectures[0]);
        record.recompute(&course_lectures);
        assert_eq!(record.lecture_progress, once);
        assert!(!record.completed);
    }

    #[test]
    fn stale_entries_do_not_count_towards_completion() {
        let course_lectures = lectures(2);
        let mut record = ProgressRecord::new(Uuid::new_v4(), Uuid::new_v4());

        record.mark_viewed(course_lectures[0]);
        record.mark_viewed(Uuid::new_v4());
        assert_eq!(record.viewed_count(&course_lectures), 1);
        assert!(!record.recompute(&course_lectures));
    }

    #[test]
    fn complete_all_synthesizes_missing_entries() {
        let course_lectures = lectures(3);
        let mut record = ProgressRecord::new(Uuid::new_v4(), Uuid::new_v4());
        record.mark_viewed(course_lectures[1]);

        record.complete_all(&course_lectures);

        assert!(record.completed);
        assert_eq!(record.lecture_progress.len(), 3);
        assert!(record.lecture_progress.iter().all(|entry| entry.viewed));
        assert!(record.recompute(&course_lectures));
    }

    #[test]
    fn mark_incomplete_keeps_entries() {
        let course_lectures = lectures(3);
        let mut record = ProgressRecord::new(Uuid::new_v4(), Uuid::new_v4());
        for lecture_id in &course_lectures {
            record.mark_viewed(*lecture_id);
        }
        record.recompute(&course_lectures);

        record.mark_incomplete();

        assert!(!record.completed);
        assert_eq!(record.lecture_progress.len(), 3);
        assert!(record.lecture_progress.iter().all(|entry| !entry.viewed));
    }

    #[test]
    fn reset_clears_entries() {
        let mut record = ProgressRecord::new(Uuid::new_v4(), Uuid::new_v4());
        record.mark_viewed(Uuid::new_v4());
        record.completed = true;

        record.reset();

        assert!(record.lecture_progress.is_empty());
        assert!(!record.completed);
    }

    #[test]
    fn purchase_only_leaves_pending() {
        let mut purchase = Purchase::new_pending(Uuid::new_v4(), Uuid::new_v4(), Decimal::from(500));

        assert!(purchase.transition_to(PurchaseStatus::Completed).unwrap());
        assert!(!purchase.transition_to(PurchaseStatus::Completed).unwrap());
        assert!(purchase.transition_to(PurchaseStatus::Failed).is_err());
        assert!(purchase.transition_to(PurchaseStatus::Pending).is_err());
        assert_eq!(purchase.status, PurchaseStatus::Completed);
    }

    #[test]
    fn failed_purchase_cannot_complete() {
        let mut purchase = Purchase::new_pending(Uuid::new_v4(), Uuid::new_v4(), Decimal::from(10));
        purchase.transition_to(PurchaseStatus::Failed).unwrap();
        assert!(purchase.transition_to(PurchaseStatus::Completed).is_err());
    }

    #[test]
    fn minor_unit_conversion() {
        assert_eq!(amount_from_minor_units(49_950), Decimal::new(49_950, 2));
        assert_eq!(amount_from_minor_units(50_000), Decimal::from(500));
        assert_eq!(amount_to_minor_units(Decimal::new(19_99, 2)), Some(1_999));
        assert_eq!(amount_to_minor_units(Decimal::from(500)), Some(50_000));
    }

    #[test]
    fn course_update_only_touches_given_fields() {
        let mut course = Course {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            title: "Rust".to_string(),
            subtitle: None,
            description: None,
            category: "Programming".to_string(),
            level: None,
            price: None,
            thumbnail_url: None,
            is_published: false,
            lectures: Vec::new(),
            enrolled_students: Vec::new(),
            created_at: Utc::now(),
        };

        CourseUpdate {
            price: Some(Decimal::from(500)),
            is_published: Some(true),
            ..Default::default()
        }
        .apply(&mut course);

        assert_eq!(course.title, "Rust");
        assert_eq!(course.price, Some(Decimal::from(500)));
        assert!(course.is_published);
    }

    #[test]
    fn lecture_video_needs_both_url_and_media_id() {
        let mut lecture = Lecture {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: "Intro".to_string(),
            video_url: Some("https://videos.example.com/old.mp4".to_string()),
            public_id: Some("old".to_string()),
            is_preview_free: false,
        };

        LectureUpdate {
            video_url: Some("https://videos.example.com/new.mp4".to_string()),
            is_preview_free: Some(true),
            ..Default::default()
        }
        .apply(&mut lecture);
        assert_eq!(lecture.public_id.as_deref(), Some("old"));
        assert!(lecture.is_preview_free);

        LectureUpdate {
            title: Some("Welcome".to_string()),
            video_url: Some("https://videos.example.com/new.mp4".to_string()),
            public_id: Some("new".to_string()),
            ..Default::default()
        }
        .apply(&mut lecture);
        assert_eq!(lecture.title, "Welcome");
        assert_eq!(lecture.public_id.as_deref(), Some("new"));
    }

    #[test]
    fn price_sort_puts_unpriced_courses_last() {
        let course = |price: Option<i64>| Course {
            id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            title: "Rust".to_string(),
            subtitle: None,
            description: None,
            category: "Programming".to_string(),
            level: None,
            price: price.map(Decimal::from),
            thumbnail_url: None,
            is_published: true,
            lectures: Vec::new(),
            enrolled_students: Vec::new(),
            created_at: Utc::now(),
        };
        let mut courses = vec![course(None), course(Some(30)), course(Some(10))];

        sort_by_price(&mut courses, PriceSort::LowToHigh);
        let prices: Vec<_> = courses.iter().map(|c| c.price).collect();
        assert_eq!(prices, vec![Some(Decimal::from(10)), Some(Decimal::from(30)), None]);

        sort_by_price(&mut courses, PriceSort::HighToLow);
        let prices: Vec<_> = courses.iter().map(|c| c.price).collect();
        assert_eq!(prices, vec![Some(Decimal::from(30)), Some(Decimal::from(10)), None]);

        assert_eq!(PriceSort::from_query("low"), Some(PriceSort::LowToHigh));
        assert_eq!(PriceSort::from_query("cheap"), None);
    }
}
