//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Entitlements are stored the way the document model describes them: as id
//! arrays on both `users.enrolled_courses` and `courses.enrolled_students`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_market_core::domain::{
    Course, CourseDetails, CourseSearch, Lecture, LectureProgress, NewCourse, NewLecture, NewUser,
    PriceSort, ProgressRecord, Purchase, PurchasedCourse, User, UserCredentials,
};
use course_market_core::ports::{DatabaseService, PortError, PortResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

/// SQLSTATE for a malformed regular expression.
const INVALID_REGEX: &str = "2201B";

fn search_order(sort: Option<PriceSort>) -> &'static str {
    match sort {
        Some(PriceSort::LowToHigh) => "price ASC NULLS LAST, created_at ASC",
        Some(PriceSort::HighToLow) => "price DESC NULLS LAST, created_at ASC",
        None => "created_at ASC",
    }
}

const USER_COLUMNS: &str =
    "id, name, email, hashed_password, role, photo_url, enrolled_courses, created_at";
const COURSE_COLUMNS: &str = "id, creator_id, title, subtitle, description, category, level, \
     price, thumbnail_url, is_published, lectures, enrolled_students, created_at";
const LECTURE_COLUMNS: &str = "id, course_id, title, video_url, public_id, is_preview_free";
const PURCHASE_COLUMNS: &str =
    "id, course_id, user_id, amount, status, payment_session_id, created_at, updated_at";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    hashed_password: String,
    role: String,
    photo_url: Option<String>,
    enrolled_courses: Vec<Uuid>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<UserCredentials> {
        Ok(UserCredentials {
            user: User {
                id: self.id,
                name: self.name,
                email: self.email,
                role: self.role.parse()?,
                photo_url: self.photo_url,
                enrolled_courses: self.enrolled_courses,
                created_at: self.created_at,
            },
            hashed_password: self.hashed_password,
        })
    }
}

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    creator_id: Uuid,
    title: String,
    subtitle: Option<String>,
    description: Option<String>,
    category: String,
    level: Option<String>,
    price: Option<Decimal>,
    thumbnail_url: Option<String>,
    is_published: bool,
    lectures: Vec<Uuid>,
    enrolled_students: Vec<Uuid>,
    created_at: DateTime<Utc>,
}
impl CourseRecord {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            creator_id: self.creator_id,
            title: self.title,
            subtitle: self.subtitle,
            description: self.description,
            category: self.category,
            level: self.level,
            price: self.price,
            thumbnail_url: self.thumbnail_url,
            is_published: self.is_published,
            lectures: self.lectures,
            enrolled_students: self.enrolled_students,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct LectureRecord {
    id: Uuid,
    course_id: Uuid,
    title: String,
    video_url: Option<String>,
    public_id: Option<String>,
    is_preview_free: bool,
}
impl LectureRecord {
    fn to_domain(self) -> Lecture {
        Lecture {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            video_url: self.video_url,
            public_id: self.public_id,
            is_preview_free: self.is_preview_free,
        }
    }
}

#[derive(FromRow)]
struct PurchaseRecord {
    id: Uuid,
    course_id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    status: String,
    payment_session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl PurchaseRecord {
    fn to_domain(self) -> PortResult<Purchase> {
        Ok(Purchase {
            id: self.id,
            course_id: self.course_id,
            user_id: self.user_id,
            amount: self.amount,
            status: self.status.parse()?,
            payment_session_id: self.payment_session_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct BuyerRecord {
    purchase_id: Uuid,
    buyer_name: String,
    buyer_email: String,
}

/// The JSONB shape of one lecture-progress entry.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LectureProgressDoc {
    lecture_id: Uuid,
    viewed: bool,
}

#[derive(FromRow)]
struct ProgressRecordRow {
    user_id: Uuid,
    course_id: Uuid,
    completed: bool,
    lecture_progress: Json<Vec<LectureProgressDoc>>,
    updated_at: DateTime<Utc>,
}
impl ProgressRecordRow {
    fn to_domain(self) -> ProgressRecord {
        ProgressRecord {
            user_id: self.user_id,
            course_id: self.course_id,
            completed: self.completed,
            lecture_progress: self
                .lecture_progress
                .0
                .into_iter()
                .map(|doc| LectureProgress {
                    lecture_id: doc.lecture_id,
                    viewed: doc.viewed,
                })
                .collect(),
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, name, email, hashed_password, role) VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                PortError::Validation("User already exists".to_string())
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain()?.user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", user_id)))?;
        Ok(record.to_domain()?.user)
    }

    async fn get_user_credentials(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "User not found".to_string()))?;
        record.to_domain()
    }

    async fn add_enrolled_course(&self, user_id: Uuid, course_id: Uuid) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET enrolled_courses = array_append(enrolled_courses, $2) \
             WHERE id = $1 AND NOT ($2 = ANY(enrolled_courses))",
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            // Either already enrolled or the user does not exist.
            self.get_user_by_id(user_id).await?;
        }
        Ok(())
    }

    async fn update_user_name(&self, user_id: Uuid, name: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET name = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {} not found", user_id)))?;
        Ok(record.to_domain()?.user)
    }

    async fn create_course(&self, course: NewCourse) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "INSERT INTO courses (id, creator_id, title, category) VALUES ($1, $2, $3, $4) \
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(course.creator_id)
        .bind(&course.title)
        .bind(&course.category)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Course {} not found", course_id)))?;
        Ok(record.to_domain())
    }

    async fn get_course_details(&self, course_id: Uuid) -> PortResult<CourseDetails> {
        let course = self.get_course(course_id).await?;
        let records = sqlx::query_as::<_, LectureRecord>(&format!(
            "SELECT {LECTURE_COLUMNS} FROM lectures WHERE id = ANY($1)"
        ))
        .bind(&course.lectures)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut lectures: Vec<Lecture> = records.into_iter().map(|r| r.to_domain()).collect();
        lectures.sort_by_key(|lecture| {
            course
                .lectures
                .iter()
                .position(|id| *id == lecture.id)
                .unwrap_or(usize::MAX)
        });
        Ok(CourseDetails { course, lectures })
    }

    async fn update_course(&self, course: &Course) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "UPDATE courses SET title = $2, subtitle = $3, description = $4, category = $5, \
             level = $6, price = $7, thumbnail_url = $8, is_published = $9 \
             WHERE id = $1 RETURNING {COURSE_COLUMNS}"
        ))
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.subtitle)
        .bind(&course.description)
        .bind(&course.category)
        .bind(&course.level)
        .bind(course.price)
        .bind(&course.thumbnail_url)
        .bind(course.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Course {} not found", course.id)))?;
        Ok(record.to_domain())
    }

    async fn list_courses_by_creator(&self, creator_id: Uuid) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE creator_id = $1 ORDER BY created_at ASC"
        ))
        .bind(creator_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_published_courses(&self) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE is_published ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn search_courses(&self, search: &CourseSearch) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE is_published \
             AND (title ~* $1 OR subtitle ~* $1 OR category ~* $1) \
             AND (cardinality($2::text[]) = 0 OR category = ANY($2)) \
             ORDER BY {}",
            search_order(search.sort)
        ))
        .bind(&search.query)
        .bind(&search.categories)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some(INVALID_REGEX) => {
                PortError::Validation(format!("Invalid search query: {}", db_err.message()))
            }
            _ => unexpected(e),
        })?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn delete_course(&self, course_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let (sold,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM purchases WHERE course_id = $1 AND status = 'completed')",
        )
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        if sold {
            return Err(PortError::Validation(
                "Course has been purchased and cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM course_progress WHERE course_id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("DELETE FROM purchases WHERE course_id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        // Lectures go with the course through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Course {} not found", course_id)));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn list_courses_by_ids(&self, course_ids: &[Uuid]) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = ANY($1) ORDER BY created_at ASC"
        ))
        .bind(course_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn add_enrolled_student(&self, course_id: Uuid, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE courses SET enrolled_students = array_append(enrolled_students, $2) \
             WHERE id = $1 AND NOT ($2 = ANY(enrolled_students))",
        )
        .bind(course_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            self.get_course(course_id).await?;
        }
        Ok(())
    }

    async fn create_lecture(&self, lecture: NewLecture) -> PortResult<Lecture> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, LectureRecord>(&format!(
            "INSERT INTO lectures (id, course_id, title, video_url, public_id, is_preview_free) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {LECTURE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(lecture.course_id)
        .bind(&lecture.title)
        .bind(&lecture.video_url)
        .bind(&lecture.public_id)
        .bind(lecture.is_preview_free)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                PortError::NotFound(format!("Course {} not found", lecture.course_id))
            }
            _ => unexpected(e),
        })?;

        sqlx::query("UPDATE courses SET lectures = array_append(lectures, $2) WHERE id = $1")
            .bind(lecture.course_id)
            .bind(record.id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_lecture(&self, lecture_id: Uuid) -> PortResult<Lecture> {
        let record = sqlx::query_as::<_, LectureRecord>(&format!(
            "SELECT {LECTURE_COLUMNS} FROM lectures WHERE id = $1"
        ))
        .bind(lecture_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Lecture {} not found", lecture_id)))?;
        Ok(record.to_domain())
    }

    async fn update_lecture(&self, lecture: &Lecture) -> PortResult<Lecture> {
        let record = sqlx::query_as::<_, LectureRecord>(&format!(
            "UPDATE lectures SET title = $2, video_url = $3, public_id = $4, is_preview_free = $5 \
             WHERE id = $1 RETURNING {LECTURE_COLUMNS}"
        ))
        .bind(lecture.id)
        .bind(&lecture.title)
        .bind(&lecture.video_url)
        .bind(&lecture.public_id)
        .bind(lecture.is_preview_free)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Lecture {} not found", lecture.id)))?;
        Ok(record.to_domain())
    }

    async fn delete_lecture(&self, lecture_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let (course_id,): (Uuid,) =
            sqlx::query_as("DELETE FROM lectures WHERE id = $1 RETURNING course_id")
                .bind(lecture_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    not_found_or_unexpected(e, format!("Lecture {} not found", lecture_id))
                })?;
        sqlx::query("UPDATE courses SET lectures = array_remove(lectures, $2) WHERE id = $1")
            .bind(course_id)
            .bind(lecture_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn set_lectures_preview_free(&self, lecture_ids: &[Uuid]) -> PortResult<()> {
        sqlx::query("UPDATE lectures SET is_preview_free = TRUE WHERE id = ANY($1)")
            .bind(lecture_ids)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> PortResult<()> {
        sqlx::query(&format!(
            "INSERT INTO purchases ({PURCHASE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(purchase.id)
        .bind(purchase.course_id)
        .bind(purchase.user_id)
        .bind(purchase.amount)
        .bind(purchase.status.as_str())
        .bind(&purchase.payment_session_id)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn attach_payment_session(&self, purchase_id: Uuid, session_id: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE purchases SET payment_session_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(purchase_id)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Purchase {} not found",
                purchase_id
            )));
        }
        Ok(())
    }

    async fn find_purchase_by_session(&self, session_id: &str) -> PortResult<Option<Purchase>> {
        let record = sqlx::query_as::<_, PurchaseRecord>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE payment_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn update_purchase(&self, purchase: &Purchase) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE purchases SET status = $2, amount = $3, updated_at = $4 \
             WHERE id = $1 AND status IN ('pending', $2)",
        )
        .bind(purchase.id)
        .bind(purchase.status.as_str())
        .bind(purchase.amount)
        .bind(purchase.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_purchases(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Vec<Purchase>> {
        let records = sqlx::query_as::<_, PurchaseRecord>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE user_id = $1 AND course_id = $2 \
             ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_completed_purchases(&self) -> PortResult<Vec<PurchasedCourse>> {
        let purchases = sqlx::query_as::<_, PurchaseRecord>(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE status = 'completed' \
             ORDER BY updated_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let buyers = sqlx::query_as::<_, BuyerRecord>(
            "SELECT p.id AS purchase_id, u.name AS buyer_name, u.email AS buyer_email \
             FROM purchases p JOIN users u ON u.id = p.user_id WHERE p.status = 'completed'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let course_ids: Vec<Uuid> = purchases.iter().map(|p| p.course_id).collect();
        let courses = self.list_courses_by_ids(&course_ids).await?;

        let mut purchased = Vec::with_capacity(purchases.len());
        for record in purchases {
            let purchase = record.to_domain()?;
            let Some(course) = courses.iter().find(|c| c.id == purchase.course_id) else {
                continue;
            };
            let Some(buyer) = buyers.iter().find(|b| b.purchase_id == purchase.id) else {
                continue;
            };
            purchased.push(PurchasedCourse {
                course: course.clone(),
                buyer_name: buyer.buyer_name.clone(),
                buyer_email: buyer.buyer_email.clone(),
                purchase,
            });
        }
        Ok(purchased)
    }

    async fn get_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<Option<ProgressRecord>> {
        let record = sqlx::query_as::<_, ProgressRecordRow>(
            "SELECT user_id, course_id, completed, lecture_progress, updated_at \
             FROM course_progress WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn save_progress(&self, record: &ProgressRecord) -> PortResult<()> {
        let entries: Vec<LectureProgressDoc> = record
            .lecture_progress
            .iter()
            .map(|entry| LectureProgressDoc {
                lecture_id: entry.lecture_id,
                viewed: entry.viewed,
            })
            .collect();

        sqlx::query(
            "INSERT INTO course_progress (user_id, course_id, completed, lecture_progress, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, course_id) DO UPDATE SET \
             completed = EXCLUDED.completed, \
             lecture_progress = EXCLUDED.lecture_progress, \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(record.user_id)
        .bind(record.course_id)
        .bind(record.completed)
        .bind(Json(entries))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
