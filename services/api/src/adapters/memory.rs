//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Used by the test
//! suite and for running the service locally without PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use course_market_core::domain::{
    sort_by_price, Course, CourseDetails, CourseSearch, Lecture, NewCourse, NewLecture, NewUser,
    ProgressRecord, Purchase, PurchaseStatus, PurchasedCourse, User, UserCredentials,
};
use course_market_core::ports::{DatabaseService, PortError, PortResult};
use regex::RegexBuilder;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserCredentials>,
    courses: HashMap<Uuid, Course>,
    lectures: HashMap<Uuid, Lecture>,
    purchases: Vec<Purchase>,
    progress: HashMap<(Uuid, Uuid), ProgressRecord>,
}

/// A `DatabaseService` backed by in-memory tables behind a single lock.
#[derive(Default)]
pub struct MemoryDb {
    tables: RwLock<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

fn course_not_found(course_id: Uuid) -> PortError {
    PortError::NotFound(format!("Course {} not found", course_id))
}

fn lecture_not_found(lecture_id: Uuid) -> PortError {
    PortError::NotFound(format!("Lecture {} not found", lecture_id))
}

fn add_unique(set: &mut Vec<Uuid>, id: Uuid) {
    if !set.contains(&id) {
        set.push(id);
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|existing| existing.user.email == user.email)
        {
            return Err(PortError::Validation("User already exists".to_string()));
        }

        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            role: user.role,
            photo_url: None,
            enrolled_courses: Vec::new(),
            created_at: Utc::now(),
        };
        tables.users.insert(
            created.id,
            UserCredentials {
                user: created.clone(),
                hashed_password: user.hashed_password,
            },
        );
        Ok(created)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&user_id)
            .map(|creds| creds.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_credentials(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|creds| creds.user.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound("User not found".to_string()))
    }

    async fn add_enrolled_course(&self, user_id: Uuid, course_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let creds = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        add_unique(&mut creds.user.enrolled_courses, course_id);
        Ok(())
    }

    async fn update_user_name(&self, user_id: Uuid, name: &str) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        let creds = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        creds.user.name = name.to_string();
        Ok(creds.user.clone())
    }

    async fn create_course(&self, course: NewCourse) -> PortResult<Course> {
        let created = Course {
            id: Uuid::new_v4(),
            creator_id: course.creator_id,
            title: course.title,
            subtitle: None,
            description: None,
            category: course.category,
            level: None,
            price: None,
            thumbnail_url: None,
            is_published: false,
            lectures: Vec::new(),
            enrolled_students: Vec::new(),
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .courses
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<Course> {
        let tables = self.tables.read().await;
        tables
            .courses
            .get(&course_id)
            .cloned()
            .ok_or_else(|| course_not_found(course_id))
    }

    async fn get_course_details(&self, course_id: Uuid) -> PortResult<CourseDetails> {
        let tables = self.tables.read().await;
        let course = tables
            .courses
            .get(&course_id)
            .cloned()
            .ok_or_else(|| course_not_found(course_id))?;
        let lectures = course
            .lectures
            .iter()
            .filter_map(|id| tables.lectures.get(id).cloned())
            .collect();
        Ok(CourseDetails { course, lectures })
    }

    async fn update_course(&self, course: &Course) -> PortResult<Course> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .courses
            .get_mut(&course.id)
            .ok_or_else(|| course_not_found(course.id))?;
        stored.title = course.title.clone();
        stored.subtitle = course.subtitle.clone();
        stored.description = course.description.clone();
        stored.category = course.category.clone();
        stored.level = course.level.clone();
        stored.price = course.price;
        stored.thumbnail_url = course.thumbnail_url.clone();
        stored.is_published = course.is_published;
        Ok(stored.clone())
    }

    async fn list_courses_by_creator(&self, creator_id: Uuid) -> PortResult<Vec<Course>> {
        let tables = self.tables.read().await;
        let mut courses: Vec<Course> = tables
            .courses
            .values()
            .filter(|course| course.creator_id == creator_id)
            .cloned()
            .collect();
        courses.sort_by_key(|course| course.created_at);
        Ok(courses)
    }

    async fn list_published_courses(&self) -> PortResult<Vec<Course>> {
        let tables = self.tables.read().await;
        let mut courses: Vec<Course> = tables
            .courses
            .values()
            .filter(|course| course.is_published)
            .cloned()
            .collect();
        courses.sort_by_key(|course| course.created_at);
        Ok(courses)
    }

    async fn search_courses(&self, search: &CourseSearch) -> PortResult<Vec<Course>> {
        let pattern = RegexBuilder::new(&search.query)
            .case_insensitive(true)
            .build()
            .map_err(|e| PortError::Validation(format!("Invalid search query: {}", e)))?;

        let tables = self.tables.read().await;
        let mut courses: Vec<Course> = tables
            .courses
            .values()
            .filter(|course| course.is_published)
            .filter(|course| {
                pattern.is_match(&course.title)
                    || course
                        .subtitle
                        .as_deref()
                        .is_some_and(|subtitle| pattern.is_match(subtitle))
                    || pattern.is_match(&course.category)
            })
            .filter(|course| {
                search.categories.is_empty() || search.categories.contains(&course.category)
            })
            .cloned()
            .collect();
        courses.sort_by_key(|course| course.created_at);
        if let Some(sort) = search.sort {
            sort_by_price(&mut courses, sort);
        }
        Ok(courses)
    }

    async fn delete_course(&self, course_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&course_id) {
            return Err(course_not_found(course_id));
        }
        if tables
            .purchases
            .iter()
            .any(|p| p.course_id == course_id && p.status == PurchaseStatus::Completed)
        {
            return Err(PortError::Validation(
                "Course has been purchased and cannot be deleted".to_string(),
            ));
        }

        tables.purchases.retain(|p| p.course_id != course_id);
        tables.progress.retain(|(_, course), _| *course != course_id);
        tables.lectures.retain(|_, lecture| lecture.course_id != course_id);
        tables.courses.remove(&course_id);
        Ok(())
    }

    async fn list_courses_by_ids(&self, course_ids: &[Uuid]) -> PortResult<Vec<Course>> {
        let tables = self.tables.read().await;
        Ok(course_ids
            .iter()
            .filter_map(|id| tables.courses.get(id).cloned())
            .collect())
    }

    async fn add_enrolled_student(&self, course_id: Uuid, user_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let course = tables
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| course_not_found(course_id))?;
        add_unique(&mut course.enrolled_students, user_id);
        Ok(())
    }

    async fn create_lecture(&self, lecture: NewLecture) -> PortResult<Lecture> {
        let mut tables = self.tables.write().await;
        let created = Lecture {
            id: Uuid::new_v4(),
            course_id: lecture.course_id,
            title: lecture.title,
            video_url: lecture.video_url,
            public_id: lecture.public_id,
            is_preview_free: lecture.is_preview_free,
        };
        let course = tables
            .courses
            .get_mut(&lecture.course_id)
            .ok_or_else(|| course_not_found(lecture.course_id))?;
        course.lectures.push(created.id);
        tables.lectures.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_lecture(&self, lecture_id: Uuid) -> PortResult<Lecture> {
        let tables = self.tables.read().await;
        tables
            .lectures
            .get(&lecture_id)
            .cloned()
            .ok_or_else(|| lecture_not_found(lecture_id))
    }

    async fn update_lecture(&self, lecture: &Lecture) -> PortResult<Lecture> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .lectures
            .get_mut(&lecture.id)
            .ok_or_else(|| lecture_not_found(lecture.id))?;
        stored.title = lecture.title.clone();
        stored.video_url = lecture.video_url.clone();
        stored.public_id = lecture.public_id.clone();
        stored.is_preview_free = lecture.is_preview_free;
        Ok(stored.clone())
    }

    async fn delete_lecture(&self, lecture_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let lecture = tables
            .lectures
            .remove(&lecture_id)
            .ok_or_else(|| lecture_not_found(lecture_id))?;
        if let Some(course) = tables.courses.get_mut(&lecture.course_id) {
            course.lectures.retain(|id| *id != lecture_id);
        }
        Ok(())
    }

    async fn set_lectures_preview_free(&self, lecture_ids: &[Uuid]) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        for id in lecture_ids {
            if let Some(lecture) = tables.lectures.get_mut(id) {
                lecture.is_preview_free = true;
            }
        }
        Ok(())
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> PortResult<()> {
        self.tables.write().await.purchases.push(purchase.clone());
        Ok(())
    }

    async fn attach_payment_session(&self, purchase_id: Uuid, session_id: &str) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .purchases
            .iter()
            .any(|p| p.id != purchase_id && p.payment_session_id.as_deref() == Some(session_id))
        {
            return Err(PortError::Unexpected(format!(
                "Payment session {} is already attached to another purchase",
                session_id
            )));
        }
        let purchase = tables
            .purchases
            .iter_mut()
            .find(|p| p.id == purchase_id)
            .ok_or_else(|| PortError::NotFound(format!("Purchase {} not found", purchase_id)))?;
        purchase.payment_session_id = Some(session_id.to_string());
        purchase.updated_at = Utc::now();
        Ok(())
    }

    async fn find_purchase_by_session(&self, session_id: &str) -> PortResult<Option<Purchase>> {
        let tables = self.tables.read().await;
        Ok(tables
            .purchases
            .iter()
            .find(|p| p.payment_session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn update_purchase(&self, purchase: &Purchase) -> PortResult<bool> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .purchases
            .iter_mut()
            .find(|p| p.id == purchase.id)
            .ok_or_else(|| PortError::NotFound(format!("Purchase {} not found", purchase.id)))?;
        if stored.status != PurchaseStatus::Pending && stored.status != purchase.status {
            return Ok(false);
        }
        stored.status = purchase.status;
        stored.amount = purchase.amount;
        stored.updated_at = purchase.updated_at;
        Ok(true)
    }

    async fn find_purchases(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Vec<Purchase>> {
        let tables = self.tables.read().await;
        Ok(tables
            .purchases
            .iter()
            .filter(|p| p.user_id == user_id && p.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn list_completed_purchases(&self) -> PortResult<Vec<PurchasedCourse>> {
        let tables = self.tables.read().await;
        Ok(tables
            .purchases
            .iter()
            .filter(|p| p.status == PurchaseStatus::Completed)
            .filter_map(|p| {
                let course = tables.courses.get(&p.course_id)?;
                let buyer = tables.users.get(&p.user_id)?;
                Some(PurchasedCourse {
                    purchase: p.clone(),
                    course: course.clone(),
                    buyer_name: buyer.user.name.clone(),
                    buyer_email: buyer.user.email.clone(),
                })
            })
            .collect())
    }

    async fn get_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<Option<ProgressRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.progress.get(&(user_id, course_id)).cloned())
    }

    async fn save_progress(&self, record: &ProgressRecord) -> PortResult<()> {
        self.tables
            .write()
            .await
            .progress
            .insert((record.user_id, record.course_id), record.clone());
        Ok(())
    }
}
