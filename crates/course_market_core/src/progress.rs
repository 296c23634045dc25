//! crates/course_market_core/src/progress.rs
//!
//! Lecture-view tracking and course completion for enrolled users.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{CourseDetails, LectureProgress, ProgressRecord, UpsertOutcome};
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Debug, Clone)]
pub struct LectureViewResult {
    pub outcome: UpsertOutcome,
    pub completed: bool,
    pub viewed: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub completed: bool,
    pub total_lectures: usize,
}

#[derive(Debug, Clone)]
pub struct CourseProgress {
    pub course: CourseDetails,
    pub progress: Vec<LectureProgress>,
    pub completed: bool,
}

pub struct ProgressOrchestrator {
    db: Arc<dyn DatabaseService>,
}

impl ProgressOrchestrator {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Marks a lecture viewed, creating the progress record on first use.
    pub async fn record_lecture_view(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        lecture_id: Uuid,
    ) -> PortResult<LectureViewResult> {
        let course = self.db.get_course(course_id).await?;
        if !course.lectures.contains(&lecture_id) {
            return Err(PortError::NotFound(
                "Lecture not found in this course".to_string(),
            ));
        }

        let (mut record, outcome) = match self.db.get_progress(user_id, course_id).await? {
            Some(record) => (record, UpsertOutcome::Updated),
            None => (
                ProgressRecord::new(user_id, course_id),
                UpsertOutcome::Created,
            ),
        };

        record.mark_viewed(lecture_id);
        let completed = record.recompute(&course.lectures);
        self.db.save_progress(&record).await?;

        let viewed = record.viewed_count(&course.lectures);
        if completed {
            info!(user_id = %user_id, course_id = %course_id, "Course completed");
        }

        Ok(LectureViewResult {
            outcome,
            completed,
            viewed,
            total: course.lectures.len(),
        })
    }

    /// Forces the completion flag. Requires an existing progress record.
    pub async fn set_completion(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        completed: bool,
    ) -> PortResult<CompletionResult> {
        let mut record = self.existing_record(user_id, course_id).await?;

        if completed {
            let course = self.db.get_course(course_id).await?;
            record.complete_all(&course.lectures);
        } else {
            record.mark_incomplete();
        }
        self.db.save_progress(&record).await?;

        Ok(CompletionResult {
            completed: record.completed,
            total_lectures: record.lecture_progress.len(),
        })
    }

    pub async fn reset_progress(&self, user_id: Uuid, course_id: Uuid) -> PortResult<()> {
        let mut record = self.existing_record(user_id, course_id).await?;
        record.reset();
        self.db.save_progress(&record).await
    }

    /// Reads the course with the user's progress; a missing record reads as empty.
    pub async fn get_progress(&self, user_id: Uuid, course_id: Uuid) -> PortResult<CourseProgress> {
        let course = self.db.get_course_details(course_id).await?;
        let record = self.db.get_progress(user_id, course_id).await?;

        Ok(match record {
            Some(record) => CourseProgress {
                course,
                progress: record.lecture_progress,
                completed: record.completed,
            },
            None => CourseProgress {
                course,
                progress: Vec::new(),
                completed: false,
            },
        })
    }

    async fn existing_record(&self, user_id: Uuid, course_id: Uuid) -> PortResult<ProgressRecord> {
        self.db
            .get_progress(user_id, course_id)
            .await?
            .ok_or_else(|| PortError::NotFound("Course progress not found".to_string()))
    }
}
