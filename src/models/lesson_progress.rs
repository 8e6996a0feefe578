//! Per-lesson progress rows
use std::time::SystemTime;

use validator::Validate;

use models::certificates::Certificate;
use models::enrollments::Enrollment;
use types::{CourseId, LessonId, UserId};

use schema::lesson_progress;

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct LessonProgress {
    pub id: i32,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub is_completed: bool,
    pub watched_duration: i32,
    pub total_duration: i32,
    pub quiz_score: Option<i32>,
    pub quiz_attempts: i32,
    pub completed_at: Option<SystemTime>,
    pub updated_at: SystemTime,
}

/// Values written for a lesson row, both for insert and for update
#[derive(Serialize, Deserialize, Insertable, AsChangeset, Clone, Debug, PartialEq)]
#[table_name = "lesson_progress"]
#[changeset_options(treat_none_as_null = "true")]
pub struct LessonProgressValues {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub is_completed: bool,
    pub watched_duration: i32,
    pub total_duration: i32,
    pub quiz_score: Option<i32>,
    pub quiz_attempts: i32,
    pub completed_at: Option<SystemTime>,
}

/// What the player reports for a lesson
#[derive(Serialize, Deserialize, Validate, Clone, Debug, Default)]
pub struct ProgressDelta {
    #[validate(range(min = "0.0", max = "86400.0"))]
    pub watched_duration: Option<i32>,
    pub completed: Option<bool>,
    #[validate(range(min = "0.0", max = "100.0"))]
    pub quiz_score: Option<i32>,
}

/// Answer of `record_lesson_progress`: the lesson row, the rolled up enrollment and the
/// certificate when this write completed the course
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LessonProgressReport {
    pub lesson: LessonProgress,
    pub enrollment: Enrollment,
    pub certificate: Option<Certificate>,
}
