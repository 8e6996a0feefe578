//! Enrollments, one per (user, course)
use std::time::SystemTime;

use diesel::sql_types::Text;

use types::{CourseId, EnrollmentId, LessonId, OrderId, UserId};

use schema::enrollments;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, FromSqlRow, AsExpression)]
#[sql_type = "Text"]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Paused,
    Cancelled,
}

text_enum_sql!(EnrollmentStatus {
    Active => "active",
    Completed => "completed",
    Paused => "paused",
    Cancelled => "cancelled",
});

impl EnrollmentStatus {
    /// Statuses in which lesson progress may be recorded
    pub fn accepts_progress(&self) -> bool {
        match *self {
            EnrollmentStatus::Active | EnrollmentStatus::Completed => true,
            EnrollmentStatus::Paused | EnrollmentStatus::Cancelled => false,
        }
    }

    /// Statuses that grant access to the course
    pub fn grants_access(&self) -> bool {
        *self != EnrollmentStatus::Cancelled
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, FromSqlRow, AsExpression)]
#[sql_type = "Text"]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentSource {
    Free,
    Order,
}

text_enum_sql!(EnrollmentSource {
    Free => "free",
    Order => "order",
});

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub completed_lessons: Vec<i32>,
    pub progress: i32,
    pub status: EnrollmentStatus,
    pub source: EnrollmentSource,
    pub order_id: Option<OrderId>,
    pub certificate_issued: bool,
    pub enrolled_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Enrollment {
    pub fn has_completed(&self, lesson_id: LessonId) -> bool {
        self.completed_lessons.contains(&lesson_id.0)
    }
}

#[derive(Serialize, Deserialize, Insertable, Clone, Debug)]
#[table_name = "enrollments"]
pub struct NewEnrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub source: EnrollmentSource,
    pub order_id: Option<OrderId>,
}

impl NewEnrollment {
    pub fn new(user_id: UserId, course_id: CourseId, source: EnrollmentSource, order_id: Option<OrderId>) -> Self {
        Self {
            user_id,
            course_id,
            status: EnrollmentStatus::Active,
            source,
            order_id,
        }
    }
}

/// Aggregate write produced by the progress aggregator
#[derive(Clone, Debug, PartialEq)]
pub struct EnrollmentProgress {
    pub completed_lessons: Vec<i32>,
    pub progress: i32,
    pub status: EnrollmentStatus,
}
