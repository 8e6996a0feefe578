//! Read-only facts owned by the course catalog

use types::{CourseId, LessonId, UserId};

/// Course as published in the catalog
#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub category: String,
    pub price: i64,
    pub currency: String,
    pub instructor_name: String,
    pub is_published: bool,
}

impl Course {
    pub fn is_free(&self) -> bool {
        self.price == 0
    }
}

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    /// Seconds
    pub duration: i32,
    pub position: i32,
}

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
}
