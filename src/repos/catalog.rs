//! Read access to the course catalog tables
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;
use failure::Error as FailureError;

use models::*;
use repos::types::RepoResult;
use schema::courses::dsl as Courses;
use schema::lessons::dsl as Lessons;
use schema::users::dsl as Users;
use types::{CourseId, LessonId, UserId};

/// Catalog repository, courses, lessons and user names are owned by the catalog and only read here
pub struct CatalogRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait CatalogRepo {
    /// Find course by id
    fn get_course(&self, id_arg: CourseId) -> RepoResult<Option<Course>>;

    /// Lessons of a course ordered by position
    fn list_lessons(&self, course_id_arg: CourseId) -> RepoResult<Vec<Lesson>>;

    /// Find lesson by id
    fn get_lesson(&self, id_arg: LessonId) -> RepoResult<Option<Lesson>>;

    /// Find user display name
    fn get_user(&self, id_arg: UserId) -> RepoResult<Option<UserProfile>>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CatalogRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CatalogRepo for CatalogRepoImpl<'a, T> {
    fn get_course(&self, id_arg: CourseId) -> RepoResult<Option<Course>> {
        debug!("Find course with id {}.", id_arg);
        let query = Courses::courses.filter(Courses::id.eq(id_arg));

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(|e| FailureError::from(e).context(format!("Find course by id: {} error occurred", id_arg)).into())
    }

    fn list_lessons(&self, course_id_arg: CourseId) -> RepoResult<Vec<Lesson>> {
        debug!("Find lessons of course {}.", course_id_arg);
        let query = Lessons::lessons
            .filter(Lessons::course_id.eq(course_id_arg))
            .order((Lessons::position, Lessons::id));

        query
            .get_results(self.db_conn)
            .map_err(|e| FailureError::from(e).context(format!("List lessons of course: {} error occurred", course_id_arg)).into())
    }

    fn get_lesson(&self, id_arg: LessonId) -> RepoResult<Option<Lesson>> {
        debug!("Find lesson with id {}.", id_arg);
        let query = Lessons::lessons.filter(Lessons::id.eq(id_arg));

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(|e| FailureError::from(e).context(format!("Find lesson by id: {} error occurred", id_arg)).into())
    }

    fn get_user(&self, id_arg: UserId) -> RepoResult<Option<UserProfile>> {
        debug!("Find user with id {}.", id_arg);
        let query = Users::users.filter(Users::id.eq(id_arg));

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(|e| FailureError::from(e).context(format!("Find user by id: {} error occurred", id_arg)).into())
    }
}
