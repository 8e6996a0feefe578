//! Per-lesson progress rows
use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;
use failure::Error as FailureError;

use std::time::SystemTime;

use models::*;
use repos::types::RepoResult;
use schema::lesson_progress::dsl as LessonProgresses;
use types::{CourseId, LessonId, UserId};

/// LessonProgress repository
pub struct LessonProgressRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait LessonProgressRepo {
    /// Progress of the user in the lesson
    fn get(&self, user_id_arg: UserId, lesson_id_arg: LessonId) -> RepoResult<Option<LessonProgress>>;

    /// Inserts or overwrites the row of (user, lesson)
    fn upsert(&self, payload: LessonProgressValues) -> RepoResult<LessonProgress>;

    /// All rows of the user in the course
    fn list_by_user_course(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Vec<LessonProgress>>;

    /// Drops completion flags of the user in the course, watched time and quiz results stay
    fn reset_completion(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<usize>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> LessonProgressRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> LessonProgressRepo
    for LessonProgressRepoImpl<'a, T>
{
    fn get(&self, user_id_arg: UserId, lesson_id_arg: LessonId) -> RepoResult<Option<LessonProgress>> {
        debug!("Find progress of user {} in lesson {}.", user_id_arg, lesson_id_arg);
        let query = LessonProgresses::lesson_progress
            .filter(LessonProgresses::user_id.eq(user_id_arg))
            .filter(LessonProgresses::lesson_id.eq(lesson_id_arg));

        query.get_result(self.db_conn).optional().map_err(From::from).map_err(|e: FailureError| {
            e.context(format!(
                "Find progress of user: {} in lesson: {} error occurred",
                user_id_arg, lesson_id_arg
            )).into()
        })
    }

    fn upsert(&self, payload: LessonProgressValues) -> RepoResult<LessonProgress> {
        debug!("Upsert lesson progress {:?}.", payload);
        let query = diesel::insert_into(LessonProgresses::lesson_progress)
            .values(&payload)
            .on_conflict((LessonProgresses::user_id, LessonProgresses::lesson_id))
            .do_update()
            .set((&payload, LessonProgresses::updated_at.eq(SystemTime::now())));

        query
            .get_result::<LessonProgress>(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Upsert lesson progress: {:?} error occurred", payload)).into())
    }

    fn list_by_user_course(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Vec<LessonProgress>> {
        debug!("Find progress of user {} in course {}.", user_id_arg, course_id_arg);
        let query = LessonProgresses::lesson_progress
            .filter(LessonProgresses::user_id.eq(user_id_arg))
            .filter(LessonProgresses::course_id.eq(course_id_arg))
            .order(LessonProgresses::lesson_id);

        query.get_results(self.db_conn).map_err(From::from).map_err(|e: FailureError| {
            e.context(format!(
                "Find progress of user: {} in course: {} error occurred",
                user_id_arg, course_id_arg
            )).into()
        })
    }

    fn reset_completion(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<usize> {
        debug!("Reset lesson completion of user {} in course {}.", user_id_arg, course_id_arg);
        let filtered = LessonProgresses::lesson_progress
            .filter(LessonProgresses::user_id.eq(user_id_arg))
            .filter(LessonProgresses::course_id.eq(course_id_arg));
        let query = diesel::update(filtered).set((
            LessonProgresses::is_completed.eq(false),
            LessonProgresses::completed_at.eq(None::<SystemTime>),
            LessonProgresses::updated_at.eq(SystemTime::now()),
        ));

        query.execute(self.db_conn).map_err(From::from).map_err(|e: FailureError| {
            e.context(format!(
                "Reset lesson completion of user: {} in course: {} error occurred",
                user_id_arg, course_id_arg
            )).into()
        })
    }
}
