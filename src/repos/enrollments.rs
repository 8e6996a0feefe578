//! Enrollments repo, one row per (user, course) guarded by a unique constraint
use std::time::SystemTime;

use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;
use failure::Error as FailureError;

use models::*;
use repos::types::RepoResult;
use schema::enrollments::dsl as Enrollments;
use types::{CourseId, EnrollmentId, OrderId, UserId};

/// Enrollments repository
pub struct EnrollmentsRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait EnrollmentsRepo {
    /// Inserts the enrollment unless the pair already has one. `None` means it existed.
    fn create_if_absent(&self, payload: NewEnrollment) -> RepoResult<Option<Enrollment>>;

    /// Get enrollment
    fn get(&self, id_arg: EnrollmentId) -> RepoResult<Option<Enrollment>>;

    /// Get enrollment of the user in the course
    fn get_by_user_course(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Option<Enrollment>>;

    /// Same as `get_by_user_course`, locking the row until the end of the transaction
    fn get_for_update(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Option<Enrollment>>;

    /// Enrollments of the user
    fn list_by_user(&self, user_id_arg: UserId) -> RepoResult<Vec<Enrollment>>;

    /// Changes status only
    fn set_status(&self, id_arg: EnrollmentId, status_arg: EnrollmentStatus) -> RepoResult<Enrollment>;

    /// Brings a cancelled enrollment back, keeping its progress
    fn reactivate(
        &self,
        id_arg: EnrollmentId,
        status_arg: EnrollmentStatus,
        source_arg: EnrollmentSource,
        order_id_arg: Option<OrderId>,
    ) -> RepoResult<Enrollment>;

    /// Writes aggregate progress
    fn update_progress(&self, id_arg: EnrollmentId, payload: EnrollmentProgress) -> RepoResult<Enrollment>;

    /// Sets `certificate_issued`
    fn mark_certificate_issued(&self, id_arg: EnrollmentId) -> RepoResult<Enrollment>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> EnrollmentsRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> EnrollmentsRepo for EnrollmentsRepoImpl<'a, T> {
    fn create_if_absent(&self, payload: NewEnrollment) -> RepoResult<Option<Enrollment>> {
        debug!("Create enrollment {:?}.", payload);
        let query = diesel::insert_into(Enrollments::enrollments)
            .values(&payload)
            .on_conflict_do_nothing();

        query
            .get_result::<Enrollment>(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Create enrollment: {:?} error occurred", payload)).into())
    }

    fn get(&self, id_arg: EnrollmentId) -> RepoResult<Option<Enrollment>> {
        debug!("Find enrollment with id {}.", id_arg);
        let query = Enrollments::enrollments.filter(Enrollments::id.eq(id_arg));

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Find enrollment by id: {} error occurred", id_arg)).into())
    }

    fn get_by_user_course(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Option<Enrollment>> {
        debug!("Find enrollment of user {} in course {}.", user_id_arg, course_id_arg);
        let query = Enrollments::enrollments
            .filter(Enrollments::user_id.eq(user_id_arg))
            .filter(Enrollments::course_id.eq(course_id_arg));

        query.get_result(self.db_conn).optional().map_err(From::from).map_err(|e: FailureError| {
            e.context(format!(
                "Find enrollment of user: {} in course: {} error occurred",
                user_id_arg, course_id_arg
            )).into()
        })
    }

    fn get_for_update(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Option<Enrollment>> {
        debug!("Lock enrollment of user {} in course {}.", user_id_arg, course_id_arg);
        let query = Enrollments::enrollments
            .filter(Enrollments::user_id.eq(user_id_arg))
            .filter(Enrollments::course_id.eq(course_id_arg))
            .for_update();

        query.get_result(self.db_conn).optional().map_err(From::from).map_err(|e: FailureError| {
            e.context(format!(
                "Lock enrollment of user: {} in course: {} error occurred",
                user_id_arg, course_id_arg
            )).into()
        })
    }

    fn list_by_user(&self, user_id_arg: UserId) -> RepoResult<Vec<Enrollment>> {
        debug!("Find enrollments of user {}.", user_id_arg);
        let query = Enrollments::enrollments
            .filter(Enrollments::user_id.eq(user_id_arg))
            .order(Enrollments::enrolled_at.desc());

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Find enrollments of user: {} error occurred", user_id_arg)).into())
    }

    fn set_status(&self, id_arg: EnrollmentId, status_arg: EnrollmentStatus) -> RepoResult<Enrollment> {
        debug!("Set status {} to enrollment {}.", status_arg, id_arg);
        let filtered = Enrollments::enrollments.filter(Enrollments::id.eq(id_arg));
        let query = diesel::update(filtered).set((Enrollments::status.eq(status_arg), Enrollments::updated_at.eq(SystemTime::now())));

        query
            .get_result::<Enrollment>(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Set status to enrollment: {} error occurred", id_arg)).into())
    }

    fn reactivate(
        &self,
        id_arg: EnrollmentId,
        status_arg: EnrollmentStatus,
        source_arg: EnrollmentSource,
        order_id_arg: Option<OrderId>,
    ) -> RepoResult<Enrollment> {
        debug!("Reactivate enrollment {} from {}.", id_arg, source_arg);
        let filtered = Enrollments::enrollments.filter(Enrollments::id.eq(id_arg));
        let query = diesel::update(filtered).set((
            Enrollments::status.eq(status_arg),
            Enrollments::source.eq(source_arg),
            Enrollments::order_id.eq(order_id_arg),
            Enrollments::updated_at.eq(SystemTime::now()),
        ));

        query
            .get_result::<Enrollment>(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Reactivate enrollment: {} error occurred", id_arg)).into())
    }

    fn update_progress(&self, id_arg: EnrollmentId, payload: EnrollmentProgress) -> RepoResult<Enrollment> {
        debug!("Update progress of enrollment {} with {:?}.", id_arg, payload);
        let filtered = Enrollments::enrollments.filter(Enrollments::id.eq(id_arg));
        let query = diesel::update(filtered).set((
            Enrollments::completed_lessons.eq(payload.completed_lessons),
            Enrollments::progress.eq(payload.progress),
            Enrollments::status.eq(payload.status),
            Enrollments::updated_at.eq(SystemTime::now()),
        ));

        query
            .get_result::<Enrollment>(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Update progress of enrollment: {} error occurred", id_arg)).into())
    }

    fn mark_certificate_issued(&self, id_arg: EnrollmentId) -> RepoResult<Enrollment> {
        debug!("Mark certificate issued for enrollment {}.", id_arg);
        let filtered = Enrollments::enrollments.filter(Enrollments::id.eq(id_arg));
        let query = diesel::update(filtered).set((
            Enrollments::certificate_issued.eq(true),
            Enrollments::updated_at.eq(SystemTime::now()),
        ));

        query
            .get_result::<Enrollment>(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Mark certificate issued for enrollment: {} error occurred", id_arg)).into())
    }
}
