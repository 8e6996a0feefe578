//! Enrollment manager. One enrollment per (user, course), cancelled ones are reactivated.

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use r2d2::ManageConnection;

use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::{EnrollmentsRepo, RepoResult, ReposFactory};
use services::Service;
use types::{CourseId, EnrollmentId, OrderId, UserId};

pub trait EnrollmentsService {
    /// Enrolls the caller into a free course, no order is involved
    fn enroll_free(&self, course_id: CourseId) -> ServiceFuture<Enrollment>;
    /// Enrollment of the caller in the course
    fn get_enrollment(&self, course_id: CourseId) -> ServiceFuture<Enrollment>;
    /// Enrollments of the caller
    fn list_enrollments(&self) -> ServiceFuture<Vec<Enrollment>>;
    /// Cancels access, progress and certificates stay
    fn cancel_enrollment(&self, enrollment_id: EnrollmentId) -> ServiceFuture<Enrollment>;
    /// Drops progress of the enrollment, the only way progress goes down
    fn reset_progress(&self, enrollment_id: EnrollmentId) -> ServiceFuture<Enrollment>;
    /// active -> paused
    fn pause_enrollment(&self, course_id: CourseId) -> ServiceFuture<Enrollment>;
    /// paused -> active
    fn resume_enrollment(&self, course_id: CourseId) -> ServiceFuture<Enrollment>;
}

/// Creates the enrollment or returns the existing one. A cancelled enrollment is reactivated
/// with its progress; any other existing enrollment is returned untouched.
pub fn enroll(
    enrollments_repo: &EnrollmentsRepo,
    user_id: UserId,
    course_id: CourseId,
    source: EnrollmentSource,
    order_id: Option<OrderId>,
) -> RepoResult<Enrollment> {
    if let Some(created) = enrollments_repo.create_if_absent(NewEnrollment::new(user_id, course_id, source, order_id))? {
        info!("User {} enrolled in course {} from {}.", user_id, course_id, source);
        return Ok(created);
    }

    let existing = enrollments_repo
        .get_for_update(user_id, course_id)?
        .ok_or_else(|| format_err!("Enrollment of user {} in course {} vanished", user_id, course_id))?;

    if existing.status == EnrollmentStatus::Cancelled {
        let status = if existing.progress >= 100 {
            EnrollmentStatus::Completed
        } else {
            EnrollmentStatus::Active
        };
        let reactivated = enrollments_repo.reactivate(existing.id, status, source, order_id.or(existing.order_id))?;
        info!("Enrollment {} of user {} reactivated as {}.", reactivated.id, user_id, reactivated.status);
        Ok(reactivated)
    } else {
        debug!("User {} is already enrolled in course {}.", user_id, course_id);
        Ok(existing)
    }
}

fn not_found(user_id: UserId, course_id: CourseId) -> FailureError {
    format_err!("User {} is not enrolled in course {}", user_id, course_id)
        .context(Error::NotFound)
        .into()
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > EnrollmentsService for Service<M, F>
{
    fn enroll_free(&self, course_id: CourseId) -> ServiceFuture<Enrollment> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_verified_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let catalog_repo = repo_factory.create_catalog_repo(&*conn);
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);
            conn.transaction::<Enrollment, FailureError, _>(move || {
                let course = catalog_repo
                    .get_course(course_id)?
                    .ok_or_else(|| format_err!("Course {} not found", course_id).context(Error::NotFound))?;
                if !course.is_free() {
                    return Err(format_err!("Course {} costs {}", course_id, course.price)
                        .context(Error::RuleViolation("course is not free".to_string()))
                        .into());
                }

                enroll(&*enrollments_repo, identity.user_id, course_id, EnrollmentSource::Free, None)
            }).map_err(|e: FailureError| e.context("Service Enrollments, enroll_free endpoint error occurred.").into())
        })
    }

    fn get_enrollment(&self, course_id: CourseId) -> ServiceFuture<Enrollment> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);

            enrollments_repo
                .get_by_user_course(identity.user_id, course_id)
                .and_then(|enrollment| enrollment.ok_or_else(|| not_found(identity.user_id, course_id)))
                .map_err(|e: FailureError| e.context("Service Enrollments, get_enrollment endpoint error occurred.").into())
        })
    }

    fn list_enrollments(&self) -> ServiceFuture<Vec<Enrollment>> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);

            enrollments_repo
                .list_by_user(identity.user_id)
                .map_err(|e| e.context("Service Enrollments, list_enrollments endpoint error occurred.").into())
        })
    }

    fn cancel_enrollment(&self, enrollment_id: EnrollmentId) -> ServiceFuture<Enrollment> {
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = self.require_admin() {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);
            conn.transaction::<Enrollment, FailureError, _>(move || {
                let enrollment = enrollments_repo
                    .get(enrollment_id)?
                    .ok_or_else(|| format_err!("Enrollment {} not found", enrollment_id).context(Error::NotFound))?;
                if enrollment.status == EnrollmentStatus::Cancelled {
                    return Ok(enrollment);
                }

                let cancelled = enrollments_repo.set_status(enrollment.id, EnrollmentStatus::Cancelled)?;
                info!("Enrollment {} of user {} cancelled.", cancelled.id, cancelled.user_id);
                Ok(cancelled)
            }).map_err(|e: FailureError| e.context("Service Enrollments, cancel_enrollment endpoint error occurred.").into())
        })
    }

    fn reset_progress(&self, enrollment_id: EnrollmentId) -> ServiceFuture<Enrollment> {
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = self.require_admin() {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);
            let lesson_progress_repo = repo_factory.create_lesson_progress_repo(&*conn);
            conn.transaction::<Enrollment, FailureError, _>(move || {
                let enrollment = enrollments_repo
                    .get(enrollment_id)?
                    .ok_or_else(|| format_err!("Enrollment {} not found", enrollment_id).context(Error::NotFound))?;
                let enrollment = enrollments_repo
                    .get_for_update(enrollment.user_id, enrollment.course_id)?
                    .ok_or_else(|| not_found(enrollment.user_id, enrollment.course_id))?;

                let status = match enrollment.status {
                    EnrollmentStatus::Completed => EnrollmentStatus::Active,
                    other => other,
                };
                lesson_progress_repo.reset_completion(enrollment.user_id, enrollment.course_id)?;
                let reset = enrollments_repo.update_progress(
                    enrollment.id,
                    EnrollmentProgress {
                        completed_lessons: vec![],
                        progress: 0,
                        status,
                    },
                )?;
                info!("Progress of enrollment {} reset from {}.", reset.id, enrollment.progress);
                Ok(reset)
            }).map_err(|e: FailureError| e.context("Service Enrollments, reset_progress endpoint error occurred.").into())
        })
    }

    fn pause_enrollment(&self, course_id: CourseId) -> ServiceFuture<Enrollment> {
        self.switch_status(course_id, EnrollmentStatus::Active, EnrollmentStatus::Paused, "enrollment is not active")
    }

    fn resume_enrollment(&self, course_id: CourseId) -> ServiceFuture<Enrollment> {
        self.switch_status(course_id, EnrollmentStatus::Paused, EnrollmentStatus::Active, "enrollment is not paused")
    }
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Service<M, F>
{
    /// Owner driven `from -> to` transition. Resuming a finished course lands in completed.
    fn switch_status(
        &self,
        course_id: CourseId,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
        refusal: &'static str,
    ) -> ServiceFuture<Enrollment> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);
            conn.transaction::<Enrollment, FailureError, _>(move || {
                let enrollment = enrollments_repo
                    .get_for_update(identity.user_id, course_id)?
                    .ok_or_else(|| not_found(identity.user_id, course_id))?;
                if enrollment.status != from {
                    return Err(format_err!("Enrollment {} is {}", enrollment.id, enrollment.status)
                        .context(Error::RuleViolation(refusal.to_string()))
                        .into());
                }

                let to = if to == EnrollmentStatus::Active && enrollment.progress >= 100 {
                    EnrollmentStatus::Completed
                } else {
                    to
                };
                let updated = enrollments_repo.set_status(enrollment.id, to)?;
                info!("Enrollment {} of user {} is {} now.", updated.id, updated.user_id, updated.status);
                Ok(updated)
            }).map_err(|e: FailureError| e.context("Service Enrollments, switch_status endpoint error occurred.").into())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use futures::Future;
    use tokio_core::reactor::Core;

    use super::*;
    use errors::find_kind;
    use repos::repo_factory::tests::*;

    #[test]
    fn test_free_enrollment_creates_no_order() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());

        let enrollment = core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();

        assert_eq!(enrollment.progress, 0);
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        assert_eq!(enrollment.source, EnrollmentSource::Free);
        assert_eq!(enrollment.order_id, None);
        assert!(factory.db.lock().unwrap().orders.is_empty());
    }

    #[test]
    fn test_free_enrollment_of_paid_course_is_refused() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());

        let err = core.run(service.enroll_free(MOCK_PAID_COURSE_ID)).unwrap_err();

        match find_kind(&err) {
            Some(Error::RuleViolation(reason)) => assert_eq!(reason, "course is not free"),
            other => panic!("unexpected error kind {:?}", other),
        }
        assert!(factory.db.lock().unwrap().enrollments.is_empty());
    }

    #[test]
    fn test_unverified_user_cannot_enroll() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let identity = Some(Identity::new(MOCK_USER_ID, false, Role::User));
        let service = create_service(identity, factory, PaymentProviderMock::default());

        let err = core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap_err();

        match find_kind(&err) {
            Some(Error::Forbidden(_)) => {}
            other => panic!("unexpected error kind {:?}", other),
        }
    }

    #[test]
    fn test_repeated_enroll_returns_same_record() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());

        let first = core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();
        let second = core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(factory.db.lock().unwrap().enrollments.len(), 1);
    }

    #[test]
    fn test_concurrent_enroll_keeps_one_row() {
        let factory = ReposFactoryMock::with_catalog();

        let handles = (0..8)
            .map(|_| {
                let factory = factory.clone();
                thread::spawn(move || {
                    let mut core = Core::new().unwrap();
                    let service = create_service(learner(MOCK_USER_ID), factory, PaymentProviderMock::default());
                    core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap().id
                })
            }).collect::<Vec<_>>();
        let ids = handles.into_iter().map(|handle| handle.join().unwrap()).collect::<Vec<_>>();

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(factory.db.lock().unwrap().enrollments.len(), 1);
    }

    #[test]
    fn test_cancelled_enrollment_is_reactivated_with_progress() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());
        let admin_service = create_service(admin(), factory.clone(), PaymentProviderMock::default());

        let enrollment = core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();
        factory.db.lock().unwrap().enrollments[0].progress = 50;
        let cancelled = core.run(admin_service.cancel_enrollment(enrollment.id)).unwrap();
        assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);

        let reactivated = core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();

        assert_eq!(reactivated.id, enrollment.id);
        assert_eq!(reactivated.status, EnrollmentStatus::Active);
        assert_eq!(reactivated.progress, 50);
        assert_eq!(factory.db.lock().unwrap().enrollments.len(), 1);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory, PaymentProviderMock::default());

        core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();
        let paused = core.run(service.pause_enrollment(MOCK_FREE_COURSE_ID)).unwrap();
        assert_eq!(paused.status, EnrollmentStatus::Paused);

        let err = core.run(service.pause_enrollment(MOCK_FREE_COURSE_ID)).unwrap_err();
        match find_kind(&err) {
            Some(Error::RuleViolation(reason)) => assert_eq!(reason, "enrollment is not active"),
            other => panic!("unexpected error kind {:?}", other),
        }

        let resumed = core.run(service.resume_enrollment(MOCK_FREE_COURSE_ID)).unwrap();
        assert_eq!(resumed.status, EnrollmentStatus::Active);
    }

    #[test]
    fn test_cancel_requires_admin() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory, PaymentProviderMock::default());

        let enrollment = core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();
        let result = core.run(service.cancel_enrollment(enrollment.id).map(|_| ()));

        assert!(result.is_err());
    }
}
