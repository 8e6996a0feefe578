//! Progress aggregator. Lesson rows roll up into the enrollment percentage, which never
//! goes down outside of an administrator reset.

use std::time::SystemTime;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use r2d2::ManageConnection;
use validator::Validate;

use super::certificates::issue;
use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::ReposFactory;
use services::Service;
use types::{CourseId, LessonId, UserId};

pub trait ProgressService {
    /// Records what the learner did in a lesson and recomputes the course progress
    fn record_lesson_progress(&self, lesson_id: LessonId, delta: ProgressDelta) -> ServiceFuture<LessonProgressReport>;
    /// Lesson rows of the caller for the course
    fn list_lesson_progress(&self, course_id: CourseId) -> ServiceFuture<Vec<LessonProgress>>;
}

/// `floor(100 * completed / total)` clamped to `[0, 100]`, zero for a course without lessons
pub fn compute_progress(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    let percent = (completed.min(total) * 100) / total;
    percent as i32
}

/// New values of the lesson row. Watched time only grows, completion is sticky
/// and the best quiz score is kept.
pub fn merge_lesson_progress(
    existing: Option<&LessonProgress>,
    user_id: UserId,
    lesson: &Lesson,
    delta: &ProgressDelta,
    now: SystemTime,
) -> LessonProgressValues {
    let watched_duration = existing
        .map(|row| row.watched_duration)
        .unwrap_or(0)
        .max(delta.watched_duration.unwrap_or(0))
        .max(0);
    let was_completed = existing.map_or(false, |row| row.is_completed);
    let watched_through = lesson.duration > 0 && watched_duration >= lesson.duration;
    let is_completed = was_completed || delta.completed == Some(true) || watched_through;
    let completed_at = match existing.and_then(|row| row.completed_at) {
        Some(at) if was_completed => Some(at),
        _ if is_completed => Some(now),
        _ => None,
    };
    let quiz_score = match (existing.and_then(|row| row.quiz_score), delta.quiz_score) {
        (Some(best), Some(score)) => Some(best.max(score)),
        (best, score) => best.or(score),
    };
    let quiz_attempts = existing.map_or(0, |row| row.quiz_attempts) + if delta.quiz_score.is_some() { 1 } else { 0 };

    LessonProgressValues {
        user_id,
        course_id: lesson.course_id,
        lesson_id: lesson.id,
        is_completed,
        watched_duration,
        total_duration: lesson.duration,
        quiz_score,
        quiz_attempts,
        completed_at,
    }
}

/// Completed lessons of the enrollment that still belong to the course, sorted
pub fn completed_course_lessons(completed: &[i32], lessons: &[Lesson]) -> Vec<i32> {
    let mut ids = lessons
        .iter()
        .map(|lesson| lesson.id.0)
        .filter(|id| completed.contains(id))
        .collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    ids
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > ProgressService for Service<M, F>
{
    fn record_lesson_progress(&self, lesson_id: LessonId, delta: ProgressDelta) -> ServiceFuture<LessonProgressReport> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };
        if let Err(errors) = delta.validate() {
            return Box::new(future::err(
                format_err!("Invalid lesson progress").context(Error::Validate(errors)).into(),
            ));
        }

        self.spawn_on_pool(move |conn| {
            let catalog_repo = repo_factory.create_catalog_repo(&*conn);
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);
            let lesson_progress_repo = repo_factory.create_lesson_progress_repo(&*conn);
            let certificates_repo = repo_factory.create_certificates_repo(&*conn);
            conn.transaction::<LessonProgressReport, FailureError, _>(move || {
                let lesson = catalog_repo
                    .get_lesson(lesson_id)?
                    .ok_or_else(|| format_err!("Lesson {} not found", lesson_id).context(Error::NotFound))?;
                let enrollment = enrollments_repo
                    .get_for_update(identity.user_id, lesson.course_id)?
                    .ok_or_else(|| {
                        format_err!("User {} is not enrolled in course {}", identity.user_id, lesson.course_id).context(Error::NotFound)
                    })?;
                if !enrollment.status.accepts_progress() {
                    return Err(format_err!("Enrollment {} is {}", enrollment.id, enrollment.status)
                        .context(Error::RuleViolation("enrollment is not active".to_string()))
                        .into());
                }

                let existing = lesson_progress_repo.get(identity.user_id, lesson.id)?;
                let values = merge_lesson_progress(existing.as_ref(), identity.user_id, &lesson, &delta, SystemTime::now());
                let lesson_row = lesson_progress_repo.upsert(values)?;

                let mut completed = enrollment.completed_lessons.clone();
                if lesson_row.is_completed {
                    completed.push(lesson.id.0);
                }
                let lessons = catalog_repo.list_lessons(lesson.course_id)?;
                let completed_lessons = completed_course_lessons(&completed, &lessons);
                let computed = compute_progress(completed_lessons.len(), lessons.len());
                let progress = computed.max(enrollment.progress);
                let crossed = enrollment.progress < 100 && progress == 100;
                let status = if progress == 100 {
                    EnrollmentStatus::Completed
                } else {
                    enrollment.status
                };

                let updated = enrollments_repo.update_progress(
                    enrollment.id,
                    EnrollmentProgress {
                        completed_lessons,
                        progress,
                        status,
                    },
                )?;
                if progress != enrollment.progress {
                    info!(
                        "Progress of user {} in course {} moved from {} to {}.",
                        identity.user_id, lesson.course_id, enrollment.progress, progress
                    );
                }

                let (enrollment, certificate) = if crossed {
                    let certificate = issue(&*enrollments_repo, &*lesson_progress_repo, &*certificates_repo, &updated)?;
                    let enrollment = enrollments_repo.get(updated.id)?.unwrap_or(updated);
                    (enrollment, Some(certificate))
                } else {
                    (updated, None)
                };

                Ok(LessonProgressReport {
                    lesson: lesson_row,
                    enrollment,
                    certificate,
                })
            }).map_err(|e: FailureError| e.context("Service Progress, record_lesson_progress endpoint error occurred.").into())
        })
    }

    fn list_lesson_progress(&self, course_id: CourseId) -> ServiceFuture<Vec<LessonProgress>> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let lesson_progress_repo = repo_factory.create_lesson_progress_repo(&*conn);
            lesson_progress_repo
                .list_by_user_course(identity.user_id, course_id)
                .map_err(|e| e.context("Service Progress, list_lesson_progress endpoint error occurred.").into())
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio_core::reactor::Core;

    use super::*;
    use errors::find_kind;
    use repos::repo_factory::tests::*;
    use services::enrollments::EnrollmentsService;
    use services::orders::OrdersService;

    fn completed(completed: bool) -> ProgressDelta {
        ProgressDelta {
            completed: Some(completed),
            ..ProgressDelta::default()
        }
    }

    fn watched(seconds: i32) -> ProgressDelta {
        ProgressDelta {
            watched_duration: Some(seconds),
            ..ProgressDelta::default()
        }
    }

    fn buy_paid_course(core: &mut Core, factory: &ReposFactoryMock) {
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());
        let order = core
            .run(service.create_order(NewOrderPayload {
                course_id: MOCK_PAID_COURSE_ID,
                coupon_code: None,
                payment_method: None,
            })).unwrap();
        let verdict = PaymentVerdict {
            success: true,
            transaction_id: Some("tx-1".to_string()),
            correlation_id: order.correlation_id.clone(),
        };
        core.run(service.finalize_order(order.id, verdict)).unwrap();
    }

    #[test]
    fn test_compute_progress() {
        assert_eq!(compute_progress(0, 0), 0);
        assert_eq!(compute_progress(0, 3), 0);
        assert_eq!(compute_progress(1, 3), 33);
        assert_eq!(compute_progress(2, 3), 66);
        assert_eq!(compute_progress(3, 3), 100);
        assert_eq!(compute_progress(5, 3), 100);
    }

    #[test]
    fn test_merge_keeps_maximum_and_sticky_completion() {
        let lesson = create_lesson(LessonId(1), MOCK_FREE_COURSE_ID, 1);
        let now = SystemTime::now();

        let first = merge_lesson_progress(None, MOCK_USER_ID, &lesson, &watched(300), now);
        assert_eq!(first.watched_duration, 300);
        assert!(!first.is_completed);

        let row = LessonProgress {
            id: 1,
            user_id: MOCK_USER_ID,
            course_id: lesson.course_id,
            lesson_id: lesson.id,
            is_completed: true,
            watched_duration: 300,
            total_duration: 600,
            quiz_score: Some(90),
            quiz_attempts: 1,
            completed_at: Some(now),
            updated_at: now,
        };
        let delta = ProgressDelta {
            watched_duration: Some(100),
            completed: Some(false),
            quiz_score: Some(40),
        };
        let second = merge_lesson_progress(Some(&row), MOCK_USER_ID, &lesson, &delta, now);

        assert_eq!(second.watched_duration, 300);
        assert!(second.is_completed);
        assert_eq!(second.quiz_score, Some(90));
        assert_eq!(second.quiz_attempts, 2);
        assert_eq!(second.completed_at, Some(now));
    }

    #[test]
    fn test_watching_whole_lesson_completes_it() {
        let lesson = create_lesson(LessonId(1), MOCK_FREE_COURSE_ID, 1);

        let values = merge_lesson_progress(None, MOCK_USER_ID, &lesson, &watched(600), SystemTime::now());

        assert!(values.is_completed);
        assert!(values.completed_at.is_some());
    }

    #[test]
    fn test_last_lesson_issues_certificate_once() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        buy_paid_course(&mut core, &factory);
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());

        for lesson in 11..20 {
            let report = core.run(service.record_lesson_progress(LessonId(lesson), completed(true))).unwrap();
            assert!(report.certificate.is_none());
        }
        let enrollment = core.run(service.get_enrollment(MOCK_PAID_COURSE_ID)).unwrap();
        assert_eq!(enrollment.progress, 90);

        let report = core.run(service.record_lesson_progress(LessonId(20), completed(true))).unwrap();
        assert_eq!(report.enrollment.progress, 100);
        assert_eq!(report.enrollment.status, EnrollmentStatus::Completed);
        assert!(report.enrollment.certificate_issued);
        let certificate = report.certificate.unwrap();
        assert_eq!(certificate.completion_percentage, 100);

        let report = core.run(service.record_lesson_progress(LessonId(20), completed(true))).unwrap();
        assert!(report.certificate.is_none());
        assert_eq!(report.enrollment.progress, 100);
        assert_eq!(factory.db.lock().unwrap().certificates.len(), 1);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());
        core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();

        let report = core.run(service.record_lesson_progress(LessonId(1), completed(true))).unwrap();
        assert_eq!(report.enrollment.progress, 50);

        factory
            .db
            .lock()
            .unwrap()
            .lessons
            .extend((3..6).map(|n| create_lesson(LessonId(n), MOCK_FREE_COURSE_ID, n)));
        let report = core.run(service.record_lesson_progress(LessonId(2), watched(60))).unwrap();

        assert_eq!(report.enrollment.progress, 50);
        assert_eq!(report.lesson.watched_duration, 60);
    }

    #[test]
    fn test_quiz_scores_make_final_score() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());
        core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();

        let quiz = |score| ProgressDelta {
            completed: Some(true),
            quiz_score: Some(score),
            ..ProgressDelta::default()
        };
        core.run(service.record_lesson_progress(LessonId(1), quiz(80))).unwrap();
        let report = core.run(service.record_lesson_progress(LessonId(2), quiz(91))).unwrap();

        assert_eq!(report.certificate.unwrap().final_score, Some(86));
    }

    #[test]
    fn test_paused_enrollment_rejects_progress() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());
        core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();
        core.run(service.pause_enrollment(MOCK_FREE_COURSE_ID)).unwrap();

        let err = core.run(service.record_lesson_progress(LessonId(1), completed(true))).unwrap_err();

        match find_kind(&err) {
            Some(Error::RuleViolation(reason)) => assert_eq!(reason, "enrollment is not active"),
            other => panic!("unexpected error kind {:?}", other),
        }
        assert!(factory.db.lock().unwrap().lesson_progress.is_empty());
    }

    #[test]
    fn test_progress_without_enrollment() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory, PaymentProviderMock::default());

        let err = core.run(service.record_lesson_progress(LessonId(11), watched(10))).unwrap_err();

        assert!(match find_kind(&err) {
            Some(Error::NotFound) => true,
            _ => false,
        });
    }

    #[test]
    fn test_reset_then_complete_again_keeps_single_certificate() {
        let mut core = Core::new().unwrap();
        let factory = ReposFactoryMock::with_catalog();
        let service = create_service(learner(MOCK_USER_ID), factory.clone(), PaymentProviderMock::default());
        let administrator = create_service(admin(), factory.clone(), PaymentProviderMock::default());
        let enrollment = core.run(service.enroll_free(MOCK_FREE_COURSE_ID)).unwrap();

        core.run(service.record_lesson_progress(LessonId(1), completed(true))).unwrap();
        let first = core.run(service.record_lesson_progress(LessonId(2), completed(true))).unwrap();

        let reset = core.run(administrator.reset_progress(enrollment.id)).unwrap();
        assert_eq!(reset.progress, 0);
        assert_eq!(reset.status, EnrollmentStatus::Active);
        assert!(reset.completed_lessons.is_empty());

        core.run(service.record_lesson_progress(LessonId(1), completed(true))).unwrap();
        let again = core.run(service.record_lesson_progress(LessonId(2), completed(true))).unwrap();

        assert_eq!(
            again.certificate.map(|c| c.certificate_id),
            first.certificate.map(|c| c.certificate_id)
        );
        assert_eq!(factory.db.lock().unwrap().certificates.len(), 1);
    }
}
