//! Certificate authority. A certificate is issued once per (user, course) and can only be revoked.

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use r2d2::ManageConnection;
use validator::Validate;

use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::{CertificatesRepo, EnrollmentsRepo, LessonProgressRepo, RepoResult, ReposFactory};
use services::Service;
use types::CertificateCode;

pub trait CertificatesService {
    /// Issues certificate for a completed enrollment, returns the existing one if already issued
    fn issue_certificate(&self, payload: IssueCertificatePayload) -> ServiceFuture<Certificate>;
    /// Revokes certificate
    fn revoke_certificate(&self, code: CertificateCode, payload: RevokeCertificatePayload) -> ServiceFuture<Certificate>;
    /// Public verification of a certificate id
    fn verify_certificate(&self, code: CertificateCode) -> ServiceFuture<CertificateVerification>;
    /// Certificates of the caller
    fn list_certificates(&self) -> ServiceFuture<Vec<Certificate>>;
}

/// Rounded mean of the recorded quiz scores, `None` without quizzes
pub fn average_score(scores: &[i32]) -> Option<i32> {
    if scores.is_empty() {
        return None;
    }
    let total: i64 = scores.iter().map(|score| i64::from(*score)).sum();
    let count = scores.len() as i64;
    Some(((total * 2 + count) / (count * 2)) as i32)
}

/// Issues the certificate of a completed enrollment inside the caller's transaction
pub fn issue(
    enrollments_repo: &EnrollmentsRepo,
    lesson_progress_repo: &LessonProgressRepo,
    certificates_repo: &CertificatesRepo,
    enrollment: &Enrollment,
) -> RepoResult<Certificate> {
    let scores = lesson_progress_repo
        .list_by_user_course(enrollment.user_id, enrollment.course_id)?
        .into_iter()
        .filter_map(|lesson| lesson.quiz_score)
        .collect::<Vec<_>>();
    let payload = NewCertificate::new(enrollment.user_id, enrollment.course_id, enrollment.progress, average_score(&scores));

    let certificate = match certificates_repo.create_if_absent(payload)? {
        Some(certificate) => {
            info!(
                "Certificate {} issued to user {} for course {}.",
                certificate.certificate_id, certificate.user_id, certificate.course_id
            );
            certificate
        }
        None => {
            debug!("Certificate of user {} for course {} already issued.", enrollment.user_id, enrollment.course_id);
            certificates_repo
                .get_by_user_course(enrollment.user_id, enrollment.course_id)?
                .ok_or_else(|| format_err!("Certificate of user {} for course {} vanished", enrollment.user_id, enrollment.course_id))?
        }
    };

    if !enrollment.certificate_issued {
        enrollments_repo.mark_certificate_issued(enrollment.id)?;
    }
    Ok(certificate)
}

fn certificate_not_found(code: &CertificateCode) -> FailureError {
    format_err!("Certificate {} not found", code).context(Error::NotFound).into()
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > CertificatesService for Service<M, F>
{
    fn issue_certificate(&self, payload: IssueCertificatePayload) -> ServiceFuture<Certificate> {
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = self.require_admin() {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);
            let lesson_progress_repo = repo_factory.create_lesson_progress_repo(&*conn);
            let certificates_repo = repo_factory.create_certificates_repo(&*conn);
            conn.transaction::<Certificate, FailureError, _>(move || {
                let enrollment = enrollments_repo
                    .get_for_update(payload.user_id, payload.course_id)?
                    .ok_or_else(|| {
                        format_err!("User {} is not enrolled in course {}", payload.user_id, payload.course_id).context(Error::NotFound)
                    })?;
                if enrollment.progress < 100 {
                    return Err(format_err!("Enrollment {} is at {}%", enrollment.id, enrollment.progress)
                        .context(Error::RuleViolation("course is not completed".to_string()))
                        .into());
                }

                issue(&*enrollments_repo, &*lesson_progress_repo, &*certificates_repo, &enrollment)
            }).map_err(|e: FailureError| e.context("Service Certificates, issue endpoint error occurred.").into())
        })
    }

    fn revoke_certificate(&self, code: CertificateCode, payload: RevokeCertificatePayload) -> ServiceFuture<Certificate> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_admin() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };
        if let Err(errors) = payload.validate() {
            return Box::new(future::err(
                format_err!("Invalid revocation payload").context(Error::Validate(errors)).into(),
            ));
        }

        self.spawn_on_pool(move |conn| {
            let certificates_repo = repo_factory.create_certificates_repo(&*conn);
            conn.transaction::<Certificate, FailureError, _>(move || {
                if let Some(revoked) = certificates_repo.revoke(code.clone(), identity.user_id, payload.reason)? {
                    info!("Certificate {} revoked by {}.", revoked.certificate_id, identity.user_id);
                    return Ok(revoked);
                }

                match certificates_repo.get_by_code(code.clone())? {
                    Some(_) => Err(format_err!("Certificate {} is revoked", code)
                        .context(Error::Conflict("already revoked".to_string()))
                        .into()),
                    None => Err(certificate_not_found(&code)),
                }
            }).map_err(|e: FailureError| e.context("Service Certificates, revoke endpoint error occurred.").into())
        })
    }

    fn verify_certificate(&self, code: CertificateCode) -> ServiceFuture<CertificateVerification> {
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let certificates_repo = repo_factory.create_certificates_repo(&*conn);
            let catalog_repo = repo_factory.create_catalog_repo(&*conn);

            let verification = || -> RepoResult<CertificateVerification> {
                let certificate = certificates_repo
                    .get_by_code(code.clone())?
                    .ok_or_else(|| certificate_not_found(&code))?;
                let (course_title, instructor_name) = match catalog_repo.get_course(certificate.course_id)? {
                    Some(course) => (course.title, course.instructor_name),
                    None => {
                        warn!("Course {} of certificate {} is missing from the catalog.", certificate.course_id, code);
                        (String::new(), String::new())
                    }
                };
                let user_name = catalog_repo
                    .get_user(certificate.user_id)?
                    .map(|user| user.name)
                    .unwrap_or_default();

                Ok(CertificateVerification {
                    certificate_id: certificate.certificate_id,
                    course_title,
                    user_name,
                    instructor_name,
                    issued_at: certificate.issued_at,
                    completion_percentage: certificate.completion_percentage,
                    final_score: certificate.final_score,
                    is_valid: certificate.is_valid,
                    revoked_at: certificate.revoked_at,
                    revocation_reason: certificate.revocation_reason,
                })
            };

            verification().map_err(|e: FailureError| e.context("Service Certificates, verify endpoint error occurred.").into())
        })
    }

    fn list_certificates(&self) -> ServiceFuture<Vec<Certificate>> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let certificates_repo = repo_factory.create_certificates_repo(&*conn);
            certificates_repo
                .list_by_user(identity.user_id)
                .map_err(|e| e.context("Service Certificates, list endpoint error occurred.").into())
        })
    }
}
