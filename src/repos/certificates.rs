//! Certificates repo. Rows are never deleted, revocation only flips `is_valid`.
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
use schema::certificates::dsl as Certificates;
use types::{CertificateCode, CourseId, UserId};

/// Certificates repository
pub struct CertificatesRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait CertificatesRepo {
    /// Inserts the certificate unless the pair already has one. `None` means it existed.
    fn create_if_absent(&self, payload: NewCertificate) -> RepoResult<Option<Certificate>>;

    /// Certificate of the user for the course
    fn get_by_user_course(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Option<Certificate>>;

    /// Certificate by its public id
    fn get_by_code(&self, code_arg: CertificateCode) -> RepoResult<Option<Certificate>>;

    /// Certificates of the user
    fn list_by_user(&self, user_id_arg: UserId) -> RepoResult<Vec<Certificate>>;

    /// Revokes a valid certificate. `None` when it is not valid anymore.
    fn revoke(&self, code_arg: CertificateCode, revoked_by_arg: UserId, reason: Option<String>) -> RepoResult<Option<Certificate>>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CertificatesRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CertificatesRepo for CertificatesRepoImpl<'a, T> {
    fn create_if_absent(&self, payload: NewCertificate) -> RepoResult<Option<Certificate>> {
        debug!("Create certificate {:?}.", payload);
        let query = diesel::insert_into(Certificates::certificates)
            .values(&payload)
            .on_conflict_do_nothing();

        query
            .get_result::<Certificate>(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Create certificate: {:?} error occurred", payload)).into())
    }

    fn get_by_user_course(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Option<Certificate>> {
        debug!("Find certificate of user {} for course {}.", user_id_arg, course_id_arg);
        let query = Certificates::certificates
            .filter(Certificates::user_id.eq(user_id_arg))
            .filter(Certificates::course_id.eq(course_id_arg));

        query.get_result(self.db_conn).optional().map_err(From::from).map_err(|e: FailureError| {
            e.context(format!(
                "Find certificate of user: {} for course: {} error occurred",
                user_id_arg, course_id_arg
            )).into()
        })
    }

    fn get_by_code(&self, code_arg: CertificateCode) -> RepoResult<Option<Certificate>> {
        debug!("Find certificate {}.", code_arg);
        let query = Certificates::certificates.filter(Certificates::certificate_id.eq(&code_arg));

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Find certificate: {} error occurred", code_arg)).into())
    }

    fn list_by_user(&self, user_id_arg: UserId) -> RepoResult<Vec<Certificate>> {
        debug!("Find certificates of user {}.", user_id_arg);
        let query = Certificates::certificates
            .filter(Certificates::user_id.eq(user_id_arg))
            .order(Certificates::issued_at.desc());

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Find certificates of user: {} error occurred", user_id_arg)).into())
    }

    fn revoke(&self, code_arg: CertificateCode, revoked_by_arg: UserId, reason: Option<String>) -> RepoResult<Option<Certificate>> {
        debug!("Revoke certificate {} by {}.", code_arg, revoked_by_arg);
        let filtered = Certificates::certificates
            .filter(Certificates::certificate_id.eq(&code_arg))
            .filter(Certificates::is_valid.eq(true));
        let query = diesel::update(filtered).set((
            Certificates::is_valid.eq(false),
            Certificates::revoked_at.eq(Some(SystemTime::now())),
            Certificates::revoked_by.eq(Some(revoked_by_arg)),
            Certificates::revocation_reason.eq(reason),
        ));

        query
            .get_result::<Certificate>(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Revoke certificate: {} error occurred", code_arg)).into())
    }
}
