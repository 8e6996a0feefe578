//! Certificates and their public verification view
use std::time::SystemTime;

use uuid::Uuid;
use validator::Validate;

use types::{CertificateCode, CourseId, UserId};

use schema::certificates;

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct Certificate {
    pub id: i32,
    pub certificate_id: CertificateCode,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub issued_at: SystemTime,
    pub completion_percentage: i32,
    pub final_score: Option<i32>,
    pub is_valid: bool,
    pub revoked_at: Option<SystemTime>,
    pub revoked_by: Option<UserId>,
    pub revocation_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Insertable, Clone, Debug)]
#[table_name = "certificates"]
pub struct NewCertificate {
    pub certificate_id: CertificateCode,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub completion_percentage: i32,
    pub final_score: Option<i32>,
}

impl NewCertificate {
    pub fn new(user_id: UserId, course_id: CourseId, completion_percentage: i32, final_score: Option<i32>) -> Self {
        Self {
            certificate_id: generate_certificate_code(),
            user_id,
            course_id,
            completion_percentage,
            final_score,
        }
    }
}

/// 128 random bits, never derived from user or course
pub fn generate_certificate_code() -> CertificateCode {
    CertificateCode(format!("CERT-{}", Uuid::new_v4().simple().to_string().to_uppercase()))
}

/// Public answer for a certificate id, returned for revoked certificates too
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CertificateVerification {
    pub certificate_id: CertificateCode,
    pub course_title: String,
    pub user_name: String,
    pub instructor_name: String,
    pub issued_at: SystemTime,
    pub completion_percentage: i32,
    pub final_score: Option<i32>,
    pub is_valid: bool,
    pub revoked_at: Option<SystemTime>,
    pub revocation_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Validate, Clone, Debug, Default)]
pub struct RevokeCertificatePayload {
    #[validate(length(min = "1", max = "512"))]
    pub reason: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IssueCertificatePayload {
    pub user_id: UserId,
    pub course_id: CourseId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_codes_are_distinct() {
        let first = generate_certificate_code();
        let second = generate_certificate_code();

        assert_ne!(first, second);
        assert!(first.0.starts_with("CERT-"));
        assert_eq!(first.0.len(), "CERT-".len() + 32);
    }
}
