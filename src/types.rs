//! Identifier types shared by models, repos and services

use diesel::sql_types::{Integer, Text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "Integer"]
pub struct UserId(pub i32);
int_newtype_sql!(UserId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "Integer"]
pub struct CourseId(pub i32);
int_newtype_sql!(CourseId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "Integer"]
pub struct LessonId(pub i32);
int_newtype_sql!(LessonId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "Integer"]
pub struct CouponId(pub i32);
int_newtype_sql!(CouponId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "Integer"]
pub struct OrderId(pub i32);
int_newtype_sql!(OrderId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "Integer"]
pub struct EnrollmentId(pub i32);
int_newtype_sql!(EnrollmentId);

/// Coupon code as typed by the learner; compared upper-cased
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "Text"]
pub struct CouponCode(pub String);
text_newtype_sql!(CouponCode);

impl CouponCode {
    pub fn normalized(&self) -> CouponCode {
        CouponCode(self.0.trim().to_uppercase())
    }
}

impl From<String> for CouponCode {
    fn from(code: String) -> Self {
        CouponCode(code)
    }
}

/// Public certificate identifier, safe to print on the certificate itself
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromSqlRow, AsExpression)]
#[sql_type = "Text"]
pub struct CertificateCode(pub String);
text_newtype_sql!(CertificateCode);

impl From<String> for CertificateCode {
    fn from(code: String) -> Self {
        CertificateCode(code)
    }
}
