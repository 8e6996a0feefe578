//! Model coupons
use std::time::SystemTime;

use validator::Validate;

use diesel::sql_types::Text;

use types::{CouponCode, CouponId, CourseId};

use models::validation_rules::*;

use schema::coupons;

/// DB presenting by coupon
#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct Coupon {
    pub id: CouponId,
    pub code: CouponCode,
    pub title: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub max_discount: Option<i64>,
    pub min_order_value: i64,
    pub scope: CouponScope,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub per_user_limit: i32,
    pub is_active: bool,
    pub valid_from: SystemTime,
    pub valid_until: SystemTime,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Coupon {
    pub const MIN_GENERATE_LENGTH_CODE: usize = 8;

    /// Active and `now` inside `[valid_from, valid_until)`
    pub fn is_currently_valid(&self, now: SystemTime) -> bool {
        self.is_active && self.valid_from <= now && now < self.valid_until
    }

    pub fn has_uses_left(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.used_count < limit,
            None => true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, FromSqlRow, AsExpression)]
#[sql_type = "Text"]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

text_enum_sql!(DiscountType {
    Percentage => "percentage",
    Fixed => "fixed",
});

/// Which kind of scope rows belong to a coupon
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, FromSqlRow, AsExpression)]
#[sql_type = "Text"]
#[serde(rename_all = "snake_case")]
pub enum CouponScope {
    All,
    Courses,
    Categories,
}

text_enum_sql!(CouponScope {
    All => "all",
    Courses => "courses",
    Categories => "categories",
});

/// Courses a coupon can be redeemed for
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Applicability {
    All,
    Courses { course_ids: Vec<CourseId> },
    Categories { categories: Vec<String> },
}

impl Applicability {
    pub fn scope(&self) -> CouponScope {
        match *self {
            Applicability::All => CouponScope::All,
            Applicability::Courses { .. } => CouponScope::Courses,
            Applicability::Categories { .. } => CouponScope::Categories,
        }
    }

    pub fn covers(&self, course_id: CourseId, category: &str) -> bool {
        match *self {
            Applicability::All => true,
            Applicability::Courses { ref course_ids } => course_ids.contains(&course_id),
            Applicability::Categories { ref categories } => categories.iter().any(|c| c.eq_ignore_ascii_case(category)),
        }
    }
}

/// Coupon together with its scope
#[derive(Serialize, Debug, Clone)]
pub struct CouponWithScope {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub applicability: Applicability,
}

/// Payload for creating coupon
#[derive(Serialize, Deserialize, Clone, Validate, Debug)]
#[validate(schema(function = "validate_coupon_terms"))]
pub struct CreateCouponPayload {
    #[validate(custom = "validate_coupon_code")]
    pub code: Option<String>,
    #[validate(length(min = "1", max = "128"))]
    pub title: String,
    pub discount_type: DiscountType,
    #[validate(range(min = "1.0", max = "1000000000000.0"))]
    pub value: i64,
    pub max_discount: Option<i64>,
    #[serde(default)]
    #[validate(range(min = "0.0", max = "1000000000000.0"))]
    pub min_order_value: i64,
    pub applicability: Applicability,
    pub usage_limit: Option<i32>,
    #[serde(default = "default_per_user_limit")]
    #[validate(range(min = "1.0", max = "1000000.0"))]
    pub per_user_limit: i32,
    pub valid_from: SystemTime,
    pub valid_until: SystemTime,
}

fn default_per_user_limit() -> i32 {
    1
}

/// Insertable part of `CreateCouponPayload`, scope rows are stored separately
#[derive(Serialize, Deserialize, Insertable, Clone, Debug)]
#[table_name = "coupons"]
pub struct NewCoupon {
    pub code: CouponCode,
    pub title: String,
    pub discount_type: DiscountType,
    pub value: i64,
    pub max_discount: Option<i64>,
    pub min_order_value: i64,
    pub scope: CouponScope,
    pub usage_limit: Option<i32>,
    pub per_user_limit: i32,
    pub valid_from: SystemTime,
    pub valid_until: SystemTime,
}

impl NewCoupon {
    pub fn new(code: CouponCode, payload: &CreateCouponPayload) -> Self {
        Self {
            code: code.normalized(),
            title: payload.title.clone(),
            discount_type: payload.discount_type,
            value: payload.value,
            max_discount: payload.max_discount,
            min_order_value: payload.min_order_value,
            scope: payload.applicability.scope(),
            usage_limit: payload.usage_limit,
            per_user_limit: payload.per_user_limit,
            valid_from: payload.valid_from,
            valid_until: payload.valid_until,
        }
    }
}

/// Request to check a code against a course before checkout
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ValidateCouponPayload {
    pub code: CouponCode,
    pub course_id: CourseId,
}

/// Outcome of the coupon engine. `reason` is shown to the learner as is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum CouponValidation {
    Valid {
        valid: bool,
        coupon_id: CouponId,
        discount: i64,
        final_amount: i64,
    },
    Invalid {
        valid: bool,
        reason: CouponRejection,
    },
}

impl CouponValidation {
    pub fn valid(coupon_id: CouponId, discount: i64, final_amount: i64) -> Self {
        CouponValidation::Valid {
            valid: true,
            coupon_id,
            discount,
            final_amount,
        }
    }

    pub fn invalid(reason: CouponRejection) -> Self {
        CouponValidation::Invalid { valid: false, reason }
    }
}

/// Reasons a coupon is refused, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponRejection {
    InvalidOrExpired,
    UsageLimitReached,
    AlreadyUsed,
    NotApplicable,
    MinimumOrderNotMet,
}

impl CouponRejection {
    pub fn reason(&self) -> &'static str {
        match *self {
            CouponRejection::InvalidOrExpired => "invalid or expired code",
            CouponRejection::UsageLimitReached => "usage limit reached",
            CouponRejection::AlreadyUsed => "already used",
            CouponRejection::NotApplicable => "not applicable",
            CouponRejection::MinimumOrderNotMet => "minimum order value not met",
        }
    }
}

impl ::std::fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        f.write_str(self.reason())
    }
}

impl ::serde::Serialize for CouponRejection {
    fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.reason())
    }
}

impl<'de> ::serde::Deserialize<'de> for CouponRejection {
    fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let reason = String::deserialize(deserializer)?;
        match reason.as_str() {
            "invalid or expired code" => Ok(CouponRejection::InvalidOrExpired),
            "usage limit reached" => Ok(CouponRejection::UsageLimitReached),
            "already used" => Ok(CouponRejection::AlreadyUsed),
            "not applicable" => Ok(CouponRejection::NotApplicable),
            "minimum order value not met" => Ok(CouponRejection::MinimumOrderNotMet),
            other => Err(::serde::de::Error::custom(format!("unknown coupon rejection: {}", other))),
        }
    }
}
