//! Orders and payment verdicts
use std::time::SystemTime;

use diesel::sql_types::Text;

use types::{CouponCode, CouponId, CourseId, OrderId, UserId};

use schema::orders;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, FromSqlRow, AsExpression)]
#[sql_type = "Text"]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

text_enum_sql!(OrderStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        *self != OrderStatus::Pending
    }
}

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: OrderStatus,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub amount: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<CouponCode>,
    pub correlation_id: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub refund_required: bool,
    pub paid_at: Option<SystemTime>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

#[derive(Serialize, Deserialize, Insertable, Clone, Debug)]
#[table_name = "orders"]
pub struct NewOrder {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: OrderStatus,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub amount: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<CouponCode>,
}

/// Checkout request of a learner
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewOrderPayload {
    pub course_id: CourseId,
    pub coupon_code: Option<CouponCode>,
    pub payment_method: Option<String>,
}

/// Outcome reported by the payment provider
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentVerdict {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl PaymentVerdict {
    /// Verdict used for orders that have nothing to charge
    pub fn free_of_charge() -> Self {
        Self {
            success: true,
            transaction_id: None,
            correlation_id: None,
        }
    }
}

