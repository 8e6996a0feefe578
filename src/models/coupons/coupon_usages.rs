//! Model coupon_usages, one row per redemption

use std::time::SystemTime;

use types::{CouponId, CourseId, OrderId, UserId};

use schema::coupon_usages;

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct CouponUsage {
    pub id: i32,
    pub coupon_id: CouponId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub course_id: CourseId,
    pub discount_amount: i64,
    pub original_amount: i64,
    pub final_amount: i64,
    pub created_at: SystemTime,
}

#[derive(Serialize, Deserialize, Insertable, Clone, Debug)]
#[table_name = "coupon_usages"]
pub struct NewCouponUsage {
    pub coupon_id: CouponId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub course_id: CourseId,
    pub discount_amount: i64,
    pub original_amount: i64,
    pub final_amount: i64,
}
