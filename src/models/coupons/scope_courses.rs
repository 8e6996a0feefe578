//! Model coupon_scope_courses table

use types::{CouponId, CourseId};

use schema::coupon_scope_courses;

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct CouponScopeCourse {
    pub id: i32,
    pub coupon_id: CouponId,
    pub course_id: CourseId,
}

/// Payload for creating coupon_scope_courses
#[derive(Serialize, Deserialize, Insertable, Clone, Debug)]
#[table_name = "coupon_scope_courses"]
pub struct NewCouponScopeCourse {
    pub coupon_id: CouponId,
    pub course_id: CourseId,
}
