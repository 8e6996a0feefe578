//! Model coupon_scope_categories table

use types::CouponId;

use schema::coupon_scope_categories;

#[derive(Debug, Serialize, Deserialize, Queryable, Clone)]
pub struct CouponScopeCategory {
    pub id: i32,
    pub coupon_id: CouponId,
    pub category: String,
}

/// Payload for creating coupon_scope_categories
#[derive(Serialize, Deserialize, Insertable, Clone, Debug)]
#[table_name = "coupon_scope_categories"]
pub struct NewCouponScopeCategory {
    pub coupon_id: CouponId,
    pub category: String,
}
