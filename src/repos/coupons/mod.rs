pub mod coupon_scopes;
pub mod coupon_usages;
pub mod coupons;

pub use self::coupon_scopes::*;
pub use self::coupon_usages::*;
pub use self::coupons::*;
