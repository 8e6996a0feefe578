pub mod coupon_usages;
pub mod coupons;
pub mod scope_categories;
pub mod scope_courses;

pub use self::coupon_usages::*;
pub use self::coupons::*;
pub use self::scope_categories::*;
pub use self::scope_courses::*;
