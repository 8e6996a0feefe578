//! Models contains all structures that are used in different
//! modules of the app

pub mod catalog;
pub mod certificates;
pub mod coupons;
pub mod enrollments;
pub mod identity;
pub mod lesson_progress;
pub mod orders;
pub mod validation_rules;

pub use self::catalog::*;
pub use self::certificates::*;
pub use self::coupons::*;
pub use self::enrollments::*;
pub use self::identity::*;
pub use self::lesson_progress::*;
pub use self::orders::*;
pub use self::validation_rules::*;
