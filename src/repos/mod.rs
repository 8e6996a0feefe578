//! Repos is a module responsible for interacting with postgres db

pub mod catalog;
pub mod certificates;
pub mod coupons;
pub mod enrollments;
pub mod lesson_progress;
pub mod orders;
pub mod repo_factory;
pub mod types;

pub use self::catalog::*;
pub use self::certificates::*;
pub use self::coupons::*;
pub use self::enrollments::*;
pub use self::lesson_progress::*;
pub use self::orders::*;
pub use self::repo_factory::*;
pub use self::types::*;
