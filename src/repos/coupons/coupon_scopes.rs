use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;
use failure::Error as FailureError;

use models::*;
use repos::types::RepoResult;
use schema::coupon_scope_categories::dsl as ScopeCategories;
use schema::coupon_scope_courses::dsl as ScopeCourses;
use types::{CouponId, CourseId};

/// Scope rows of coupons, the courses or categories a coupon is limited to
pub struct CouponScopesRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait CouponScopesRepo {
    /// Stores the scope members of a freshly created coupon
    fn create(&self, coupon_id_arg: CouponId, applicability: &Applicability) -> RepoResult<()>;

    /// Loads applicability of the coupon
    fn applicability(&self, coupon: &Coupon) -> RepoResult<Applicability>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CouponScopesRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CouponScopesRepo
    for CouponScopesRepoImpl<'a, T>
{
    fn create(&self, coupon_id_arg: CouponId, applicability: &Applicability) -> RepoResult<()> {
        debug!("Add scope {:?} to coupon {}.", applicability, coupon_id_arg);

        let inserted = match *applicability {
            Applicability::All => Ok(0),
            Applicability::Courses { ref course_ids } => {
                let rows = course_ids
                    .iter()
                    .map(|course_id| NewCouponScopeCourse {
                        coupon_id: coupon_id_arg,
                        course_id: *course_id,
                    }).collect::<Vec<_>>();
                diesel::insert_into(ScopeCourses::coupon_scope_courses)
                    .values(&rows)
                    .on_conflict_do_nothing()
                    .execute(self.db_conn)
            }
            Applicability::Categories { ref categories } => {
                let rows = categories
                    .iter()
                    .map(|category| category.trim())
                    .filter(|category| !category.is_empty())
                    .map(|category| NewCouponScopeCategory {
                        coupon_id: coupon_id_arg,
                        category: category.to_string(),
                    }).collect::<Vec<_>>();
                diesel::insert_into(ScopeCategories::coupon_scope_categories)
                    .values(&rows)
                    .on_conflict_do_nothing()
                    .execute(self.db_conn)
            }
        };

        inserted
            .map(|_| ())
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Add scope to coupon: {} error occurred", coupon_id_arg)).into())
    }

    fn applicability(&self, coupon: &Coupon) -> RepoResult<Applicability> {
        debug!("Load scope of coupon {}.", coupon.id);

        let loaded = match coupon.scope {
            CouponScope::All => Ok(Applicability::All),
            CouponScope::Courses => ScopeCourses::coupon_scope_courses
                .filter(ScopeCourses::coupon_id.eq(coupon.id))
                .select(ScopeCourses::course_id)
                .order(ScopeCourses::course_id)
                .get_results::<CourseId>(self.db_conn)
                .map(|course_ids| Applicability::Courses { course_ids }),
            CouponScope::Categories => ScopeCategories::coupon_scope_categories
                .filter(ScopeCategories::coupon_id.eq(coupon.id))
                .select(ScopeCategories::category)
                .order(ScopeCategories::category)
                .get_results::<String>(self.db_conn)
                .map(|categories| Applicability::Categories { categories }),
        };

        loaded
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Load scope of coupon: {} error occurred", coupon.id)).into())
    }
}
