use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::dsl::count_star;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;
use failure::Error as FailureError;

use models::*;
use repos::types::RepoResult;
use schema::coupon_usages::dsl as CouponUsages;
use types::{CouponId, UserId};

/// CouponUsages repository, one row per redemption
pub struct CouponUsagesRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait CouponUsagesRepo {
    /// Records a redemption
    fn create(&self, payload: NewCouponUsage) -> RepoResult<CouponUsage>;

    /// Number of redemptions of the coupon by the user
    fn count_by_user(&self, coupon_id_arg: CouponId, user_id_arg: UserId) -> RepoResult<i64>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CouponUsagesRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CouponUsagesRepo
    for CouponUsagesRepoImpl<'a, T>
{
    fn create(&self, payload: NewCouponUsage) -> RepoResult<CouponUsage> {
        debug!("Create coupon usage {:?}.", payload);
        let query = diesel::insert_into(CouponUsages::coupon_usages).values(&payload);

        query
            .get_result::<CouponUsage>(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Create coupon usage: {:?} error occurred", payload)).into())
    }

    fn count_by_user(&self, coupon_id_arg: CouponId, user_id_arg: UserId) -> RepoResult<i64> {
        debug!("Count usages of coupon {} by user {}.", coupon_id_arg, user_id_arg);
        let query = CouponUsages::coupon_usages
            .filter(CouponUsages::coupon_id.eq(coupon_id_arg))
            .filter(CouponUsages::user_id.eq(user_id_arg))
            .select(count_star());

        query.get_result::<i64>(self.db_conn).map_err(From::from).map_err(|e: FailureError| {
            e.context(format!(
                "Count usages of coupon: {} by user: {} error occurred",
                coupon_id_arg, user_id_arg
            )).into()
        })
    }
}
