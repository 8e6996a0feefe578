use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::sql_types::Integer;
use diesel::Connection;
use failure::Error as FailureError;

use std::time::SystemTime;

use models::*;
use repos::types::RepoResult;
use schema::coupons::dsl as Coupons;
use types::{CouponCode, CouponId};

/// Coupons repository, responsible for handling coupon
pub struct CouponsRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait CouponsRepo {
    /// Creates new coupon
    fn create(&self, payload: NewCoupon) -> RepoResult<Coupon>;

    /// List all coupons
    fn list(&self) -> RepoResult<Vec<Coupon>>;

    /// Get coupon
    fn get(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>>;

    /// Get coupon and lock its row until the end of the transaction
    fn get_for_update(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>>;

    /// Get coupon by code, case insensitive
    fn get_by_code(&self, code_arg: CouponCode) -> RepoResult<Option<Coupon>>;

    /// Deactivate coupon
    fn deactivate(&self, id_arg: CouponId) -> RepoResult<Coupon>;

    /// Takes one use of the coupon. Returns `false` when the usage limit is already reached.
    fn try_increment_usage(&self, id_arg: CouponId) -> RepoResult<bool>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CouponsRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CouponsRepo for CouponsRepoImpl<'a, T> {
    fn create(&self, payload: NewCoupon) -> RepoResult<Coupon> {
        debug!("Create new coupon {:?}.", payload);
        let mut payload = payload;
        payload.code = payload.code.normalized();

        let query = diesel::insert_into(Coupons::coupons).values(&payload);
        query
            .get_result::<Coupon>(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Creates new coupon: {:?} error occurred", payload)).into())
    }

    fn list(&self) -> RepoResult<Vec<Coupon>> {
        debug!("Find all coupons.");
        let query = Coupons::coupons.order(Coupons::id);

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context("List all coupons").into())
    }

    fn get(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>> {
        debug!("Find in coupon with id {}.", id_arg);
        let query = Coupons::coupons.filter(Coupons::id.eq(id_arg));

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Find coupon by id: {} error occurred", id_arg)).into())
    }

    fn get_for_update(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>> {
        debug!("Lock coupon with id {}.", id_arg);
        let query = Coupons::coupons.filter(Coupons::id.eq(id_arg)).for_update();

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Lock coupon by id: {} error occurred", id_arg)).into())
    }

    fn get_by_code(&self, code_arg: CouponCode) -> RepoResult<Option<Coupon>> {
        debug!("Find in coupon with by coupon code: {}.", code_arg);
        let code_arg = code_arg.normalized();
        let query = Coupons::coupons.filter(Coupons::code.eq(&code_arg));

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Find in coupon with by coupon code: {}.", code_arg)).into())
    }

    fn deactivate(&self, id_arg: CouponId) -> RepoResult<Coupon> {
        debug!("Deactivate coupon with id {}.", id_arg);
        let filtered = Coupons::coupons.filter(Coupons::id.eq(id_arg));
        let query = diesel::update(filtered).set((Coupons::is_active.eq(false), Coupons::updated_at.eq(SystemTime::now())));

        query
            .get_result::<Coupon>(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Deactivate coupon: {} error occurred", id_arg)).into())
    }

    fn try_increment_usage(&self, id_arg: CouponId) -> RepoResult<bool> {
        debug!("Increment used count of coupon {}.", id_arg);
        let query = diesel::sql_query(
            "UPDATE coupons SET used_count = used_count + 1, updated_at = now() \
             WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)",
        ).bind::<Integer, _>(id_arg);

        query
            .execute(self.db_conn)
            .map(|updated| updated == 1)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Increment used count of coupon: {} error occurred", id_arg)).into())
    }
}
