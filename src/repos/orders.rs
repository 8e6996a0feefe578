//! Orders repo, the only writer of order status
use std::time::SystemTime;

use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;
use failure::Error as FailureError;

use models::*;
use repos::types::RepoResult;
use schema::orders::dsl as Orders;
use types::{OrderId, UserId};

/// Orders repository
pub struct OrdersRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
}

pub trait OrdersRepo {
    /// Creates new pending order
    fn create(&self, payload: NewOrder) -> RepoResult<Order>;

    /// Get order
    fn get(&self, id_arg: OrderId) -> RepoResult<Option<Order>>;

    /// Get order and lock its row until the end of the transaction
    fn get_for_update(&self, id_arg: OrderId) -> RepoResult<Option<Order>>;

    /// Orders of the user, newest first
    fn list_by_user(&self, user_id_arg: UserId) -> RepoResult<Vec<Order>>;

    /// Pending orders created before `created_before`
    fn list_pending_created_before(&self, created_before: SystemTime) -> RepoResult<Vec<Order>>;

    /// Stores the payment provider correlation id. `None` when the order is not pending anymore.
    fn set_correlation_id(&self, id_arg: OrderId, correlation_id_arg: String) -> RepoResult<Option<Order>>;

    /// pending -> completed. `None` when the order is not pending anymore.
    fn complete(&self, id_arg: OrderId, provider_transaction_id_arg: Option<String>) -> RepoResult<Option<Order>>;

    /// pending -> failed. `None` when the order is not pending anymore.
    fn fail(&self, id_arg: OrderId, reason: String, refund_required_arg: bool) -> RepoResult<Option<Order>>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> OrdersRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T) -> Self {
        Self { db_conn }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> OrdersRepo for OrdersRepoImpl<'a, T> {
    fn create(&self, payload: NewOrder) -> RepoResult<Order> {
        debug!("Create new order {:?}.", payload);
        let query = diesel::insert_into(Orders::orders).values(&payload);

        query
            .get_result::<Order>(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Create new order: {:?} error occurred", payload)).into())
    }

    fn get(&self, id_arg: OrderId) -> RepoResult<Option<Order>> {
        debug!("Find order with id {}.", id_arg);
        let query = Orders::orders.filter(Orders::id.eq(id_arg));

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Find order by id: {} error occurred", id_arg)).into())
    }

    fn get_for_update(&self, id_arg: OrderId) -> RepoResult<Option<Order>> {
        debug!("Lock order with id {}.", id_arg);
        let query = Orders::orders.filter(Orders::id.eq(id_arg)).for_update();

        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Lock order by id: {} error occurred", id_arg)).into())
    }

    fn list_by_user(&self, user_id_arg: UserId) -> RepoResult<Vec<Order>> {
        debug!("Find orders of user {}.", user_id_arg);
        let query = Orders::orders
            .filter(Orders::user_id.eq(user_id_arg))
            .order(Orders::created_at.desc());

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Find orders of user: {} error occurred", user_id_arg)).into())
    }

    fn list_pending_created_before(&self, created_before: SystemTime) -> RepoResult<Vec<Order>> {
        debug!("Find pending orders created before {:?}.", created_before);
        let query = Orders::orders
            .filter(Orders::status.eq(OrderStatus::Pending))
            .filter(Orders::created_at.lt(created_before))
            .order(Orders::id);

        query
            .get_results(self.db_conn)
            .map_err(From::from)
            .map_err(|e: FailureError| e.context("Find stale pending orders error occurred").into())
    }

    fn set_correlation_id(&self, id_arg: OrderId, correlation_id_arg: String) -> RepoResult<Option<Order>> {
        debug!("Set correlation id {} to order {}.", correlation_id_arg, id_arg);
        let filtered = Orders::orders
            .filter(Orders::id.eq(id_arg))
            .filter(Orders::status.eq(OrderStatus::Pending));
        let query = diesel::update(filtered).set((
            Orders::correlation_id.eq(Some(correlation_id_arg)),
            Orders::updated_at.eq(SystemTime::now()),
        ));

        query
            .get_result::<Order>(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Set correlation id to order: {} error occurred", id_arg)).into())
    }

    fn complete(&self, id_arg: OrderId, provider_transaction_id_arg: Option<String>) -> RepoResult<Option<Order>> {
        debug!("Complete order {}.", id_arg);
        let now = SystemTime::now();
        let filtered = Orders::orders
            .filter(Orders::id.eq(id_arg))
            .filter(Orders::status.eq(OrderStatus::Pending));
        let query = diesel::update(filtered).set((
            Orders::status.eq(OrderStatus::Completed),
            Orders::provider_transaction_id.eq(provider_transaction_id_arg),
            Orders::paid_at.eq(Some(now)),
            Orders::updated_at.eq(now),
        ));

        query
            .get_result::<Order>(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Complete order: {} error occurred", id_arg)).into())
    }

    fn fail(&self, id_arg: OrderId, reason: String, refund_required_arg: bool) -> RepoResult<Option<Order>> {
        debug!("Fail order {} with reason {}.", id_arg, reason);
        let filtered = Orders::orders
            .filter(Orders::id.eq(id_arg))
            .filter(Orders::status.eq(OrderStatus::Pending));
        let query = diesel::update(filtered).set((
            Orders::status.eq(OrderStatus::Failed),
            Orders::failure_reason.eq(Some(reason)),
            Orders::refund_required.eq(refund_required_arg),
            Orders::updated_at.eq(SystemTime::now()),
        ));

        query
            .get_result::<Order>(self.db_conn)
            .optional()
            .map_err(From::from)
            .map_err(|e: FailureError| e.context(format!("Fail order: {} error occurred", id_arg)).into())
    }
}
