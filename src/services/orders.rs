//! Order ledger. Orders move pending -> completed or pending -> failed, terminal orders never change.
//!
//! Coupon uses are consumed only when an order completes, under the coupon row lock and in
//! the same transaction that enrolls the learner. A coupon that ran out between checkout
//! and payment fails the order and flags it for refund.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use futures::Future;
use r2d2::ManageConnection;
use validator::{ValidationError, ValidationErrors};

use super::enrollments::enroll;
use super::types::ServiceFuture;
use errors::Error;
use models::*;
use payments::PaymentRequest;
use repos::{CouponUsagesRepo, CouponsRepo, EnrollmentsRepo, OrdersRepo, RepoResult, ReposFactory};
use services::coupons::check_coupon_code;
use services::Service;
use types::OrderId;

pub trait OrdersService {
    /// Creates pending order for a paid course and asks the payment provider for a payment
    fn create_order(&self, payload: NewOrderPayload) -> ServiceFuture<Order>;
    /// Asks the payment provider again for a pending order
    fn request_payment(&self, order_id: OrderId) -> ServiceFuture<Order>;
    /// Applies payment verdict, idempotent on terminal orders
    fn finalize_order(&self, order_id: OrderId, verdict: PaymentVerdict) -> ServiceFuture<Order>;
    /// Cancels pending order of the caller
    fn cancel_order(&self, order_id: OrderId) -> ServiceFuture<Order>;
    /// Fails pending orders older than configured ttl
    fn expire_pending_orders(&self) -> ServiceFuture<Vec<Order>>;
    /// Returns order
    fn get_order(&self, order_id: OrderId) -> ServiceFuture<Order>;
    /// Orders of the caller
    fn list_orders(&self) -> ServiceFuture<Vec<Order>>;
}

/// Result of a finalization transaction
#[derive(Debug, Clone)]
pub enum Finalization {
    Settled(Order),
    /// Coupon limit was hit at commit time, the order is failed and must be refunded
    CouponRefused { order: Order, reason: &'static str },
}

impl Finalization {
    fn into_result(self) -> Result<Order, FailureError> {
        match self {
            Finalization::Settled(order) => Ok(order),
            Finalization::CouponRefused { order, reason } => Err(format_err!("Order {} failed: {}", order.id, reason)
                .context(Error::Conflict(reason.to_string()))
                .into()),
        }
    }
}

fn order_not_found(order_id: OrderId) -> FailureError {
    format_err!("Order {} not found", order_id).context(Error::NotFound).into()
}

/// Row written by a conditional transition, or the current row when another writer came first
fn current_order(orders_repo: &OrdersRepo, order_id: OrderId, updated: Option<Order>) -> RepoResult<Order> {
    match updated {
        Some(order) => Ok(order),
        None => orders_repo.get(order_id)?.ok_or_else(|| order_not_found(order_id)),
    }
}

fn correlation_mismatch(order: &Order, received: Option<&str>) -> FailureError {
    let mut errors = ValidationErrors::new();
    errors.add(
        "correlation_id",
        ValidationError {
            code: Cow::from("mismatch"),
            message: Some(Cow::from("Correlation id does not match the order.")),
            params: HashMap::new(),
        },
    );
    format_err!("Verdict for order {} carries correlation id {:?}", order.id, received)
        .context(Error::Validate(errors))
        .into()
}

/// Applies the verdict inside the caller's transaction
pub fn finalize(
    orders_repo: &OrdersRepo,
    coupons_repo: &CouponsRepo,
    usages_repo: &CouponUsagesRepo,
    enrollments_repo: &EnrollmentsRepo,
    order_id: OrderId,
    verdict: PaymentVerdict,
) -> RepoResult<Finalization> {
    let order = orders_repo.get_for_update(order_id)?.ok_or_else(|| order_not_found(order_id))?;
    if order.status.is_terminal() {
        debug!("Order {} is already {}, verdict ignored.", order.id, order.status);
        return Ok(Finalization::Settled(order));
    }

    // Charged orders settle only on the verdict quoting the intent stored for them
    if order.amount > 0 || order.correlation_id.is_some() {
        let received = verdict.correlation_id.as_ref().map(String::as_str);
        if order.correlation_id.is_none() || order.correlation_id.as_ref().map(String::as_str) != received {
            return Err(correlation_mismatch(&order, received));
        }
    }

    if !verdict.success {
        let failed = orders_repo.fail(order.id, "payment declined".to_string(), false)?;
        let failed = current_order(orders_repo, order.id, failed)?;
        info!(
            "Order {} of user {} for course {} is {}: payment declined.",
            failed.id, failed.user_id, failed.course_id, failed.status
        );
        return Ok(Finalization::Settled(failed));
    }

    if let Some(coupon_id) = order.coupon_id {
        let coupon = coupons_repo
            .get_for_update(coupon_id)?
            .ok_or_else(|| format_err!("Coupon {} of order {} not found", coupon_id, order.id))?;

        let refusal = if usages_repo.count_by_user(coupon.id, order.user_id)? >= i64::from(coupon.per_user_limit) {
            Some("coupon already used")
        } else if !coupons_repo.try_increment_usage(coupon.id)? {
            Some("coupon exhausted")
        } else {
            None
        };

        if let Some(reason) = refusal {
            warn!("Coupon {} refused at completion of order {}: {}.", coupon.code, order.id, reason);
            let failed = orders_repo.fail(order.id, reason.to_string(), true)?;
            let failed = current_order(orders_repo, order.id, failed)?;
            info!(
                "Order {} of user {} for course {} is {}: {}, refund required.",
                failed.id, failed.user_id, failed.course_id, failed.status, reason
            );
            return Ok(Finalization::CouponRefused { order: failed, reason });
        }

        usages_repo.create(NewCouponUsage {
            coupon_id: coupon.id,
            user_id: order.user_id,
            order_id: order.id,
            course_id: order.course_id,
            discount_amount: order.discount_amount,
            original_amount: order.original_amount,
            final_amount: order.amount,
        })?;
    }

    enroll(enrollments_repo, order.user_id, order.course_id, EnrollmentSource::Order, Some(order.id))?;

    let completed = orders_repo.complete(order.id, verdict.transaction_id)?;
    let completed = current_order(orders_repo, order.id, completed)?;
    info!(
        "Order {} of user {} for course {} is {}.",
        completed.id, completed.user_id, completed.course_id, completed.status
    );
    Ok(Finalization::Settled(completed))
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > OrdersService for Service<M, F>
{
    fn create_order(&self, payload: NewOrderPayload) -> ServiceFuture<Order> {
        let repo_factory = self.static_context.repo_factory.clone();
        let service = self.clone();

        let identity = match self.require_verified_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        let created = self.spawn_on_pool(move |conn| {
            let catalog_repo = repo_factory.create_catalog_repo(&*conn);
            let coupons_repo = repo_factory.create_coupons_repo(&*conn);
            let scopes_repo = repo_factory.create_coupon_scopes_repo(&*conn);
            let usages_repo = repo_factory.create_coupon_usages_repo(&*conn);
            let orders_repo = repo_factory.create_orders_repo(&*conn);
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);
            conn.transaction::<Finalization, FailureError, _>(move || {
                let course = catalog_repo
                    .get_course(payload.course_id)?
                    .ok_or_else(|| format_err!("Course {} not found", payload.course_id).context(Error::NotFound))?;
                if !course.is_published {
                    return Err(format_err!("Course {} is not published", course.id)
                        .context(Error::RuleViolation("course is not available".to_string()))
                        .into());
                }
                if course.is_free() {
                    return Err(format_err!("Course {} is free", course.id)
                        .context(Error::RuleViolation("course is free".to_string()))
                        .into());
                }
                if let Some(enrollment) = enrollments_repo.get_by_user_course(identity.user_id, course.id)? {
                    if enrollment.status.grants_access() {
                        return Err(format_err!("User {} is enrolled in course {}", identity.user_id, course.id)
                            .context(Error::Conflict("already enrolled".to_string()))
                            .into());
                    }
                }

                let (coupon_id, coupon_code, discount_amount, amount) = match payload.coupon_code {
                    Some(code) => {
                        let (_, validation) =
                            check_coupon_code(&*coupons_repo, &*scopes_repo, &*usages_repo, code.clone(), identity.user_id, &course)?;
                        match validation {
                            CouponValidation::Valid {
                                coupon_id,
                                discount,
                                final_amount,
                                ..
                            } => (Some(coupon_id), Some(code.normalized()), discount, final_amount),
                            CouponValidation::Invalid { reason, .. } => {
                                return Err(format_err!("Coupon {} refused for course {}", code, course.id)
                                    .context(Error::RuleViolation(reason.reason().to_string()))
                                    .into());
                            }
                        }
                    }
                    None => (None, None, 0, course.price),
                };

                let order = orders_repo.create(NewOrder {
                    user_id: identity.user_id,
                    course_id: course.id,
                    status: OrderStatus::Pending,
                    original_amount: course.price,
                    discount_amount,
                    amount,
                    currency: course.currency.clone(),
                    payment_method: payload.payment_method,
                    coupon_id,
                    coupon_code,
                })?;
                info!(
                    "Order {} of user {} for course {} is {}, amount {} {}.",
                    order.id, order.user_id, order.course_id, order.status, order.amount, order.currency
                );

                if order.amount == 0 {
                    finalize(
                        &*orders_repo,
                        &*coupons_repo,
                        &*usages_repo,
                        &*enrollments_repo,
                        order.id,
                        PaymentVerdict::free_of_charge(),
                    )
                } else {
                    Ok(Finalization::Settled(order))
                }
            }).map_err(|e: FailureError| e.context("Service Orders, create_order endpoint error occurred.").into())
        });

        Box::new(created.and_then(Finalization::into_result).and_then(move |order| -> ServiceFuture<Order> {
            if order.status == OrderStatus::Pending {
                service.request_intent(order)
            } else {
                Box::new(future::ok(order))
            }
        }))
    }

    fn request_payment(&self, order_id: OrderId) -> ServiceFuture<Order> {
        let repo_factory = self.static_context.repo_factory.clone();
        let service = self.clone();

        let identity = match self.require_verified_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        let pending = self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&*conn);
            let order = orders_repo.get(order_id)?.ok_or_else(|| order_not_found(order_id))?;
            if order.user_id != identity.user_id {
                return Err(format_err!("Order {} belongs to another user", order_id)
                    .context(Error::Forbidden("not the order owner".to_string()))
                    .into());
            }
            if order.status != OrderStatus::Pending {
                return Err(format_err!("Order {} is {}", order_id, order.status)
                    .context(Error::RuleViolation("order is not pending".to_string()))
                    .into());
            }
            Ok(order)
        });

        Box::new(pending.and_then(move |order| service.request_intent(order)))
    }

    fn finalize_order(&self, order_id: OrderId, verdict: PaymentVerdict) -> ServiceFuture<Order> {
        let repo_factory = self.static_context.repo_factory.clone();

        let finalized = self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&*conn);
            let coupons_repo = repo_factory.create_coupons_repo(&*conn);
            let usages_repo = repo_factory.create_coupon_usages_repo(&*conn);
            let enrollments_repo = repo_factory.create_enrollments_repo(&*conn);
            conn.transaction::<Finalization, FailureError, _>(move || {
                finalize(&*orders_repo, &*coupons_repo, &*usages_repo, &*enrollments_repo, order_id, verdict)
            }).map_err(|e: FailureError| e.context("Service Orders, finalize_order endpoint error occurred.").into())
        });

        Box::new(finalized.and_then(Finalization::into_result))
    }

    fn cancel_order(&self, order_id: OrderId) -> ServiceFuture<Order> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&*conn);
            conn.transaction::<Order, FailureError, _>(move || {
                let order = orders_repo.get_for_update(order_id)?.ok_or_else(|| order_not_found(order_id))?;
                if order.user_id != identity.user_id {
                    return Err(format_err!("Order {} belongs to another user", order_id)
                        .context(Error::Forbidden("not the order owner".to_string()))
                        .into());
                }

                match order.status {
                    OrderStatus::Completed => Err(format_err!("Order {} is completed", order_id)
                        .context(Error::RuleViolation("order is already completed".to_string()))
                        .into()),
                    OrderStatus::Failed => Ok(order),
                    OrderStatus::Pending => {
                        let cancelled = orders_repo.fail(order.id, "cancelled by user".to_string(), false)?;
                        let cancelled = current_order(&*orders_repo, order.id, cancelled)?;
                        info!(
                            "Order {} of user {} for course {} is {}: cancelled by user.",
                            cancelled.id, cancelled.user_id, cancelled.course_id, cancelled.status
                        );
                        Ok(cancelled)
                    }
                }
            }).map_err(|e: FailureError| e.context("Service Orders, cancel_order endpoint error occurred.").into())
        })
    }

    fn expire_pending_orders(&self) -> ServiceFuture<Vec<Order>> {
        let repo_factory = self.static_context.repo_factory.clone();
        let ttl = self.static_context.config.orders.pending_ttl();

        if let Err(e) = self.require_admin() {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&*conn);
            conn.transaction::<Vec<Order>, FailureError, _>(move || {
                let created_before = SystemTime::now().checked_sub(ttl).unwrap_or(UNIX_EPOCH);
                let stale = orders_repo.list_pending_created_before(created_before)?;

                let mut expired = vec![];
                for order in stale {
                    if let Some(failed) = orders_repo.fail(order.id, "expired".to_string(), false)? {
                        info!(
                            "Order {} of user {} for course {} is {}: expired.",
                            failed.id, failed.user_id, failed.course_id, failed.status
                        );
                        expired.push(failed);
                    }
                }
                Ok(expired)
            }).map_err(|e: FailureError| e.context("Service Orders, expire_pending_orders endpoint error occurred.").into())
        })
    }

    fn get_order(&self, order_id: OrderId) -> ServiceFuture<Order> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&*conn);
            orders_repo
                .get(order_id)
                .map_err(|e: FailureError| e.context("Service Orders, get_order endpoint error occurred.").into())
                .and_then(|order| order.ok_or_else(|| order_not_found(order_id)))
                .and_then(|order| {
                    if order.user_id == identity.user_id || identity.is_admin() {
                        Ok(order)
                    } else {
                        Err(format_err!("Order {} belongs to another user", order_id)
                            .context(Error::Forbidden("not the order owner".to_string()))
                            .into())
                    }
                })
        })
    }

    fn list_orders(&self) -> ServiceFuture<Vec<Order>> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&*conn);
            orders_repo
                .list_by_user(identity.user_id)
                .map_err(|e| e.context("Service Orders, list_orders endpoint error occurred.").into())
        })
    }
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Service<M, F>
{
    /// Asks the payment provider for a correlation id and stores it. The order stays pending
    /// when the provider fails or times out.
    fn request_intent(&self, order: Order) -> ServiceFuture<Order> {
        let repo_factory = self.static_context.repo_factory.clone();
        let service = self.clone();
        let order_id = order.id;
        let request = PaymentRequest {
            order_id,
            amount: order.amount,
            currency: order.currency,
        };

        let intent = self.static_context.payment_provider.create_payment(request).map_err(move |e| -> FailureError {
            warn!("Payment provider failed for order {}: {}.", order_id, e);
            e.context(Error::ExternalDependency).into()
        });

        Box::new(intent.and_then(move |intent| {
            service.spawn_on_pool(move |conn| {
                let orders_repo = repo_factory.create_orders_repo(&*conn);
                orders_repo
                    .set_correlation_id(order_id, intent.correlation_id)
                    .and_then(|updated| current_order(&*orders_repo, order_id, updated))
                    .map_err(|e: FailureError| e.context("Service Orders, request_payment endpoint error occurred.").into())
            })
        }))
    }
}
