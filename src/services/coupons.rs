//! Coupon engine. Validation never consumes a use, redemption happens when an order completes.

use std::time::SystemTime;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use r2d2::ManageConnection;
use uuid::Uuid;
use validator::Validate;

use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::{CouponScopesRepo, CouponUsagesRepo, CouponsRepo, RepoResult, ReposFactory};
use services::Service;
use types::{CouponCode, CouponId, UserId};

pub trait CouponsService {
    /// Creates new coupon
    fn create_coupon(&self, payload: CreateCouponPayload) -> ServiceFuture<CouponWithScope>;
    /// Returns all coupons
    fn list_coupons(&self) -> ServiceFuture<Vec<Coupon>>;
    /// Returns coupon by id
    fn get_coupon(&self, id_arg: CouponId) -> ServiceFuture<CouponWithScope>;
    /// Deactivates coupon, coupons are never deleted
    fn deactivate_coupon(&self, id_arg: CouponId) -> ServiceFuture<Coupon>;
    /// Generate coupon code
    fn generate_coupon_code(&self) -> ServiceFuture<String>;
    /// Checks a code against a course for the caller without consuming it
    fn validate_coupon(&self, payload: ValidateCouponPayload) -> ServiceFuture<CouponValidation>;
}

/// `round(order_amount * value / 100)` capped by `max_discount` for percentages,
/// `min(value, order_amount)` for fixed amounts
pub fn calculate_discount(discount_type: DiscountType, value: i64, max_discount: Option<i64>, order_amount: i64) -> i64 {
    let order_amount = order_amount.max(0);
    let discount = match discount_type {
        DiscountType::Percentage => {
            let discount = (order_amount * value + 50) / 100;
            max_discount.map_or(discount, |cap| discount.min(cap))
        }
        DiscountType::Fixed => value.min(order_amount),
    };
    discount.max(0).min(order_amount)
}

/// Checks of an existing coupon in the order they are applied
pub fn evaluate_coupon(
    coupon: &Coupon,
    applicability: &Applicability,
    user_usages: i64,
    course: &Course,
    order_amount: i64,
    now: SystemTime,
) -> CouponValidation {
    if !coupon.is_currently_valid(now) {
        return CouponValidation::invalid(CouponRejection::InvalidOrExpired);
    }
    if !coupon.has_uses_left() {
        return CouponValidation::invalid(CouponRejection::UsageLimitReached);
    }
    if user_usages >= i64::from(coupon.per_user_limit) {
        return CouponValidation::invalid(CouponRejection::AlreadyUsed);
    }
    if !applicability.covers(course.id, &course.category) {
        return CouponValidation::invalid(CouponRejection::NotApplicable);
    }
    if order_amount < coupon.min_order_value {
        return CouponValidation::invalid(CouponRejection::MinimumOrderNotMet);
    }

    let discount = calculate_discount(coupon.discount_type, coupon.value, coupon.max_discount, order_amount);
    CouponValidation::valid(coupon.id, discount, (order_amount - discount).max(0))
}

/// Looks the code up and runs the engine for the course price
pub fn check_coupon_code(
    coupons_repo: &CouponsRepo,
    scopes_repo: &CouponScopesRepo,
    usages_repo: &CouponUsagesRepo,
    code: CouponCode,
    user_id: UserId,
    course: &Course,
) -> RepoResult<(Option<Coupon>, CouponValidation)> {
    let coupon = match coupons_repo.get_by_code(code)? {
        Some(coupon) => coupon,
        None => return Ok((None, CouponValidation::invalid(CouponRejection::InvalidOrExpired))),
    };
    let applicability = scopes_repo.applicability(&coupon)?;
    let user_usages = usages_repo.count_by_user(coupon.id, user_id)?;
    let validation = evaluate_coupon(&coupon, &applicability, user_usages, course, course.price, SystemTime::now());

    Ok((Some(coupon), validation))
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > CouponsService for Service<M, F>
{
    fn create_coupon(&self, payload: CreateCouponPayload) -> ServiceFuture<CouponWithScope> {
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = self.require_admin() {
            return Box::new(future::err(e));
        }
        if let Err(errors) = payload.validate() {
            return Box::new(future::err(
                format_err!("Invalid coupon payload").context(Error::Validate(errors)).into(),
            ));
        }

        let code = payload.code.clone().map(CouponCode).unwrap_or_else(generate_code);

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn);
            let scopes_repo = repo_factory.create_coupon_scopes_repo(&*conn);
            conn.transaction::<CouponWithScope, FailureError, _>(move || {
                if coupons_repo.get_by_code(code.clone())?.is_some() {
                    return Err(format_err!("Coupon {} already exists", code)
                        .context(Error::Conflict("coupon code already exists".to_string()))
                        .into());
                }
                let coupon = coupons_repo.create(NewCoupon::new(code, &payload))?;
                scopes_repo.create(coupon.id, &payload.applicability)?;
                info!("Coupon {} created with id {}.", coupon.code, coupon.id);

                Ok(CouponWithScope {
                    coupon,
                    applicability: payload.applicability,
                })
            }).map_err(|e: FailureError| e.context("Service Coupons, create endpoint error occurred.").into())
        })
    }

    fn list_coupons(&self) -> ServiceFuture<Vec<Coupon>> {
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = self.require_admin() {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn);

            coupons_repo
                .list()
                .map_err(|e| e.context("Service Coupons, list endpoint error occurred.").into())
        })
    }

    fn get_coupon(&self, id_arg: CouponId) -> ServiceFuture<CouponWithScope> {
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = self.require_admin() {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn);
            let scopes_repo = repo_factory.create_coupon_scopes_repo(&*conn);

            coupons_repo
                .get(id_arg)
                .and_then(|coupon| coupon.ok_or_else(|| format_err!("Coupon {} not found", id_arg).context(Error::NotFound).into()))
                .and_then(|coupon| {
                    let applicability = scopes_repo.applicability(&coupon)?;
                    Ok(CouponWithScope { coupon, applicability })
                }).map_err(|e: FailureError| e.context("Service Coupons, get_coupon endpoint error occurred.").into())
        })
    }

    fn deactivate_coupon(&self, id_arg: CouponId) -> ServiceFuture<Coupon> {
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(e) = self.require_admin() {
            return Box::new(future::err(e));
        }

        self.spawn_on_pool(move |conn| {
            let coupons_repo = repo_factory.create_coupons_repo(&*conn);
            conn.transaction::<Coupon, FailureError, _>(move || {
                if coupons_repo.get(id_arg)?.is_none() {
                    return Err(format_err!("Coupon {} not found", id_arg).context(Error::NotFound).into());
                }
                let coupon = coupons_repo.deactivate(id_arg)?;
                info!("Coupon {} deactivated.", coupon.id);
                Ok(coupon)
            }).map_err(|e: FailureError| e.context("Service Coupons, deactivate endpoint error occurred.").into())
        })
    }

    fn generate_coupon_code(&self) -> ServiceFuture<String> {
        if let Err(e) = self.require_admin() {
            return Box::new(future::err(e));
        }

        Box::new(future::ok(generate_code().0))
    }

    fn validate_coupon(&self, payload: ValidateCouponPayload) -> ServiceFuture<CouponValidation> {
        let repo_factory = self.static_context.repo_factory.clone();

        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(e) => return Box::new(future::err(e)),
        };

        self.spawn_on_pool(move |conn| {
            let catalog_repo = repo_factory.create_catalog_repo(&*conn);
            let coupons_repo = repo_factory.create_coupons_repo(&*conn);
            let scopes_repo = repo_factory.create_coupon_scopes_repo(&*conn);
            let usages_repo = repo_factory.create_coupon_usages_repo(&*conn);

            catalog_repo
                .get_course(payload.course_id)
                .and_then(|course| {
                    course.ok_or_else(|| {
                        format_err!("Course {} not found", payload.course_id)
                            .context(Error::NotFound)
                            .into()
                    })
                }).and_then(|course| {
                    check_coupon_code(
                        &*coupons_repo,
                        &*scopes_repo,
                        &*usages_repo,
                        payload.code.clone(),
                        identity.user_id,
                        &course,
                    )
                }).map(|(_, validation)| {
                    debug!("Coupon {} checked for user {}: {:?}.", payload.code, identity.user_id, validation);
                    validation
                }).map_err(|e: FailureError| e.context("Service Coupons, validate_coupon endpoint error occurred.").into())
        })
    }
}

fn generate_code() -> CouponCode {
    let new_uuid = Uuid::new_v4().simple().to_string().to_uppercase();
    CouponCode(new_uuid.chars().take(Coupon::MIN_GENERATE_LENGTH_CODE).collect::<String>())
}
