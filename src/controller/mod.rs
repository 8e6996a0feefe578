//! `Controller` is a top layer that handles all http-related
//! stuff like reading bodies, parsing params, forming a response.
//! Basically it provides inputs to `Service` layer and converts outputs
//! of `Service` layer to http responses

pub mod application;
pub mod context;
pub mod error;
pub mod router;
pub mod routes;
pub mod types;

use std::sync::Arc;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use futures::future;
use futures::{Future, Stream};
use hyper::server::Request;
use hyper::{Body, Get, Post};
use r2d2::ManageConnection;
use serde::de::DeserializeOwned;
use serde_json;

use self::application::Controller;
use self::context::{DynamicContext, StaticContext};
use self::router::RouteParser;
use self::routes::{create_route_parser, Route};
use self::types::ControllerFuture;
use errors::Error;
use models::*;
use repos::repo_factory::*;
use services::*;

/// Controller handles route parsing and calling `Service` layer
pub struct ControllerImpl<M: ManageConnection, F> {
    pub static_context: StaticContext<M, F>,
    pub route_parser: Arc<RouteParser<Route>>,
}

impl<M: ManageConnection, F: Clone> ControllerImpl<M, F> {
    /// Create a new controller based on services
    pub fn new(static_context: StaticContext<M, F>) -> Self {
        let route_parser = Arc::new(create_route_parser());
        Self {
            static_context,
            route_parser,
        }
    }
}

macro_rules! serialize_future {
    ($e:expr) => {
        Box::new($e.and_then(|resp| serde_json::to_string(&resp).map_err(FailureError::from)))
    };
}

/// Reads the whole body and deserializes it from JSON
pub fn parse_body<T>(body: Body) -> Box<Future<Item = T, Error = FailureError>>
where
    T: DeserializeOwned + 'static,
{
    Box::new(
        body.concat2()
            .map_err(|e| -> FailureError { format_err!("Failed to read request body: {}", e).context(Error::Parse).into() })
            .and_then(|chunk| {
                serde_json::from_slice::<T>(&chunk)
                    .map_err(|e| -> FailureError { format_err!("Failed to parse request body: {}", e).context(Error::Parse).into() })
            }),
    )
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Controller for ControllerImpl<M, F>
{
    /// Handle a request and get future response
    fn call(&self, req: Request) -> ControllerFuture {
        let (method, uri, _, headers, body) = req.deconstruct();
        let dynamic_context = DynamicContext::from_headers(&headers);
        let system_service = SystemServiceImpl::default();
        let service = Service::new(self.static_context.clone(), dynamic_context);

        match (&method, self.route_parser.test(uri.path())) {
            // GET /healthcheck
            (&Get, Some(Route::Healthcheck)) => serialize_future!(system_service.healthcheck()),

            // POST /coupons
            (&Post, Some(Route::Coupons)) => serialize_future!(
                parse_body::<CreateCouponPayload>(body).and_then(move |payload| service.create_coupon(payload))
            ),

            // GET /coupons
            (&Get, Some(Route::Coupons)) => serialize_future!(service.list_coupons()),

            // GET /coupons/<coupon_id>
            (&Get, Some(Route::Coupon(coupon_id))) => serialize_future!(service.get_coupon(coupon_id)),

            // POST /coupons/<coupon_id>/deactivate
            (&Post, Some(Route::CouponDeactivate(coupon_id))) => serialize_future!(service.deactivate_coupon(coupon_id)),

            // GET /coupons/generate_code
            (&Get, Some(Route::CouponGenerateCode)) => serialize_future!(service.generate_coupon_code()),

            // POST /coupons/validate
            (&Post, Some(Route::CouponValidate)) => serialize_future!(
                parse_body::<ValidateCouponPayload>(body).and_then(move |payload| service.validate_coupon(payload))
            ),

            // POST /orders
            (&Post, Some(Route::Orders)) => serialize_future!(
                parse_body::<NewOrderPayload>(body).and_then(move |payload| service.create_order(payload))
            ),

            // GET /orders
            (&Get, Some(Route::Orders)) => serialize_future!(service.list_orders()),

            // GET /orders/<order_id>
            (&Get, Some(Route::Order(order_id))) => serialize_future!(service.get_order(order_id)),

            // POST /orders/<order_id>/payment
            (&Post, Some(Route::OrderPayment(order_id))) => serialize_future!(service.request_payment(order_id)),

            // POST /orders/<order_id>/verdict
            (&Post, Some(Route::OrderVerdict(order_id))) => serialize_future!(
                parse_body::<PaymentVerdict>(body).and_then(move |verdict| service.finalize_order(order_id, verdict))
            ),

            // POST /orders/<order_id>/cancel
            (&Post, Some(Route::OrderCancel(order_id))) => serialize_future!(service.cancel_order(order_id)),

            // POST /orders/expire
            (&Post, Some(Route::OrdersExpire)) => serialize_future!(service.expire_pending_orders()),

            // POST /courses/<course_id>/enroll
            (&Post, Some(Route::CourseEnroll(course_id))) => serialize_future!(service.enroll_free(course_id)),

            // GET /courses/<course_id>/enrollment
            (&Get, Some(Route::CourseEnrollment(course_id))) => serialize_future!(service.get_enrollment(course_id)),

            // POST /courses/<course_id>/enrollment/pause
            (&Post, Some(Route::CourseEnrollmentPause(course_id))) => serialize_future!(service.pause_enrollment(course_id)),

            // POST /courses/<course_id>/enrollment/resume
            (&Post, Some(Route::CourseEnrollmentResume(course_id))) => serialize_future!(service.resume_enrollment(course_id)),

            // GET /courses/<course_id>/progress
            (&Get, Some(Route::CourseProgress(course_id))) => serialize_future!(service.list_lesson_progress(course_id)),

            // GET /enrollments
            (&Get, Some(Route::Enrollments)) => serialize_future!(service.list_enrollments()),

            // POST /enrollments/<enrollment_id>/cancel
            (&Post, Some(Route::EnrollmentCancel(enrollment_id))) => serialize_future!(service.cancel_enrollment(enrollment_id)),

            // POST /enrollments/<enrollment_id>/reset
            (&Post, Some(Route::EnrollmentReset(enrollment_id))) => serialize_future!(service.reset_progress(enrollment_id)),

            // POST /lessons/<lesson_id>/progress
            (&Post, Some(Route::LessonProgress(lesson_id))) => serialize_future!(
                parse_body::<ProgressDelta>(body).and_then(move |delta| service.record_lesson_progress(lesson_id, delta))
            ),

            // POST /certificates
            (&Post, Some(Route::Certificates)) => serialize_future!(
                parse_body::<IssueCertificatePayload>(body).and_then(move |payload| service.issue_certificate(payload))
            ),

            // GET /certificates
            (&Get, Some(Route::Certificates)) => serialize_future!(service.list_certificates()),

            // GET /certificates/<certificate_id>/verify
            (&Get, Some(Route::CertificateVerify(code))) => serialize_future!(service.verify_certificate(code)),

            // POST /certificates/<certificate_id>/revoke
            (&Post, Some(Route::CertificateRevoke(code))) => serialize_future!(
                parse_body::<RevokeCertificatePayload>(body).and_then(move |payload| service.revoke_certificate(code, payload))
            ),

            // Fallback
            (method, route) => Box::new(future::err(
                format_err!("Request to non existing endpoint in courses microservice: {} {} ({:?})", method, uri, route)
                    .context(Error::NotFound)
                    .into(),
            )),
        }
    }
}
