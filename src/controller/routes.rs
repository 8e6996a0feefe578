use controller::router::RouteParser;
use types::{CertificateCode, CouponId, CourseId, EnrollmentId, LessonId, OrderId};

/// List of all routes with params for the app
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    Healthcheck,
    Coupons,
    Coupon(CouponId),
    CouponDeactivate(CouponId),
    CouponGenerateCode,
    CouponValidate,
    Orders,
    Order(OrderId),
    OrderPayment(OrderId),
    OrderVerdict(OrderId),
    OrderCancel(OrderId),
    OrdersExpire,
    CourseEnroll(CourseId),
    CourseEnrollment(CourseId),
    CourseEnrollmentPause(CourseId),
    CourseEnrollmentResume(CourseId),
    CourseProgress(CourseId),
    Enrollments,
    EnrollmentCancel(EnrollmentId),
    EnrollmentReset(EnrollmentId),
    LessonProgress(LessonId),
    Certificates,
    CertificateVerify(CertificateCode),
    CertificateRevoke(CertificateCode),
}

fn id_param(params: &[&str]) -> Option<i32> {
    params.get(0).and_then(|string_id| string_id.parse::<i32>().ok())
}

pub fn create_route_parser() -> RouteParser<Route> {
    let mut router = RouteParser::default();

    // Healthcheck
    router.add_route(r"^/healthcheck$", || Route::Healthcheck);

    // Coupons routes
    router.add_route(r"^/coupons$", || Route::Coupons);
    router.add_route(r"^/coupons/generate_code$", || Route::CouponGenerateCode);
    router.add_route(r"^/coupons/validate$", || Route::CouponValidate);
    router.add_route_with_params(r"^/coupons/(\d+)$", |params| id_param(&params).map(|id| Route::Coupon(CouponId(id))));
    router.add_route_with_params(r"^/coupons/(\d+)/deactivate$", |params| {
        id_param(&params).map(|id| Route::CouponDeactivate(CouponId(id)))
    });

    // Orders routes
    router.add_route(r"^/orders$", || Route::Orders);
    router.add_route(r"^/orders/expire$", || Route::OrdersExpire);
    router.add_route_with_params(r"^/orders/(\d+)$", |params| id_param(&params).map(|id| Route::Order(OrderId(id))));
    router.add_route_with_params(r"^/orders/(\d+)/payment$", |params| {
        id_param(&params).map(|id| Route::OrderPayment(OrderId(id)))
    });
    router.add_route_with_params(r"^/orders/(\d+)/verdict$", |params| {
        id_param(&params).map(|id| Route::OrderVerdict(OrderId(id)))
    });
    router.add_route_with_params(r"^/orders/(\d+)/cancel$", |params| {
        id_param(&params).map(|id| Route::OrderCancel(OrderId(id)))
    });

    // Courses routes
    router.add_route_with_params(r"^/courses/(\d+)/enroll$", |params| {
        id_param(&params).map(|id| Route::CourseEnroll(CourseId(id)))
    });
    router.add_route_with_params(r"^/courses/(\d+)/enrollment$", |params| {
        id_param(&params).map(|id| Route::CourseEnrollment(CourseId(id)))
    });
    router.add_route_with_params(r"^/courses/(\d+)/enrollment/pause$", |params| {
        id_param(&params).map(|id| Route::CourseEnrollmentPause(CourseId(id)))
    });
    router.add_route_with_params(r"^/courses/(\d+)/enrollment/resume$", |params| {
        id_param(&params).map(|id| Route::CourseEnrollmentResume(CourseId(id)))
    });
    router.add_route_with_params(r"^/courses/(\d+)/progress$", |params| {
        id_param(&params).map(|id| Route::CourseProgress(CourseId(id)))
    });

    // Enrollments routes
    router.add_route(r"^/enrollments$", || Route::Enrollments);
    router.add_route_with_params(r"^/enrollments/(\d+)/cancel$", |params| {
        id_param(&params).map(|id| Route::EnrollmentCancel(EnrollmentId(id)))
    });
    router.add_route_with_params(r"^/enrollments/(\d+)/reset$", |params| {
        id_param(&params).map(|id| Route::EnrollmentReset(EnrollmentId(id)))
    });

    // Lessons routes
    router.add_route_with_params(r"^/lessons/(\d+)/progress$", |params| {
        id_param(&params).map(|id| Route::LessonProgress(LessonId(id)))
    });

    // Certificates routes
    router.add_route(r"^/certificates$", || Route::Certificates);
    router.add_route_with_params(r"^/certificates/([A-Za-z0-9-]+)/verify$", |params| {
        params
            .get(0)
            .map(|code| Route::CertificateVerify(CertificateCode(code.to_string())))
    });
    router.add_route_with_params(r"^/certificates/([A-Za-z0-9-]+)/revoke$", |params| {
        params
            .get(0)
            .map(|code| Route::CertificateRevoke(CertificateCode(code.to_string())))
    });

    router
}
