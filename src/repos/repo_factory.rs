use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;

use repos::*;

pub trait ReposFactory<C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static>: Clone + Send + 'static {
    fn create_catalog_repo<'a>(&self, db_conn: &'a C) -> Box<CatalogRepo + 'a>;
    fn create_coupons_repo<'a>(&self, db_conn: &'a C) -> Box<CouponsRepo + 'a>;
    fn create_coupon_scopes_repo<'a>(&self, db_conn: &'a C) -> Box<CouponScopesRepo + 'a>;
    fn create_coupon_usages_repo<'a>(&self, db_conn: &'a C) -> Box<CouponUsagesRepo + 'a>;
    fn create_orders_repo<'a>(&self, db_conn: &'a C) -> Box<OrdersRepo + 'a>;
    fn create_enrollments_repo<'a>(&self, db_conn: &'a C) -> Box<EnrollmentsRepo + 'a>;
    fn create_lesson_progress_repo<'a>(&self, db_conn: &'a C) -> Box<LessonProgressRepo + 'a>;
    fn create_certificates_repo<'a>(&self, db_conn: &'a C) -> Box<CertificatesRepo + 'a>;
}

#[derive(Clone, Default)]
pub struct ReposFactoryImpl;

impl<C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> ReposFactory<C> for ReposFactoryImpl {
    fn create_catalog_repo<'a>(&self, db_conn: &'a C) -> Box<CatalogRepo + 'a> {
        Box::new(CatalogRepoImpl::new(db_conn)) as Box<CatalogRepo>
    }
    fn create_coupons_repo<'a>(&self, db_conn: &'a C) -> Box<CouponsRepo + 'a> {
        Box::new(CouponsRepoImpl::new(db_conn)) as Box<CouponsRepo>
    }
    fn create_coupon_scopes_repo<'a>(&self, db_conn: &'a C) -> Box<CouponScopesRepo + 'a> {
        Box::new(CouponScopesRepoImpl::new(db_conn)) as Box<CouponScopesRepo>
    }
    fn create_coupon_usages_repo<'a>(&self, db_conn: &'a C) -> Box<CouponUsagesRepo + 'a> {
        Box::new(CouponUsagesRepoImpl::new(db_conn)) as Box<CouponUsagesRepo>
    }
    fn create_orders_repo<'a>(&self, db_conn: &'a C) -> Box<OrdersRepo + 'a> {
        Box::new(OrdersRepoImpl::new(db_conn)) as Box<OrdersRepo>
    }
    fn create_enrollments_repo<'a>(&self, db_conn: &'a C) -> Box<EnrollmentsRepo + 'a> {
        Box::new(EnrollmentsRepoImpl::new(db_conn)) as Box<EnrollmentsRepo>
    }
    fn create_lesson_progress_repo<'a>(&self, db_conn: &'a C) -> Box<LessonProgressRepo + 'a> {
        Box::new(LessonProgressRepoImpl::new(db_conn)) as Box<LessonProgressRepo>
    }
    fn create_certificates_repo<'a>(&self, db_conn: &'a C) -> Box<CertificatesRepo + 'a> {
        Box::new(CertificatesRepoImpl::new(db_conn)) as Box<CertificatesRepo>
    }
}

#[cfg(test)]
pub mod tests {
    use std::error::Error;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime};

    use diesel::connection::AnsiTransactionManager;
    use diesel::connection::SimpleConnection;
    use diesel::deserialize::QueryableByName;
    use diesel::pg::Pg;
    use diesel::query_builder::AsQuery;
    use diesel::query_builder::QueryFragment;
    use diesel::query_builder::QueryId;
    use diesel::sql_types::HasSqlType;
    use diesel::Connection;
    use diesel::ConnectionResult;
    use diesel::QueryResult;
    use diesel::Queryable;
    use futures::future;
    use futures_cpupool::CpuPool;
    use r2d2;
    use r2d2::ManageConnection;

    use config::Config;
    use controller::context::*;
    use models::*;
    use payments::{PaymentFuture, PaymentIntent, PaymentProvider, PaymentRequest};
    use repos::*;
    use services::*;
    use types::*;

    pub static MOCK_USER_ID: UserId = UserId(1);
    pub static MOCK_ADMIN_ID: UserId = UserId(100);
    pub static MOCK_FREE_COURSE_ID: CourseId = CourseId(1);
    pub static MOCK_PAID_COURSE_ID: CourseId = CourseId(2);
    pub static MOCK_DESIGN_COURSE_ID: CourseId = CourseId(3);

    /// Rows of every table, shared by all repos created from one factory
    #[derive(Default)]
    pub struct MockDb {
        pub next_id: i32,
        pub courses: Vec<Course>,
        pub lessons: Vec<Lesson>,
        pub users: Vec<UserProfile>,
        pub coupons: Vec<Coupon>,
        pub scope_courses: Vec<CouponScopeCourse>,
        pub scope_categories: Vec<CouponScopeCategory>,
        pub coupon_usages: Vec<CouponUsage>,
        pub orders: Vec<Order>,
        pub enrollments: Vec<Enrollment>,
        pub lesson_progress: Vec<LessonProgress>,
        pub certificates: Vec<Certificate>,
    }

    impl MockDb {
        fn next_id(&mut self) -> i32 {
            self.next_id += 1;
            self.next_id
        }
    }

    #[derive(Clone, Default)]
    pub struct ReposFactoryMock {
        pub db: Arc<Mutex<MockDb>>,
    }

    impl ReposFactoryMock {
        /// Catalog with a free course of two lessons, a paid programming course of ten lessons
        /// and a paid design course of one lesson
        pub fn with_catalog() -> Self {
            let factory = Self::default();
            {
                let mut db = factory.db.lock().unwrap();
                db.courses = vec![
                    create_course(MOCK_FREE_COURSE_ID, "programming", 0),
                    create_course(MOCK_PAID_COURSE_ID, "programming", 800),
                    create_course(MOCK_DESIGN_COURSE_ID, "design", 1500),
                ];
                db.lessons = (1..3)
                    .map(|n| create_lesson(LessonId(n), MOCK_FREE_COURSE_ID, n))
                    .chain((11..21).map(|n| create_lesson(LessonId(n), MOCK_PAID_COURSE_ID, n)))
                    .chain(Some(create_lesson(LessonId(31), MOCK_DESIGN_COURSE_ID, 1)))
                    .collect();
                db.users = vec![
                    UserProfile {
                        id: MOCK_USER_ID,
                        name: "Ada Lovelace".to_string(),
                    },
                    UserProfile {
                        id: UserId(2),
                        name: "Alan Turing".to_string(),
                    },
                ];
                db.next_id = 1000;
            }
            factory
        }

        pub fn add_coupon(&self, payload: NewCoupon, applicability: Applicability) -> Coupon {
            let coupon = CouponsRepoMock { db: self.db.clone() }.create(payload).unwrap();
            CouponScopesRepoMock { db: self.db.clone() }
                .create(coupon.id, &applicability)
                .unwrap();
            coupon
        }
    }

    impl<C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> ReposFactory<C> for ReposFactoryMock {
        fn create_catalog_repo<'a>(&self, _db_conn: &'a C) -> Box<CatalogRepo + 'a> {
            Box::new(CatalogRepoMock { db: self.db.clone() }) as Box<CatalogRepo>
        }
        fn create_coupons_repo<'a>(&self, _db_conn: &'a C) -> Box<CouponsRepo + 'a> {
            Box::new(CouponsRepoMock { db: self.db.clone() }) as Box<CouponsRepo>
        }
        fn create_coupon_scopes_repo<'a>(&self, _db_conn: &'a C) -> Box<CouponScopesRepo + 'a> {
            Box::new(CouponScopesRepoMock { db: self.db.clone() }) as Box<CouponScopesRepo>
        }
        fn create_coupon_usages_repo<'a>(&self, _db_conn: &'a C) -> Box<CouponUsagesRepo + 'a> {
            Box::new(CouponUsagesRepoMock { db: self.db.clone() }) as Box<CouponUsagesRepo>
        }
        fn create_orders_repo<'a>(&self, _db_conn: &'a C) -> Box<OrdersRepo + 'a> {
            Box::new(OrdersRepoMock { db: self.db.clone() }) as Box<OrdersRepo>
        }
        fn create_enrollments_repo<'a>(&self, _db_conn: &'a C) -> Box<EnrollmentsRepo + 'a> {
            Box::new(EnrollmentsRepoMock { db: self.db.clone() }) as Box<EnrollmentsRepo>
        }
        fn create_lesson_progress_repo<'a>(&self, _db_conn: &'a C) -> Box<LessonProgressRepo + 'a> {
            Box::new(LessonProgressRepoMock { db: self.db.clone() }) as Box<LessonProgressRepo>
        }
        fn create_certificates_repo<'a>(&self, _db_conn: &'a C) -> Box<CertificatesRepo + 'a> {
            Box::new(CertificatesRepoMock { db: self.db.clone() }) as Box<CertificatesRepo>
        }
    }

    #[derive(Clone)]
    pub struct CatalogRepoMock {
        db: Arc<Mutex<MockDb>>,
    }

    impl CatalogRepo for CatalogRepoMock {
        fn get_course(&self, id_arg: CourseId) -> RepoResult<Option<Course>> {
            let db = self.db.lock().unwrap();
            Ok(db.courses.iter().find(|c| c.id == id_arg).cloned())
        }

        fn list_lessons(&self, course_id_arg: CourseId) -> RepoResult<Vec<Lesson>> {
            let db = self.db.lock().unwrap();
            Ok(db.lessons.iter().filter(|l| l.course_id == course_id_arg).cloned().collect())
        }

        fn get_lesson(&self, id_arg: LessonId) -> RepoResult<Option<Lesson>> {
            let db = self.db.lock().unwrap();
            Ok(db.lessons.iter().find(|l| l.id == id_arg).cloned())
        }

        fn get_user(&self, id_arg: UserId) -> RepoResult<Option<UserProfile>> {
            let db = self.db.lock().unwrap();
            Ok(db.users.iter().find(|u| u.id == id_arg).cloned())
        }
    }

    #[derive(Clone)]
    pub struct CouponsRepoMock {
        db: Arc<Mutex<MockDb>>,
    }

    impl CouponsRepo for CouponsRepoMock {
        fn create(&self, payload: NewCoupon) -> RepoResult<Coupon> {
            let mut db = self.db.lock().unwrap();
            let code = payload.code.normalized();
            if db.coupons.iter().any(|c| c.code == code) {
                return Err(format_err!("duplicate key value violates unique constraint \"coupons_code_idx\""));
            }
            let now = SystemTime::now();
            let coupon = Coupon {
                id: CouponId(db.next_id()),
                code,
                title: payload.title,
                discount_type: payload.discount_type,
                value: payload.value,
                max_discount: payload.max_discount,
                min_order_value: payload.min_order_value,
                scope: payload.scope,
                usage_limit: payload.usage_limit,
                used_count: 0,
                per_user_limit: payload.per_user_limit,
                is_active: true,
                valid_from: payload.valid_from,
                valid_until: payload.valid_until,
                created_at: now,
                updated_at: now,
            };
            db.coupons.push(coupon.clone());
            Ok(coupon)
        }

        fn list(&self) -> RepoResult<Vec<Coupon>> {
            Ok(self.db.lock().unwrap().coupons.clone())
        }

        fn get(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>> {
            let db = self.db.lock().unwrap();
            Ok(db.coupons.iter().find(|c| c.id == id_arg).cloned())
        }

        fn get_for_update(&self, id_arg: CouponId) -> RepoResult<Option<Coupon>> {
            self.get(id_arg)
        }

        fn get_by_code(&self, code_arg: CouponCode) -> RepoResult<Option<Coupon>> {
            let db = self.db.lock().unwrap();
            let code_arg = code_arg.normalized();
            Ok(db.coupons.iter().find(|c| c.code == code_arg).cloned())
        }

        fn deactivate(&self, id_arg: CouponId) -> RepoResult<Coupon> {
            let mut db = self.db.lock().unwrap();
            let coupon = db
                .coupons
                .iter_mut()
                .find(|c| c.id == id_arg)
                .ok_or_else(|| format_err!("Record not found"))?;
            coupon.is_active = false;
            Ok(coupon.clone())
        }

        fn try_increment_usage(&self, id_arg: CouponId) -> RepoResult<bool> {
            let mut db = self.db.lock().unwrap();
            match db.coupons.iter_mut().find(|c| c.id == id_arg) {
                Some(coupon) => if coupon.has_uses_left() {
                    coupon.used_count += 1;
                    Ok(true)
                } else {
                    Ok(false)
                },
                None => Ok(false),
            }
        }
    }

    #[derive(Clone)]
    pub struct CouponScopesRepoMock {
        db: Arc<Mutex<MockDb>>,
    }

    impl CouponScopesRepo for CouponScopesRepoMock {
        fn create(&self, coupon_id_arg: CouponId, applicability: &Applicability) -> RepoResult<()> {
            let mut db = self.db.lock().unwrap();
            match *applicability {
                Applicability::All => {}
                Applicability::Courses { ref course_ids } => for course_id in course_ids {
                    let id = db.next_id();
                    db.scope_courses.push(CouponScopeCourse {
                        id,
                        coupon_id: coupon_id_arg,
                        course_id: *course_id,
                    });
                },
                Applicability::Categories { ref categories } => for category in categories {
                    let id = db.next_id();
                    db.scope_categories.push(CouponScopeCategory {
                        id,
                        coupon_id: coupon_id_arg,
                        category: category.clone(),
                    });
                },
            }
            Ok(())
        }

        fn applicability(&self, coupon: &Coupon) -> RepoResult<Applicability> {
            let db = self.db.lock().unwrap();
            Ok(match coupon.scope {
                CouponScope::All => Applicability::All,
                CouponScope::Courses => Applicability::Courses {
                    course_ids: db
                        .scope_courses
                        .iter()
                        .filter(|s| s.coupon_id == coupon.id)
                        .map(|s| s.course_id)
                        .collect(),
                },
                CouponScope::Categories => Applicability::Categories {
                    categories: db
                        .scope_categories
                        .iter()
                        .filter(|s| s.coupon_id == coupon.id)
                        .map(|s| s.category.clone())
                        .collect(),
                },
            })
        }
    }

    #[derive(Clone)]
    pub struct CouponUsagesRepoMock {
        db: Arc<Mutex<MockDb>>,
    }

    impl CouponUsagesRepo for CouponUsagesRepoMock {
        fn create(&self, payload: NewCouponUsage) -> RepoResult<CouponUsage> {
            let mut db = self.db.lock().unwrap();
            if db.coupon_usages.iter().any(|u| u.order_id == payload.order_id) {
                return Err(format_err!("duplicate key value violates unique constraint \"coupon_usages_order_id_key\""));
            }
            let usage = CouponUsage {
                id: db.next_id(),
                coupon_id: payload.coupon_id,
                user_id: payload.user_id,
                order_id: payload.order_id,
                course_id: payload.course_id,
                discount_amount: payload.discount_amount,
                original_amount: payload.original_amount,
                final_amount: payload.final_amount,
                created_at: SystemTime::now(),
            };
            db.coupon_usages.push(usage.clone());
            Ok(usage)
        }

        fn count_by_user(&self, coupon_id_arg: CouponId, user_id_arg: UserId) -> RepoResult<i64> {
            let db = self.db.lock().unwrap();
            Ok(db
                .coupon_usages
                .iter()
                .filter(|u| u.coupon_id == coupon_id_arg && u.user_id == user_id_arg)
                .count() as i64)
        }
    }

    #[derive(Clone)]
    pub struct OrdersRepoMock {
        db: Arc<Mutex<MockDb>>,
    }

    impl OrdersRepoMock {
        fn transition<Func: FnOnce(&mut Order)>(&self, id_arg: OrderId, f: Func) -> RepoResult<Option<Order>> {
            let mut db = self.db.lock().unwrap();
            Ok(db
                .orders
                .iter_mut()
                .find(|o| o.id == id_arg && o.status == OrderStatus::Pending)
                .map(|order| {
                    f(order);
                    order.updated_at = SystemTime::now();
                    order.clone()
                }))
        }
    }

    impl OrdersRepo for OrdersRepoMock {
        fn create(&self, payload: NewOrder) -> RepoResult<Order> {
            let mut db = self.db.lock().unwrap();
            let now = SystemTime::now();
            let order = Order {
                id: OrderId(db.next_id()),
                user_id: payload.user_id,
                course_id: payload.course_id,
                status: payload.status,
                original_amount: payload.original_amount,
                discount_amount: payload.discount_amount,
                amount: payload.amount,
                currency: payload.currency,
                payment_method: payload.payment_method,
                coupon_id: payload.coupon_id,
                coupon_code: payload.coupon_code,
                correlation_id: None,
                provider_transaction_id: None,
                failure_reason: None,
                refund_required: false,
                paid_at: None,
                created_at: now,
                updated_at: now,
            };
            db.orders.push(order.clone());
            Ok(order)
        }

        fn get(&self, id_arg: OrderId) -> RepoResult<Option<Order>> {
            let db = self.db.lock().unwrap();
            Ok(db.orders.iter().find(|o| o.id == id_arg).cloned())
        }

        fn get_for_update(&self, id_arg: OrderId) -> RepoResult<Option<Order>> {
            self.get(id_arg)
        }

        fn list_by_user(&self, user_id_arg: UserId) -> RepoResult<Vec<Order>> {
            let db = self.db.lock().unwrap();
            Ok(db.orders.iter().rev().filter(|o| o.user_id == user_id_arg).cloned().collect())
        }

        fn list_pending_created_before(&self, created_before: SystemTime) -> RepoResult<Vec<Order>> {
            let db = self.db.lock().unwrap();
            Ok(db
                .orders
                .iter()
                .filter(|o| o.status == OrderStatus::Pending && o.created_at < created_before)
                .cloned()
                .collect())
        }

        fn set_correlation_id(&self, id_arg: OrderId, correlation_id_arg: String) -> RepoResult<Option<Order>> {
            self.transition(id_arg, |order| order.correlation_id = Some(correlation_id_arg))
        }

        fn complete(&self, id_arg: OrderId, provider_transaction_id_arg: Option<String>) -> RepoResult<Option<Order>> {
            self.transition(id_arg, |order| {
                order.status = OrderStatus::Completed;
                order.provider_transaction_id = provider_transaction_id_arg;
                order.paid_at = Some(SystemTime::now());
            })
        }

        fn fail(&self, id_arg: OrderId, reason: String, refund_required_arg: bool) -> RepoResult<Option<Order>> {
            self.transition(id_arg, |order| {
                order.status = OrderStatus::Failed;
                order.failure_reason = Some(reason);
                order.refund_required = refund_required_arg;
            })
        }
    }

    #[derive(Clone)]
    pub struct EnrollmentsRepoMock {
        db: Arc<Mutex<MockDb>>,
    }

    impl EnrollmentsRepoMock {
        fn modify<Func: FnOnce(&mut Enrollment)>(&self, id_arg: EnrollmentId, f: Func) -> RepoResult<Enrollment> {
            let mut db = self.db.lock().unwrap();
            let enrollment = db
                .enrollments
                .iter_mut()
                .find(|e| e.id == id_arg)
                .ok_or_else(|| format_err!("Record not found"))?;
            f(enrollment);
            enrollment.updated_at = SystemTime::now();
            Ok(enrollment.clone())
        }
    }

    impl EnrollmentsRepo for EnrollmentsRepoMock {
        fn create_if_absent(&self, payload: NewEnrollment) -> RepoResult<Option<Enrollment>> {
            let mut db = self.db.lock().unwrap();
            if db
                .enrollments
                .iter()
                .any(|e| e.user_id == payload.user_id && e.course_id == payload.course_id)
            {
                return Ok(None);
            }
            let now = SystemTime::now();
            let enrollment = Enrollment {
                id: EnrollmentId(db.next_id()),
                user_id: payload.user_id,
                course_id: payload.course_id,
                completed_lessons: vec![],
                progress: 0,
                status: payload.status,
                source: payload.source,
                order_id: payload.order_id,
                certificate_issued: false,
                enrolled_at: now,
                updated_at: now,
            };
            db.enrollments.push(enrollment.clone());
            Ok(Some(enrollment))
        }

        fn get(&self, id_arg: EnrollmentId) -> RepoResult<Option<Enrollment>> {
            let db = self.db.lock().unwrap();
            Ok(db.enrollments.iter().find(|e| e.id == id_arg).cloned())
        }

        fn get_by_user_course(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Option<Enrollment>> {
            let db = self.db.lock().unwrap();
            Ok(db
                .enrollments
                .iter()
                .find(|e| e.user_id == user_id_arg && e.course_id == course_id_arg)
                .cloned())
        }

        fn get_for_update(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Option<Enrollment>> {
            self.get_by_user_course(user_id_arg, course_id_arg)
        }

        fn list_by_user(&self, user_id_arg: UserId) -> RepoResult<Vec<Enrollment>> {
            let db = self.db.lock().unwrap();
            Ok(db.enrollments.iter().filter(|e| e.user_id == user_id_arg).cloned().collect())
        }

        fn set_status(&self, id_arg: EnrollmentId, status_arg: EnrollmentStatus) -> RepoResult<Enrollment> {
            self.modify(id_arg, |e| e.status = status_arg)
        }

        fn reactivate(
            &self,
            id_arg: EnrollmentId,
            status_arg: EnrollmentStatus,
            source_arg: EnrollmentSource,
            order_id_arg: Option<OrderId>,
        ) -> RepoResult<Enrollment> {
            self.modify(id_arg, |e| {
                e.status = status_arg;
                e.source = source_arg;
                e.order_id = order_id_arg;
            })
        }

        fn update_progress(&self, id_arg: EnrollmentId, payload: EnrollmentProgress) -> RepoResult<Enrollment> {
            self.modify(id_arg, |e| {
                e.completed_lessons = payload.completed_lessons;
                e.progress = payload.progress;
                e.status = payload.status;
            })
        }

        fn mark_certificate_issued(&self, id_arg: EnrollmentId) -> RepoResult<Enrollment> {
            self.modify(id_arg, |e| e.certificate_issued = true)
        }
    }

    #[derive(Clone)]
    pub struct LessonProgressRepoMock {
        db: Arc<Mutex<MockDb>>,
    }

    impl LessonProgressRepo for LessonProgressRepoMock {
        fn get(&self, user_id_arg: UserId, lesson_id_arg: LessonId) -> RepoResult<Option<LessonProgress>> {
            let db = self.db.lock().unwrap();
            Ok(db
                .lesson_progress
                .iter()
                .find(|p| p.user_id == user_id_arg && p.lesson_id == lesson_id_arg)
                .cloned())
        }

        fn upsert(&self, payload: LessonProgressValues) -> RepoResult<LessonProgress> {
            let mut db = self.db.lock().unwrap();
            let existing = db
                .lesson_progress
                .iter()
                .position(|p| p.user_id == payload.user_id && p.lesson_id == payload.lesson_id);
            let id = match existing {
                Some(index) => db.lesson_progress.remove(index).id,
                None => db.next_id(),
            };
            let row = LessonProgress {
                id,
                user_id: payload.user_id,
                course_id: payload.course_id,
                lesson_id: payload.lesson_id,
                is_completed: payload.is_completed,
                watched_duration: payload.watched_duration,
                total_duration: payload.total_duration,
                quiz_score: payload.quiz_score,
                quiz_attempts: payload.quiz_attempts,
                completed_at: payload.completed_at,
                updated_at: SystemTime::now(),
            };
            db.lesson_progress.push(row.clone());
            Ok(row)
        }

        fn list_by_user_course(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Vec<LessonProgress>> {
            let db = self.db.lock().unwrap();
            Ok(db
                .lesson_progress
                .iter()
                .filter(|p| p.user_id == user_id_arg && p.course_id == course_id_arg)
                .cloned()
                .collect())
        }

        fn reset_completion(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<usize> {
            let mut db = self.db.lock().unwrap();
            let mut updated = 0;
            for row in db
                .lesson_progress
                .iter_mut()
                .filter(|p| p.user_id == user_id_arg && p.course_id == course_id_arg)
            {
                row.is_completed = false;
                row.completed_at = None;
                updated += 1;
            }
            Ok(updated)
        }
    }

    #[derive(Clone)]
    pub struct CertificatesRepoMock {
        db: Arc<Mutex<MockDb>>,
    }

    impl CertificatesRepo for CertificatesRepoMock {
        fn create_if_absent(&self, payload: NewCertificate) -> RepoResult<Option<Certificate>> {
            let mut db = self.db.lock().unwrap();
            if db
                .certificates
                .iter()
                .any(|c| c.user_id == payload.user_id && c.course_id == payload.course_id)
            {
                return Ok(None);
            }
            let certificate = Certificate {
                id: db.next_id(),
                certificate_id: payload.certificate_id,
                user_id: payload.user_id,
                course_id: payload.course_id,
                issued_at: SystemTime::now(),
                completion_percentage: payload.completion_percentage,
                final_score: payload.final_score,
                is_valid: true,
                revoked_at: None,
                revoked_by: None,
                revocation_reason: None,
            };
            db.certificates.push(certificate.clone());
            Ok(Some(certificate))
        }

        fn get_by_user_course(&self, user_id_arg: UserId, course_id_arg: CourseId) -> RepoResult<Option<Certificate>> {
            let db = self.db.lock().unwrap();
            Ok(db
                .certificates
                .iter()
                .find(|c| c.user_id == user_id_arg && c.course_id == course_id_arg)
                .cloned())
        }

        fn get_by_code(&self, code_arg: CertificateCode) -> RepoResult<Option<Certificate>> {
            let db = self.db.lock().unwrap();
            Ok(db.certificates.iter().find(|c| c.certificate_id == code_arg).cloned())
        }

        fn list_by_user(&self, user_id_arg: UserId) -> RepoResult<Vec<Certificate>> {
            let db = self.db.lock().unwrap();
            Ok(db.certificates.iter().filter(|c| c.user_id == user_id_arg).cloned().collect())
        }

        fn revoke(&self, code_arg: CertificateCode, revoked_by_arg: UserId, reason: Option<String>) -> RepoResult<Option<Certificate>> {
            let mut db = self.db.lock().unwrap();
            Ok(db
                .certificates
                .iter_mut()
                .find(|c| c.certificate_id == code_arg && c.is_valid)
                .map(|certificate| {
                    certificate.is_valid = false;
                    certificate.revoked_at = Some(SystemTime::now());
                    certificate.revoked_by = Some(revoked_by_arg);
                    certificate.revocation_reason = reason;
                    certificate.clone()
                }))
        }
    }

    /// Answers every payment request with a correlation id derived from the order
    #[derive(Clone, Default)]
    pub struct PaymentProviderMock {
        pub unavailable: bool,
    }

    impl PaymentProvider for PaymentProviderMock {
        fn create_payment(&self, request: PaymentRequest) -> PaymentFuture<PaymentIntent> {
            if self.unavailable {
                Box::new(future::err(format_err!("Payment provider responded with 503")))
            } else {
                Box::new(future::ok(PaymentIntent {
                    correlation_id: format!("corr-{}", request.order_id),
                }))
            }
        }
    }

    pub fn create_service(
        identity: Option<Identity>,
        repo_factory: ReposFactoryMock,
        payment_provider: PaymentProviderMock,
    ) -> Service<MockConnectionManager, ReposFactoryMock> {
        let manager = MockConnectionManager::default();
        let db_pool = r2d2::Pool::builder().build(manager).expect("Failed to create connection pool");
        let cpu_pool = CpuPool::new(2);

        let config = Config::with_env("test").unwrap();
        let static_context = StaticContext::new(db_pool, cpu_pool, Arc::new(config), repo_factory, Arc::new(payment_provider));
        let dynamic_context = DynamicContext::new(identity);

        Service::new(static_context, dynamic_context)
    }

    pub fn learner(user_id: UserId) -> Option<Identity> {
        Some(Identity::new(user_id, true, Role::User))
    }

    pub fn admin() -> Option<Identity> {
        Some(Identity::new(MOCK_ADMIN_ID, true, Role::Admin))
    }

    pub fn create_course(id: CourseId, category: &str, price: i64) -> Course {
        Course {
            id,
            title: format!("Course {}", id),
            category: category.to_string(),
            price,
            currency: "USD".to_string(),
            instructor_name: "Grace Hopper".to_string(),
            is_published: true,
        }
    }

    pub fn create_lesson(id: LessonId, course_id: CourseId, position: i32) -> Lesson {
        Lesson {
            id,
            course_id,
            title: format!("Lesson {}", id),
            duration: 600,
            position,
        }
    }

    /// Coupon valid from an hour ago for a day
    pub fn create_new_coupon(code: &str, discount_type: DiscountType, value: i64) -> NewCoupon {
        let now = SystemTime::now();
        NewCoupon {
            code: CouponCode(code.to_string()),
            title: code.to_string(),
            discount_type,
            value,
            max_discount: None,
            min_order_value: 0,
            scope: CouponScope::All,
            usage_limit: None,
            per_user_limit: 1,
            valid_from: now - Duration::from_secs(3600),
            valid_until: now + Duration::from_secs(24 * 3600),
        }
    }

    #[derive(Default)]
    pub struct MockConnection {
        tr: AnsiTransactionManager,
    }

    impl Connection for MockConnection {
        type Backend = Pg;
        type TransactionManager = AnsiTransactionManager;

        fn establish(_database_url: &str) -> ConnectionResult<MockConnection> {
            Ok(MockConnection::default())
        }

        fn execute(&self, _query: &str) -> QueryResult<usize> {
            unimplemented!()
        }

        fn query_by_index<T, U>(&self, _source: T) -> QueryResult<Vec<U>>
        where
            T: AsQuery,
            T::Query: QueryFragment<Pg> + QueryId,
            Pg: HasSqlType<T::SqlType>,
            U: Queryable<T::SqlType, Pg>,
        {
            unimplemented!()
        }

        fn query_by_name<T, U>(&self, _source: &T) -> QueryResult<Vec<U>>
        where
            T: QueryFragment<Pg> + QueryId,
            U: QueryableByName<Pg>,
        {
            unimplemented!()
        }

        fn execute_returning_count<T>(&self, _source: &T) -> QueryResult<usize>
        where
            T: QueryFragment<Pg> + QueryId,
        {
            unimplemented!()
        }

        fn transaction_manager(&self) -> &Self::TransactionManager {
            &self.tr
        }
    }

    impl SimpleConnection for MockConnection {
        fn batch_execute(&self, _query: &str) -> QueryResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockConnectionManager;

    impl ManageConnection for MockConnectionManager {
        type Connection = MockConnection;
        type Error = MockError;

        fn connect(&self) -> Result<MockConnection, MockError> {
            Ok(MockConnection::default())
        }

        fn is_valid(&self, _conn: &mut MockConnection) -> Result<(), MockError> {
            Ok(())
        }

        fn has_broken(&self, _conn: &mut MockConnection) -> bool {
            false
        }
    }

    #[derive(Debug)]
    pub struct MockError {}

    impl fmt::Display for MockError {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "Mock connection error")
        }
    }

    impl Error for MockError {
        fn description(&self) -> &str {
            "Mock connection error"
        }

        fn cause(&self) -> Option<&Error> {
            None
        }
    }
}
