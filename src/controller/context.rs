//! Static and per-request context shared by controller and services

use std::sync::Arc;

use futures_cpupool::CpuPool;
use hyper::header::{Authorization, Headers};
use r2d2::{ManageConnection, Pool};

use config::Config;
use models::{Identity, Role};
use payments::PaymentProvider;
use types::UserId;

header! { (XEmailVerified, "X-Email-Verified") => [String] }
header! { (XUserRole, "X-User-Role") => [String] }

/// Resources created once at startup
pub struct StaticContext<M: ManageConnection, F> {
    pub db_pool: Pool<M>,
    pub cpu_pool: CpuPool,
    pub config: Arc<Config>,
    pub repo_factory: F,
    pub payment_provider: Arc<PaymentProvider>,
}

impl<M: ManageConnection, F: Clone> StaticContext<M, F> {
    pub fn new(db_pool: Pool<M>, cpu_pool: CpuPool, config: Arc<Config>, repo_factory: F, payment_provider: Arc<PaymentProvider>) -> Self {
        Self {
            db_pool,
            cpu_pool,
            config,
            repo_factory,
            payment_provider,
        }
    }
}

impl<M: ManageConnection, F: Clone> Clone for StaticContext<M, F> {
    fn clone(&self) -> Self {
        Self {
            db_pool: self.db_pool.clone(),
            cpu_pool: self.cpu_pool.clone(),
            config: self.config.clone(),
            repo_factory: self.repo_factory.clone(),
            payment_provider: self.payment_provider.clone(),
        }
    }
}

/// Caller of the current request, as asserted by the gateway
#[derive(Clone, Debug, Default)]
pub struct DynamicContext {
    pub identity: Option<Identity>,
}

impl DynamicContext {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    /// Reads `Authorization: <user id>`, `X-Email-Verified` and `X-User-Role`
    pub fn from_headers(headers: &Headers) -> Self {
        let user_id = headers
            .get::<Authorization<String>>()
            .and_then(|value| value.0.trim().parse::<i32>().ok())
            .map(UserId);
        let email_verified = headers
            .get::<XEmailVerified>()
            .map(|value| value.0.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let role = match headers.get::<XUserRole>() {
            Some(value) if value.0.trim().eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::User,
        };

        Self::new(user_id.map(|user_id| Identity::new(user_id, email_verified, role)))
    }
}
