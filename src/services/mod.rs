//! Services is a core layer for the app business logic like
//! validation, authorization, etc.

pub mod certificates;
pub mod coupons;
pub mod enrollments;
pub mod orders;
pub mod progress;
pub mod system;
pub mod types;

pub use self::certificates::*;
pub use self::coupons::*;
pub use self::enrollments::*;
pub use self::orders::*;
pub use self::progress::*;
pub use self::system::*;
pub use self::types::*;

use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;
use failure::Error as FailureError;
use failure::Fail;
use futures_cpupool::CpuPool;
use r2d2::{ManageConnection, PooledConnection};

use self::types::ServiceFuture;
use controller::context::{DynamicContext, StaticContext};
use errors::Error;
use models::Identity;
use repos::repo_factory::ReposFactory;

/// Service
pub struct Service<M: ManageConnection, F> {
    pub static_context: StaticContext<M, F>,
    pub dynamic_context: DynamicContext,
}

impl<M: ManageConnection, F: Clone> Clone for Service<M, F> {
    fn clone(&self) -> Self {
        Self {
            static_context: self.static_context.clone(),
            dynamic_context: self.dynamic_context.clone(),
        }
    }
}

impl<
        T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static,
        M: ManageConnection<Connection = T>,
        F: ReposFactory<T>,
    > Service<M, F>
{
    /// Create a new service
    pub fn new(static_context: StaticContext<M, F>, dynamic_context: DynamicContext) -> Self {
        Self {
            static_context,
            dynamic_context,
        }
    }

    /// Runs a unit of database work on the cpu pool with a pooled connection
    pub fn spawn_on_pool<R, Func>(&self, f: Func) -> ServiceFuture<R>
    where
        Func: FnOnce(PooledConnection<M>) -> Result<R, FailureError> + Send + 'static,
        R: Send + 'static,
    {
        let db_pool = self.static_context.db_pool.clone();
        let cpu_pool: CpuPool = self.static_context.cpu_pool.clone();
        Box::new(cpu_pool.spawn_fn(move || {
            db_pool
                .get()
                .map_err(|e| e.context(Error::Connection).into())
                .and_then(f)
        }))
    }

    /// Any authenticated caller
    pub fn require_identity(&self) -> Result<Identity, FailureError> {
        self.dynamic_context
            .identity
            .ok_or_else(|| format_err!("Request without user id").context(Error::Forbidden("authentication required".to_string())).into())
    }

    /// Callers allowed to buy or enroll
    pub fn require_verified_identity(&self) -> Result<Identity, FailureError> {
        let identity = self.require_identity()?;
        if identity.email_verified {
            Ok(identity)
        } else {
            Err(format_err!("User {} has not verified e-mail", identity.user_id)
                .context(Error::Forbidden("e-mail is not verified".to_string()))
                .into())
        }
    }

    pub fn require_admin(&self) -> Result<Identity, FailureError> {
        let identity = self.require_identity()?;
        if identity.is_admin() {
            Ok(identity)
        } else {
            Err(format_err!("User {} is not an administrator", identity.user_id)
                .context(Error::Forbidden("administrator only".to_string()))
                .into())
        }
    }
}
