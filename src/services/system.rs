//! System service, liveness of the process

use futures::future;

use super::types::ServiceFuture;

pub trait SystemService {
    /// Answers while the reactor is alive
    fn healthcheck(&self) -> ServiceFuture<String>;
}

#[derive(Clone, Default)]
pub struct SystemServiceImpl;

impl SystemService for SystemServiceImpl {
    fn healthcheck(&self) -> ServiceFuture<String> {
        Box::new(future::ok("Ok".to_string()))
    }
}
