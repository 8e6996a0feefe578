//! Client of the external payment provider.
//!
//! The provider is asked for a payment intent when an order is placed and later reports
//! a verdict through the `/orders/:id/verdict` callback. Every call is bounded by
//! `payments.timeout_ms`: when the provider does not answer in time the order stays pending.

use std::time::Duration;

use failure::Error as FailureError;
use failure::Fail;
use futures::future::{self, Either};
use futures::{Future, Stream};
use hyper::client::HttpConnector;
use hyper::header::ContentType;
use hyper::{Client, Method, Request, Uri};
use serde_json;
use tokio_core::reactor::{Handle, Timeout};

use config::Payments;
use types::OrderId;

pub type PaymentFuture<T> = Box<Future<Item = T, Error = FailureError>>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub amount: i64,
    pub currency: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentIntent {
    pub correlation_id: String,
}

pub trait PaymentProvider {
    /// Registers a payment, the provider answers with the id it will quote in its verdict
    fn create_payment(&self, request: PaymentRequest) -> PaymentFuture<PaymentIntent>;
}

/// JSON over HTTP provider
pub struct HttpPaymentProvider {
    client: Client<HttpConnector>,
    handle: Handle,
    config: Payments,
}

impl HttpPaymentProvider {
    pub fn new(config: Payments, handle: &Handle) -> Self {
        Self {
            client: Client::new(handle),
            handle: handle.clone(),
            config,
        }
    }
}

impl PaymentProvider for HttpPaymentProvider {
    fn create_payment(&self, request: PaymentRequest) -> PaymentFuture<PaymentIntent> {
        debug!("Create payment {:?}.", request);
        let url = format!("{}/payments", self.config.url.trim_right_matches('/'));
        let uri = match url.parse::<Uri>() {
            Ok(uri) => uri,
            Err(e) => return Box::new(future::err(e.context(format!("Invalid payment provider url {}", url)).into())),
        };
        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(e) => return Box::new(future::err(e.into())),
        };

        let mut req = Request::new(Method::Post, uri);
        req.headers_mut().set(ContentType::json());
        req.set_body(body);

        let order_id = request.order_id;
        let call = self
            .client
            .request(req)
            .map_err(FailureError::from)
            .and_then(|resp| {
                let status = resp.status();
                resp.body().concat2().map_err(FailureError::from).map(move |chunk| (status, chunk))
            }).and_then(|(status, chunk)| {
                if status.is_success() {
                    serde_json::from_slice::<PaymentIntent>(&chunk).map_err(FailureError::from)
                } else {
                    Err(format_err!(
                        "Payment provider responded with {}: {}",
                        status,
                        String::from_utf8_lossy(&chunk)
                    ))
                }
            }).map_err(move |e: FailureError| -> FailureError { e.context(format!("Create payment for order {} error occurred", order_id)).into() });

        with_timeout(call, self.config.timeout(), &self.handle)
    }
}

/// Fails `fut` when it does not resolve within `timeout`
pub fn with_timeout<F>(fut: F, timeout: Duration, handle: &Handle) -> PaymentFuture<F::Item>
where
    F: Future<Error = FailureError> + 'static,
    F::Item: 'static,
{
    let timer = match Timeout::new(timeout, handle) {
        Ok(timer) => timer,
        Err(e) => return Box::new(future::err(e.into())),
    };

    Box::new(fut.select2(timer).then(move |res| match res {
        Ok(Either::A((item, _))) => Ok(item),
        Ok(Either::B(_)) => Err(format_err!("Payment provider did not answer within {:?}", timeout)),
        Err(Either::A((e, _))) => Err(e),
        Err(Either::B((e, _))) => Err(e.into()),
    }))
}
