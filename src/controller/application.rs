//! hyper `Service` wrapping a `Controller`

use failure::Error as FailureError;
use futures::{future, Future};
use hyper;
use hyper::header::{ContentLength, ContentType};
use hyper::server::{Request, Response, Service};
use hyper::StatusCode;
use serde_json;

use super::error::ErrorMessage;
use super::types::ControllerFuture;

/// Handles a parsed request and answers with a JSON body
pub trait Controller {
    fn call(&self, request: Request) -> ControllerFuture;
}

/// Turns controller answers and errors into http responses
pub struct Application<C: Controller> {
    controller: C,
}

impl<C: Controller> Application<C> {
    pub fn new(controller: C) -> Self {
        Self { controller }
    }
}

fn json_response(status: StatusCode, body: String) -> Response {
    Response::new()
        .with_status(status)
        .with_header(ContentLength(body.len() as u64))
        .with_header(ContentType::json())
        .with_body(body)
}

fn error_response(err: &FailureError) -> Response {
    let (status, message) = ErrorMessage::from_error(err);
    if status == StatusCode::InternalServerError {
        error!("{}", err.iter_chain().map(|cause| cause.to_string()).collect::<Vec<_>>().join(" | "));
    } else {
        debug!("Request failed with {}: {}", status, err);
    }
    let body = serde_json::to_string(&message).unwrap_or_else(|_| r#"{"code":500,"description":"Internal server error"}"#.to_string());
    json_response(status, body)
}

impl<C: Controller> Service for Application<C> {
    type Request = Request;
    type Response = Response;
    type Error = hyper::Error;
    type Future = Box<Future<Item = Response, Error = hyper::Error>>;

    fn call(&self, req: Request) -> Self::Future {
        debug!("Received request: {} {}", req.method(), req.path());

        Box::new(self.controller.call(req).then(|result| {
            let response = match result {
                Ok(body) => json_response(StatusCode::Ok, body),
                Err(err) => error_response(&err),
            };
            future::ok(response)
        }))
    }
}
