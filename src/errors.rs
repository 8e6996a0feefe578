use failure::{Context, Error as FailureError, Fail};
use hyper::StatusCode;
use serde_json;
use validator::ValidationErrors;

/// Error kinds attached as context to `failure::Error` chains.
/// The controller picks the first one found in the chain to build the response.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Parse error")]
    Parse,
    #[fail(display = "Validation error: {}", _0)]
    Validate(ValidationErrors),
    #[fail(display = "{}", _0)]
    RuleViolation(String),
    #[fail(display = "{}", _0)]
    Conflict(String),
    #[fail(display = "Payment provider is unavailable")]
    ExternalDependency,
    #[fail(display = "Server is refusing to fullfil the request: {}", _0)]
    Forbidden(String),
    #[fail(display = "Database connection error")]
    Connection,
}

impl Error {
    /// Converts `Error` to HTTP Status Code
    pub fn code(&self) -> StatusCode {
        match *self {
            Error::NotFound => StatusCode::NotFound,
            Error::Parse | Error::Validate(_) => StatusCode::BadRequest,
            Error::RuleViolation(_) => StatusCode::UnprocessableEntity,
            Error::Conflict(_) => StatusCode::Conflict,
            Error::ExternalDependency => StatusCode::BadGateway,
            Error::Forbidden(_) => StatusCode::Forbidden,
            Error::Connection => StatusCode::InternalServerError,
        }
    }

    /// Message safe to show to the caller
    pub fn message(&self) -> String {
        match *self {
            Error::Validate(ref errors) => serde_json::to_string(errors).unwrap_or_else(|_| "Bad request".to_string()),
            ref other => other.to_string(),
        }
    }
}

/// Finds the first `Error` kind in the chain of causes
pub fn find_kind(err: &FailureError) -> Option<&Error> {
    err.iter_chain()
        .filter_map(|fail| {
            fail.downcast_ref::<Error>()
                .or_else(|| fail.downcast_ref::<Context<Error>>().map(|ctx| ctx.get_context()))
        }).next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_kind_through_contexts() {
        let err: FailureError = format_err!("Coupon 7 has no uses left")
            .context(Error::Conflict("coupon exhausted".to_string()))
            .into();
        let err: FailureError = err.context("Service orders, finalize_order endpoint error occurred.").into();

        match find_kind(&err) {
            Some(Error::Conflict(reason)) => assert_eq!(reason, "coupon exhausted"),
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(find_kind(&err).map(Error::code), Some(StatusCode::Conflict));
    }

    #[test]
    fn test_find_kind_direct_error() {
        let err: FailureError = Error::NotFound.into();
        assert_eq!(find_kind(&err).map(Error::code), Some(StatusCode::NotFound));
    }

    #[test]
    fn test_unclassified_error() {
        let err = format_err!("boom");
        assert!(find_kind(&err).is_none());
    }
}
