use failure::Error as FailureError;
use hyper::StatusCode;

use errors::{find_kind, Error};

/// JSON body of every error response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub code: u16,
    pub description: String,
}

impl ErrorMessage {
    /// Status and body for an error chain. Chains without a known kind are internal errors
    /// and their details stay in the log.
    pub fn from_error(err: &FailureError) -> (StatusCode, Self) {
        let (status, description) = match find_kind(err) {
            Some(kind) => (kind.code(), kind.message()),
            None => (StatusCode::InternalServerError, "Internal server error".to_string()),
        };
        let message = ErrorMessage {
            code: status.as_u16(),
            description,
        };
        (status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_violation_reason_is_shown() {
        let err: FailureError = format_err!("Coupon refused")
            .context(Error::RuleViolation("minimum order value not met".to_string()))
            .into();

        let (status, message) = ErrorMessage::from_error(&err);

        assert_eq!(status, StatusCode::UnprocessableEntity);
        assert_eq!(message.code, 422);
        assert_eq!(message.description, "minimum order value not met");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = format_err!("connection refused by 10.0.0.5");

        let (status, message) = ErrorMessage::from_error(&err);

        assert_eq!(status, StatusCode::InternalServerError);
        assert_eq!(message.description, "Internal server error");
    }
}
