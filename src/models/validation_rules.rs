use std::borrow::Cow;
use std::collections::HashMap;

use validator::ValidationError;

use models::coupons::{Applicability, CreateCouponPayload, DiscountType};

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError {
        code: Cow::from(code),
        message: Some(Cow::from(message)),
        params: HashMap::new(),
    }
}

/// Codes are 4 to 32 latin letters, digits, `-` or `_`
pub fn validate_coupon_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    let allowed = code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if allowed && code.len() >= 4 && code.len() <= 32 {
        Ok(())
    } else {
        Err(error("code", "Code must be 4-32 characters of latin letters, digits, '-' or '_'."))
    }
}

/// Cross-field checks of a new coupon
pub fn validate_coupon_terms(payload: &CreateCouponPayload) -> Result<(), ValidationError> {
    if payload.discount_type == DiscountType::Percentage && payload.value > 100 {
        return Err(error("value", "Percentage discount must be between 1 and 100."));
    }

    if let Some(max_discount) = payload.max_discount {
        if payload.discount_type != DiscountType::Percentage {
            return Err(error("max_discount", "Maximum discount applies to percentage coupons only."));
        }
        if max_discount <= 0 {
            return Err(error("max_discount", "Maximum discount must be positive."));
        }
    }

    if let Some(usage_limit) = payload.usage_limit {
        if usage_limit <= 0 {
            return Err(error("usage_limit", "Usage limit must be positive."));
        }
    }

    if payload.valid_until <= payload.valid_from {
        return Err(error("valid_until", "Coupon must end after it starts."));
    }

    match payload.applicability {
        Applicability::Courses { ref course_ids } if course_ids.is_empty() => {
            Err(error("applicability", "Course scope must list at least one course."))
        }
        Applicability::Categories { ref categories } if categories.iter().all(|c| c.trim().is_empty()) => {
            Err(error("applicability", "Category scope must list at least one category."))
        }
        _ => Ok(()),
    }
}
