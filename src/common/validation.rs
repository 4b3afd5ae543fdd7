// src/common/validation.rs

use rust_decimal::Decimal;
use std::borrow::Cow;
use validator::ValidationError;

// Custom validators for money fields. Messages are catalog keys.

pub fn not_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("not_negative")
            .with_message(Cow::Borrowed("validation.not_negative")));
    }
    Ok(())
}

pub fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("positive").with_message(Cow::Borrowed("validation.positive")));
    }
    Ok(())
}

/// Stock corrections must move something.
pub fn non_zero(value: &i32) -> Result<(), ValidationError> {
    if *value == 0 {
        return Err(ValidationError::new("non_zero").with_message(Cow::Borrowed("validation.non_zero")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_validators() {
        assert!(not_negative(&Decimal::ZERO).is_ok());
        assert!(not_negative(&Decimal::new(-1, 2)).is_err());
        assert!(positive(&Decimal::ZERO).is_err());
        assert!(positive(&Decimal::new(1, 2)).is_ok());
    }

    #[test]
    fn zero_deltas_are_rejected() {
        assert!(non_zero(&0).is_err());
        assert!(non_zero(&-3).is_ok());
    }
}
