//! Custom `validator` rules shared by request types

use std::borrow::Cow;
use validator::ValidationError;

#[allow(clippy::expect_used)]
mod patterns {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        pub static ref ISO_DATE: Regex = Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("static pattern compiles");
        pub static ref PRESCRIPTION_NUMBER: Regex = Regex::new(r"^[0-9]{6}$").expect("static pattern compiles");
    }
}

/// Upper bound on application dates in one request
pub const MAX_APPLY_DATES: usize = 16;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

pub fn is_iso_date(value: &str) -> bool {
    patterns::ISO_DATE.is_match(value)
}

pub fn iso_date(value: &str) -> Result<(), ValidationError> {
    if is_iso_date(value.trim()) {
        Ok(())
    } else {
        Err(error("iso_date", "expected a date formatted YYYY-MM-DD"))
    }
}

pub fn iso_dates(values: &[String]) -> Result<(), ValidationError> {
    if values.iter().all(|v| is_iso_date(v.trim())) {
        Ok(())
    } else {
        Err(error("iso_date", "every date must be formatted YYYY-MM-DD"))
    }
}

pub fn prescription_number(value: &str) -> Result<(), ValidationError> {
    if patterns::PRESCRIPTION_NUMBER.is_match(value.trim()) {
        Ok(())
    } else {
        Err(error("prescription_number", "prescription number must be exactly 6 digits"))
    }
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("blank", "must not be blank"))
    } else {
        Ok(())
    }
}

/// Trim and upper-case free text the way every catalog stores it.
pub fn upper(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Like [`upper`], mapping blank input to `None`.
pub fn upper_opt(value: Option<&str>) -> Option<String> {
    value.map(upper).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prescription_number() {
        assert!(prescription_number("123456").is_ok());
        assert!(prescription_number("12345").is_err());
        assert!(prescription_number("1234567").is_err());
        assert!(prescription_number("12345a").is_err());
    }

    #[test]
    fn test_non_ascii_digits_are_rejected() {
        assert!(prescription_number("١٢٣٤٥٦").is_err());
        assert!(prescription_number("１２３４５６").is_err());
        assert!(iso_date("٢٠٢٥-٠١-٠١").is_err());
        assert!(!is_iso_date("２０２５-０１-０１"));
    }

    #[test]
    fn test_iso_dates() {
        assert!(iso_dates(&["2024-01-01".to_string(), "2024-01-02".to_string()]).is_ok());
        assert!(iso_dates(&["2024-01-01".to_string(), "01-02-2024".to_string()]).is_err());
        assert!(iso_date("2024-1-1").is_err());
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("x").is_ok());
        assert!(not_blank("   ").is_err());
    }

    #[test]
    fn test_upper_helpers() {
        assert_eq!(upper("  paracetamol 500 mg "), "PARACETAMOL 500 MG");
        assert_eq!(upper_opt(Some("  ")), None);
        assert_eq!(upper_opt(Some("iv")), Some("IV".to_string()));
        assert_eq!(upper_opt(None), None);
    }
}
