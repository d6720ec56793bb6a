// src/auth/validators.rs

use regex::Regex;
use std::sync::OnceLock;

use super::models::{SignInRequest, SignUpRequest};
use crate::common::{ValidationResult, Validator};

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("email regex is valid")
    })
}

/// `+<country code><subscriber number>`, E.164 style
fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("phone regex is valid"))
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && email_regex().is_match(email)
}

/// At least 8 characters with one lowercase, one uppercase, one digit and one symbol
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

fn length_between(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    len >= min && len <= max
}

// ============================================================================
// Local account validators
// ============================================================================

pub struct SignUpValidator;

impl Validator<SignUpRequest> for SignUpValidator {
    fn validate(&self, data: &SignUpRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !length_between(&data.first_name, 2, 40) {
            result.add_error(
                "firstName",
                "First name should be exist with 2 - 40 characters",
            );
        }

        if !length_between(&data.last_name, 2, 40) {
            result.add_error("lastName", "Last name should be exist with 2 - 40 characters");
        }

        if !is_valid_email(data.email.trim()) {
            result.add_error("email", "Email should be exist and in a valid structure");
        }

        if !is_strong_password(&data.password) {
            result.add_error(
                "password",
                "Password should contain at least 1 symbol, 1 uppercase, 1 lowercase, 1 number",
            );
        }
        if !length_between(&data.password, 6, 30) {
            result.add_error("password", "Password should be exist with 6 - 30 characters");
        }

        if !phone_regex().is_match(&data.phone_number) {
            result.add_error(
                "phoneNumber",
                "Phone number must be in this structure : +YYYYXXXXXXXX",
            );
        }

        result
    }
}

pub struct SignInValidator;

impl Validator<SignInRequest> for SignInValidator {
    fn validate(&self, data: &SignInRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !is_valid_email(data.email.trim()) {
            result.add_error("email", "Email must be valid");
        }
        if data.password.trim().is_empty() {
            result.add_error("password", "You must supply a password");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> SignUpRequest {
        SignUpRequest {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "Str0ng!pass".to_string(),
            phone_number: "+4915112345678".to_string(),
        }
    }

    fn fields(result: &ValidationResult) -> Vec<&str> {
        result.errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_sign_up_validator_valid_data() {
        let result = SignUpValidator.validate(&valid_request());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_sign_up_validator_name_bounds() {
        let mut request = valid_request();
        request.first_name = "A".to_string();
        request.last_name = "L".repeat(41);

        let result = SignUpValidator.validate(&request);
        assert!(!result.is_valid);
        assert_eq!(fields(&result), vec!["firstName", "lastName"]);
    }

    #[test]
    fn test_sign_up_validator_rejects_bad_email() {
        for email in ["", "plain", "a@b", "a@@b.com", "a b@c.com"] {
            let mut request = valid_request();
            request.email = email.to_string();
            let result = SignUpValidator.validate(&request);
            assert_eq!(fields(&result), vec!["email"], "email {:?}", email);
        }
    }

    #[test]
    fn test_sign_up_validator_password_rules() {
        let mut request = valid_request();
        request.password = "alllowercase1!".to_string();
        let result = SignUpValidator.validate(&request);
        assert_eq!(fields(&result), vec!["password"]);

        request.password = format!("Aa1!{}", "x".repeat(30));
        let result = SignUpValidator.validate(&request);
        assert_eq!(fields(&result), vec!["password"]);
        assert!(result.errors[0].message.contains("6 - 30"));

        request.password = "Aa1!".to_string();
        let result = SignUpValidator.validate(&request);
        assert_eq!(fields(&result), vec!["password", "password"]);
    }

    #[test]
    fn test_sign_up_validator_phone_pattern() {
        for phone in ["4915112345678", "+0123456789", "+12 345 678", "+1234"] {
            let mut request = valid_request();
            request.phone_number = phone.to_string();
            let result = SignUpValidator.validate(&request);
            assert_eq!(fields(&result), vec!["phoneNumber"], "phone {:?}", phone);
        }
    }

    #[test]
    fn test_sign_in_validator() {
        let result = SignInValidator.validate(&SignInRequest {
            email: "ada@example.com".to_string(),
            password: " ".to_string(),
        });
        assert_eq!(fields(&result), vec!["password"]);
    }
}
