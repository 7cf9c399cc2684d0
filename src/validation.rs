//! Request field validation.
//!
//! Handlers collect every failed check into a [`Validator`] and turn it into a
//! single `AppError::Validation`, so clients see all problems at once.

use crate::error::{AppError, FieldError};

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
        self
    }

    /// Trimmed value must be non-empty and at most `max` characters.
    pub fn required(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.error(field, "must not be empty");
        } else if trimmed.chars().count() > max {
            self.error(field, format!("must be at most {} characters", max));
        }
        self
    }

    pub fn optional(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(value) = value {
            if value.chars().count() > max {
                self.error(field, format!("must be at most {} characters", max));
            }
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: Option<i64>) -> &mut Self {
        if matches!(value, Some(v) if v < 0) {
            self.error(field, "must not be negative");
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        let value = value.trim();
        let valid = match value.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !value.contains(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            self.error(field, "must be a valid email address");
        }
        self
    }

    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        if value.chars().count() < min {
            self.error(field, format!("must be at least {} characters", min));
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

/// Trim an optional string, mapping blank values to `None`.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(result: Result<(), AppError>) -> Vec<String> {
        match result {
            Err(AppError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn collects_every_failure() {
        let result = Validator::new()
            .required("name", "   ", 10)
            .email("email", "nobody")
            .non_negative("price", Some(-1))
            .finish();

        assert_eq!(fields(result), vec!["name", "email", "price"]);
    }

    #[test]
    fn passes_clean_input() {
        let result = Validator::new()
            .required("name", "ThinkPad X1", 200)
            .email("email", "ana@example.com")
            .non_negative("price", Some(0))
            .non_negative("missing", None)
            .optional("notes", Some("fine"), 10)
            .finish();

        assert!(result.is_ok());
    }

    #[test]
    fn length_limits_count_characters() {
        assert!(Validator::new().required("name", "ééé", 3).finish().is_ok());
        assert_eq!(
            fields(Validator::new().required("name", "abcd", 3).finish()),
            vec!["name"]
        );
        assert_eq!(
            fields(Validator::new().min_len("password", "short", 8).finish()),
            vec!["password"]
        );
    }

    #[test]
    fn rejects_malformed_emails() {
        for bad in ["@example.com", "ana@", "ana@example", "ana @example.com", "ana@.com"] {
            assert!(
                Validator::new().email("email", bad).finish().is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn clean_optional_drops_blank_values() {
        assert_eq!(clean_optional(Some("  ".into())), None);
        assert_eq!(clean_optional(Some(" x ".into())), Some("x".into()));
        assert_eq!(clean_optional(None), None);
    }
}
