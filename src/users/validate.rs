//! Per-field input rules. Each endpoint runs the rules it needs and
//! collects every failure into one field-to-messages map, which is
//! returned to the caller as the whole response body.

use crate::response::FieldErrors;
use crate::users::services::is_valid_email;

#[derive(Debug, Default)]
pub struct Errors(FieldErrors);

impl Errors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> FieldErrors {
        self.0
    }
}

/// The field must be present and non-empty. Returns the value when it is,
/// so follow-up rules can run on it.
pub fn required<'a>(
    errors: &mut Errors,
    field: &'static str,
    value: &'a Option<String>,
) -> Option<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
    }
}

pub fn min_len(errors: &mut Errors, field: &'static str, value: &str, min: usize) {
    if value.chars().count() < min {
        errors.add(field, format!("The {field} must be at least {min} characters."));
    }
}

pub fn max_len(errors: &mut Errors, field: &'static str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("The {field} must not be greater than {max} characters."),
        );
    }
}

pub fn email_format(errors: &mut Errors, field: &'static str, value: &str) {
    if !is_valid_email(value) {
        errors.add(field, format!("The {field} must be a valid email address."));
    }
}

pub fn confirmed(
    errors: &mut Errors,
    field: &'static str,
    value: &str,
    confirmation: &Option<String>,
) {
    if confirmation.as_deref() != Some(value) {
        errors.add(field, format!("The {field} confirmation does not match."));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_missing_and_empty() {
        let mut errors = Errors::default();
        assert!(required(&mut errors, "name", &None).is_none());
        assert!(required(&mut errors, "email", &Some(String::new())).is_none());
        let map = errors.into_inner();
        assert_eq!(map["name"], vec!["The name field is required."]);
        assert_eq!(map["email"], vec!["The email field is required."]);
    }

    #[test]
    fn required_passes_value_through() {
        let mut errors = Errors::default();
        let value = Some("Alice".to_string());
        assert_eq!(required(&mut errors, "name", &value), Some("Alice"));
        assert!(errors.is_empty());
    }

    #[test]
    fn min_len_counts_characters() {
        let mut errors = Errors::default();
        min_len(&mut errors, "name", "A", 2);
        let map = errors.into_inner();
        assert_eq!(map["name"], vec!["The name must be at least 2 characters."]);
    }

    #[test]
    fn max_len_flags_overlong_values() {
        let mut errors = Errors::default();
        max_len(&mut errors, "name", &"x".repeat(256), 255);
        let map = errors.into_inner();
        assert_eq!(
            map["name"],
            vec!["The name must not be greater than 255 characters."]
        );
    }

    #[test]
    fn email_format_rule_uses_shared_pattern() {
        let mut errors = Errors::default();
        email_format(&mut errors, "email", "user@example.com");
        assert!(errors.is_empty());
        email_format(&mut errors, "email", "nope");
        let map = errors.into_inner();
        assert_eq!(map["email"], vec!["The email must be a valid email address."]);
    }

    #[test]
    fn confirmed_requires_exact_match() {
        let mut errors = Errors::default();
        confirmed(&mut errors, "password", "secret1", &Some("secret1".into()));
        assert!(errors.is_empty());
        confirmed(&mut errors, "password", "secret1", &Some("secret2".into()));
        confirmed(&mut errors, "password", "secret1", &None);
        let map = errors.into_inner();
        assert_eq!(map["password"].len(), 2);
        assert_eq!(
            map["password"][0],
            "The password confirmation does not match."
        );
    }

    #[test]
    fn failures_accumulate_per_field() {
        let mut errors = Errors::default();
        min_len(&mut errors, "password", "abc", 6);
        confirmed(&mut errors, "password", "abc", &None);
        let map = errors.into_inner();
        assert_eq!(map["password"].len(), 2);
    }
}
