use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Address {
    pub line1: String,
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// Request body for customer create/update.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerPayload {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: Address,
    #[serde(default)]
    pub service_category_url: Option<String>,
}

pub struct CustomerValidator;

impl CustomerValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a customer payload, collecting one message per offending field.
    /// An empty map means the payload is acceptable.
    pub fn validate(&self, payload: &CustomerPayload) -> HashMap<String, String> {
        let mut errors = HashMap::new();

        if payload.name.trim().is_empty() {
            errors.insert("name".to_string(), "Name is required".to_string());
        }

        let phone = payload.phone.trim();
        if phone.is_empty() {
            errors.insert("phone".to_string(), "Phone is required".to_string());
        } else if phone.chars().filter(|c| c.is_ascii_digit()).count() < 7 {
            errors.insert("phone".to_string(), "Phone must contain at least 7 digits".to_string());
        }

        let email = payload.email.trim();
        if email.is_empty() {
            errors.insert("email".to_string(), "Email is required".to_string());
        } else if !is_plausible_email(email) {
            errors.insert("email".to_string(), "Email is not valid".to_string());
        }

        if payload.address.line1.trim().is_empty() {
            errors.insert("address.line1".to_string(), "Address line is required".to_string());
        }
        if payload.address.city.trim().is_empty() {
            errors.insert("address.city".to_string(), "City is required".to_string());
        }
        if payload.address.state.trim().is_empty() {
            errors.insert("address.state".to_string(), "State is required".to_string());
        }

        errors
    }
}

fn is_plausible_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Normalize the optional service-category link:
/// empty or whitespace-only input → None (stored as absent);
/// anything without an `http` scheme prefix gets `https://` prepended.
pub fn normalize_service_url(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    if value.starts_with("http") {
        Some(value.to_string())
    } else {
        Some(format!("https://{}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> CustomerPayload {
        CustomerPayload {
            name: "Jane Smith".to_string(),
            phone: "555-010-2030".to_string(),
            email: "jane@example.com".to_string(),
            address: Address {
                line1: "12 Main St".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                postal_code: Some("62701".to_string()),
            },
            service_category_url: None,
        }
    }

    #[test]
    fn test_valid_payload_has_no_errors() {
        assert!(CustomerValidator::new().validate(&payload()).is_empty());
    }

    #[test]
    fn test_missing_fields_reported_per_field() {
        let mut p = payload();
        p.name = "  ".to_string();
        p.phone = String::new();
        p.address.city = String::new();

        let errors = CustomerValidator::new().validate(&p);
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("phone"));
        assert!(errors.contains_key("address.city"));
        assert!(!errors.contains_key("email"));
    }

    #[test]
    fn test_bad_email_rejected() {
        let validator = CustomerValidator::new();
        for bad in ["no-at-sign", "a@b", "@example.com", "a@.com", "a@b.com@c"] {
            let mut p = payload();
            p.email = bad.to_string();
            assert!(validator.validate(&p).contains_key("email"), "{} should fail", bad);
        }
    }

    #[test]
    fn test_short_phone_rejected() {
        let mut p = payload();
        p.phone = "12345".to_string();
        assert!(CustomerValidator::new().validate(&p).contains_key("phone"));
    }

    #[test]
    fn test_normalize_empty_is_absent() {
        assert_eq!(normalize_service_url(None), None);
        assert_eq!(normalize_service_url(Some("")), None);
        assert_eq!(normalize_service_url(Some("   ")), None);
    }

    #[test]
    fn test_normalize_prefixes_https() {
        assert_eq!(
            normalize_service_url(Some("example.com")),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn test_normalize_keeps_existing_scheme() {
        assert_eq!(
            normalize_service_url(Some("http://example.com")),
            Some("http://example.com".to_string())
        );
        assert_eq!(
            normalize_service_url(Some("https://example.com/a")),
            Some("https://example.com/a".to_string())
        );
    }
}
