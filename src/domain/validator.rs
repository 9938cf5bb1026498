//! Syntactic validation of ASCII domain names

use super::DomainError;

/// Maximum length of a full domain name in its ASCII form
pub const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single label
pub const MAX_LABEL_LEN: usize = 63;

/// Check whether an ASCII domain is syntactically acceptable for a query.
pub fn is_valid(ascii: &str) -> bool {
    validate(ascii).is_ok()
}

/// Validate an ASCII (already IDNA-encoded) domain name.
///
/// Requires at least two labels. Each label must be 1..=63 bytes of
/// `[a-z0-9-]` and must not start or end with a hyphen.
pub fn validate(ascii: &str) -> Result<(), DomainError> {
    if ascii.is_empty() {
        return Err(DomainError::invalid("domain name cannot be empty"));
    }

    if ascii.len() > MAX_DOMAIN_LEN {
        return Err(DomainError::invalid("domain name too long (max 253 bytes)"));
    }

    let labels: Vec<&str> = ascii.split('.').collect();
    if labels.len() < 2 {
        return Err(DomainError::invalid("domain must have at least one dot"));
    }

    for label in labels {
        validate_label(label)?;
    }

    Ok(())
}

fn validate_label(label: &str) -> Result<(), DomainError> {
    if label.is_empty() {
        return Err(DomainError::invalid("domain label cannot be empty"));
    }

    if label.len() > MAX_LABEL_LEN {
        return Err(DomainError::invalid("domain label too long (max 63 bytes)"));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(DomainError::invalid("domain label cannot start or end with hyphen"));
    }

    let valid_chars = label
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid_chars {
        return Err(DomainError::invalid("domain label contains invalid characters"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_validation() {
        assert!(is_valid("example.com"));
        assert!(is_valid("sub.example.co.uk"));
        assert!(is_valid("test-domain.org"));
        assert!(is_valid("xn--e1afmkfd.xn--p1ai"));
        assert!(is_valid("123.example.net"));

        assert!(!is_valid(""));
        assert!(!is_valid("com"));
        assert!(!is_valid("."));
        assert!(!is_valid("example..com"));
        assert!(!is_valid(".example.com"));
        assert!(!is_valid("example.com."));
        assert!(!is_valid("-invalid.com"));
        assert!(!is_valid("invalid-.com"));
    }

    #[test]
    fn test_rejects_uppercase_and_symbols() {
        assert!(!is_valid("Example.com"));
        assert!(!is_valid("exa_mple.com"));
        assert!(!is_valid("exa mple.com"));
        assert!(!is_valid("пример.рф"));
    }

    #[test]
    fn test_length_limits() {
        let label = "a".repeat(63);
        assert!(is_valid(&format!("{}.com", label)));

        let long_label = "a".repeat(64);
        assert!(!is_valid(&format!("{}.com", long_label)));

        // 4 * 63 + 3 dots = 255 bytes
        let too_long = vec![label.as_str(); 4].join(".");
        assert!(too_long.len() > MAX_DOMAIN_LEN);
        assert!(!is_valid(&too_long));
    }

    #[test]
    fn test_validate_reports_reason() {
        let err = validate("example..com").unwrap_err();
        assert!(err.to_string().contains("empty"));

        let err = validate("com").unwrap_err();
        assert!(err.to_string().contains("dot"));
    }
}
