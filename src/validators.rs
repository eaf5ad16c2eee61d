/// Input validators for account data
/// Features:
/// 1. DoS Protection: Input length limits
/// 2. Data Theft Protection: control characters and null bytes rejected
/// 3. Phishing Protection: Email validation

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 256;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 32;
const MAX_BIO_LENGTH: usize = 1000;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").unwrap();
}

/// Validates email address
/// - Checks format using RFC 5322 simplified regex
/// - Verifies length constraints
/// - Detects potential phishing patterns
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a login name: 3-32 characters, letters, digits, `_`, `.` and `-`,
/// starting with a letter or digit. Usernames are case-sensitive.
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }

    if trimmed.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort("username".to_string(), MIN_USERNAME_LENGTH));
    }

    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username".to_string(), MAX_USERNAME_LENGTH));
    }

    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("username".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates a person's full name
/// - Checks length constraints
/// - Validates against control characters
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("full_name".to_string()));
    }

    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("full_name".to_string(), MAX_NAME_LENGTH));
    }

    if has_suspicious_name_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("full_name".to_string()));
    }

    Ok(trimmed.to_string())
}

pub fn is_valid_bio(bio: &str) -> Result<String, ValidationError> {
    let trimmed = bio.trim();

    if trimmed.len() > MAX_BIO_LENGTH {
        return Err(ValidationError::TooLong("bio".to_string(), MAX_BIO_LENGTH));
    }

    // Newlines are fine in a bio, other control characters are not
    if trimmed.chars().any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t') {
        return Err(ValidationError::SuspiciousContent("bio".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Detects suspicious patterns in email addresses that might indicate phishing
fn has_suspicious_email_patterns(email: &str) -> bool {
    // Extremely long local part (before @)
    if let Some(at_pos) = email.find('@') {
        if email[..at_pos].len() > 64 {
            return true;
        }
    }

    if email.matches('@').count() != 1 {
        return true;
    }

    email.contains('\0')
}

fn has_suspicious_name_patterns(name: &str) -> bool {
    if name.chars().any(|c| c.is_control()) {
        return true;
    }

    // Excessive special characters
    let special_char_count = name
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && *c != '-' && *c != '.' && *c != '\'')
        .count();

    special_char_count > 5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert_eq!(is_valid_email("alice@x.com").unwrap(), "alice@x.com");
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(is_valid_email("  Alice@X.com ").unwrap(), "alice@x.com");
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(is_valid_email(&too_long).is_err());

        assert!(is_valid_email("a@a").is_err()); // Too short
    }

    #[test]
    fn test_valid_username() {
        assert_eq!(is_valid_username("alice").unwrap(), "alice");
        assert!(is_valid_username("john_doe-1.2").is_ok());
    }

    #[test]
    fn test_invalid_username() {
        assert_eq!(
            is_valid_username(""),
            Err(ValidationError::EmptyField("username".to_string()))
        );
        assert!(is_valid_username("ab").is_err());
        assert!(is_valid_username(&"a".repeat(33)).is_err());
        assert!(is_valid_username("_alice").is_err());
        assert!(is_valid_username("al ice").is_err());
        assert!(is_valid_username("alice;drop").is_err());
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("Alice A").is_ok());
        assert!(is_valid_name("Jean-Pierre").is_ok());
        assert!(is_valid_name("O'Brien").is_ok());
        assert!(is_valid_name("Castillo").is_ok());
    }

    #[test]
    fn test_name_length_limits() {
        assert!(is_valid_name(&"a".repeat(257)).is_err());
        assert!(is_valid_name("   ").is_err());
    }

    #[test]
    fn test_control_characters() {
        assert!(is_valid_name("Name\0with\0null").is_err());
    }

    #[test]
    fn test_excessive_special_characters() {
        assert!(is_valid_name("!!!!!!@@@@").is_err());
    }

    #[test]
    fn test_bio() {
        assert!(is_valid_bio("Travels a lot.\nLikes maps.").is_ok());
        assert!(is_valid_bio(&"b".repeat(1001)).is_err());
        assert!(is_valid_bio("bell\u{7}").is_err());
    }
}
