/// Password Hashing and Verification
///
/// Handles password hashing with bcrypt (salted, cost-adaptive) and the
/// minimal acceptance rules for new passwords.

use bcrypt::{hash, verify, DEFAULT_COST};
use lazy_static::lazy_static;

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 1;
// bcrypt only looks at the first 72 bytes
const MAX_PASSWORD_LENGTH: usize = 72;

lazy_static! {
    // Verified against when the account does not exist, so a miss costs
    // the same bcrypt work as a wrong password.
    static ref DUMMY_HASH: Option<String> =
        hash("dummy-password-for-missing-accounts", DEFAULT_COST).ok();
}

/// Hash a password using bcrypt at the given cost
///
/// # Errors
/// Returns error if:
/// - Password fails validation (empty, too long, control characters)
/// - Bcrypt hashing fails
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AppError> {
    validate_password(password)?;

    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash is not a valid bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

/// Build the dummy hash now rather than on the first unknown-user login
pub fn prepare_dummy_hash() {
    lazy_static::initialize(&DUMMY_HASH);
}

/// Burn one bcrypt verification for a login whose account was not found.
/// Always reports a mismatch.
pub fn verify_against_dummy(password: &str) -> bool {
    if let Some(dummy) = DUMMY_HASH.as_deref() {
        let _ = verify(password, dummy);
    }
    false
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::EmptyField(
            "password".to_string(),
        )));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        )));
    }

    if password.chars().any(|c| c.is_control()) {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "password".to_string(),
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost keeps the suite fast
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hash_password_with_cost(password, TEST_COST).expect("Failed to hash password");

        // Hash should not be the same as password
        assert_ne!(password, hash);
        // Hash should start with bcrypt identifier
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_same_password_different_salt() {
        let a = hash_password_with_cost("pw1", TEST_COST).unwrap();
        let b = hash_password_with_cost("pw1", TEST_COST).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password_with_cost("pw1", TEST_COST).expect("Failed to hash password");

        assert!(verify_password("pw1", &hash).expect("Failed to verify password"));
        assert!(!verify_password("pw2", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_verify_against_invalid_hash() {
        assert!(verify_password("pw1", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn test_dummy_hash_is_built_up_front() {
        prepare_dummy_hash();
        let dummy = DUMMY_HASH.as_deref().expect("dummy hash missing");

        assert!(dummy.starts_with("$2"));
        assert!(verify_password("dummy-password-for-missing-accounts", dummy).unwrap());
    }

    #[test]
    fn test_dummy_verification_never_matches() {
        assert!(!verify_against_dummy("dummy-password-for-missing-accounts"));
    }

    #[test]
    fn test_empty_password() {
        assert!(hash_password_with_cost("", TEST_COST).is_err());
    }

    #[test]
    fn test_too_long_password() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1);
        assert!(hash_password_with_cost(&long_password, TEST_COST).is_err());
    }

    #[test]
    fn test_control_characters() {
        assert!(hash_password_with_cost("pass\0word", TEST_COST).is_err());
    }
}
