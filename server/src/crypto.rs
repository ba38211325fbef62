//! Password hashing
//!
//! Passwords are stored as Argon2id PHC strings with a random salt per hash.

use crate::error::{AppError, Result};
use rand::rngs::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

/// Hash a password into a self-describing PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Generic(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Str0ng!pass").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Str0ng!pass", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_different_salts() {
        let first = hash_password("same_password").unwrap();
        let second = hash_password("same_password").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("same_password", &first));
        assert!(verify_password("same_password", &second));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_unicode_password() {
        let password = "пароль密码🔐!";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash));
    }
}
