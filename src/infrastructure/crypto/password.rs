//! Password hashing and temporary password generation

use bcrypt::{hash, verify, DEFAULT_COST};
use rand::Rng;

use crate::shared::{DomainError, DomainResult};

// Minimum cost under test keeps the suite fast.
const HASH_COST: u32 = if cfg!(test) { 4 } else { DEFAULT_COST };
const TEMP_PASSWORD_LENGTH: usize = 12;
const TEMP_PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> DomainResult<String> {
    hash(password, HASH_COST)
        .map_err(|e| DomainError::Validation(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash. A malformed hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

/// Random password handed to accounts created by staff.
pub fn generate_temporary_password() -> String {
    let mut rng = rand::thread_rng();
    (0..TEMP_PASSWORD_LENGTH)
        .map(|_| TEMP_PASSWORD_CHARSET[rng.gen_range(0..TEMP_PASSWORD_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hashed = hash_password("s3cret!").unwrap();
        assert!(verify_password("s3cret!", &hashed));
        assert!(!verify_password("wrong", &hashed));
        assert!(!verify_password("s3cret!", "not-a-bcrypt-hash"));
    }

    #[test]
    fn temporary_password_shape() {
        let pw = generate_temporary_password();
        assert_eq!(pw.len(), 12);
        assert!(pw.bytes().all(|b| TEMP_PASSWORD_CHARSET.contains(&b)));
        assert_ne!(generate_temporary_password(), generate_temporary_password());
    }
}
