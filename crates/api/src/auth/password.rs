//! Password hashing and verification (Argon2id, PHC string storage).

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Reject passwords that fail the registration policy.
///
/// The returned message is shown to the user as-is.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ))
    } else {
        Ok(())
    }
}

/// Hash a plaintext password with Argon2id and a fresh random salt.
///
/// The returned PHC string embeds algorithm, parameters, and salt, so
/// it is the only thing that needs storing.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// Check a plaintext password against a stored PHC string.
///
/// A mismatch is `Ok(false)`; `Err` means the stored hash itself is
/// malformed or verification could not run.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}
