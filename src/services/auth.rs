//! Salted Argon2 password hashing. Verification goes through argon2's own
//! constant-time comparison.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use super::ServiceError;

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::Validation(
            "Password cannot be empty.".to_string(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Argon2 password hashing failed: {}", e);
            ServiceError::Internal(format!("Password hashing failed: {}", e))
        })
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
pub fn verify_password(stored_hash: &str, provided: &str) -> Result<bool, ServiceError> {
    if provided.is_empty() {
        return Ok(false);
    }

    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        log::error!("Stored password hash could not be parsed: {}", e);
        ServiceError::Internal(format!("Invalid stored password hash: {}", e))
    })?;

    match Argon2::default().verify_password(provided.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ServiceError::Internal(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// Runs hashing off the async workers; Argon2 is deliberately slow.
pub async fn hash_password_blocking(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
}

pub async fn verify_password_blocking(
    stored_hash: String,
    provided: String,
) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&stored_hash, &provided))
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
}
