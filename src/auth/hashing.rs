//! Argon2id hashing for passwords and session secrets.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};

use crate::errors::{Error, Result};

// Tuned for interactive requests: one pass over 768 KiB keeps verification fast.
const MEMORY_COST_KIB: u32 = 768;
const ITERATIONS: u32 = 1;
const PARALLELISM: u32 = 1;

pub fn password_hasher() -> Result<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, Some(32))
        .map_err(|err| Error::internal(format!("Invalid Argon2 parameters: {}", err)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a secret into a PHC string.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = password_hasher()?
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|err| Error::internal(format!("Failed to hash secret: {}", err)))?;
    Ok(hash.to_string())
}

/// Check a candidate against a stored PHC string.
pub fn verify_secret(stored: &str, candidate: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| Error::internal(format!("Invalid password hash: {}", err)))?;
    Ok(password_hasher()?.verify_password(candidate.as_bytes(), &parsed).is_ok())
}
