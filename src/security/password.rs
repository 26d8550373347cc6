//! One-way secret verification for PASS, OPER, DIE and RESTART.
//!
//! Stored secrets are never plaintext. Three formats are accepted:
//! Argon2 PHC strings (`$argon2id$...`), bcrypt (`$2b$...`) and
//! `sha256:<hex digest>` for quick setups and tests.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Verify `candidate` against a stored hash. Unknown formats never verify.
pub fn verify_secret(candidate: &str, stored: &str) -> bool {
    if stored.starts_with("$argon2") {
        return PasswordHash::new(stored).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(candidate.as_bytes(), &hash)
                .is_ok()
        });
    }
    if stored.starts_with("$2") {
        return bcrypt::verify(candidate, stored).unwrap_or(false);
    }
    if let Some(hex) = stored.strip_prefix("sha256:") {
        let digest = sha256_hex(candidate);
        return digest.as_bytes().ct_eq(hex.to_ascii_lowercase().as_bytes()).into();
    }
    false
}

/// Hash a password using default Argon2 settings.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn sha256_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
