//! Argon2id credential hashing. Hashing is CPU-bound, so the async entry
//! points run it on the blocking pool instead of a runtime worker.

use anyhow::Context;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tokio::task;

/// PHC string of a freshly salted Argon2id hash of `plain`.
pub async fn hash_password(plain: &str) -> anyhow::Result<String> {
    let plain = plain.to_owned();
    task::spawn_blocking(move || hash_blocking(plain.as_bytes()))
        .await
        .context("password hashing task failed")?
}

/// `Ok(false)` on a mismatch; `Err` only when `stored` is not a usable hash.
pub async fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let (plain, stored) = (plain.to_owned(), stored.to_owned());
    task::spawn_blocking(move || verify_blocking(plain.as_bytes(), &stored))
        .await
        .context("password verification task failed")?
}

fn hash_blocking(plain: &[u8]) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain, &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("argon2 hashing failed: {e}"))
}

fn verify_blocking(plain: &[u8], stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("stored password hash is unreadable: {e}"))?;
    match Argon2::default().verify_password(plain, &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("argon2 verification failed: {e}")),
    }
}
