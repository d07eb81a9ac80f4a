//! Password hashing
//! Mission: Keep raw passwords out of storage and logs

use anyhow::{Context, Result};
use bcrypt::{hash, verify};

/// Lowest cost bcrypt accepts; only for tests
pub const MIN_COST: u32 = 4;

/// Hash a password using bcrypt
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    hash(password, cost).context("Failed to hash password")
}

/// Verify a password against a bcrypt hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    verify(password, password_hash).context("Failed to verify password")
}
