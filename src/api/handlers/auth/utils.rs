//! Small helpers for credential validation, hashing and token generation.

use anyhow::{Context, Result};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

pub(crate) const MAX_NAME_CHARS: usize = 30;
pub(crate) const TOKEN_LENGTH: usize = 64;

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
// Largest multiple of the alphabet size that fits in a byte; bytes at or
// above it are discarded so every symbol is equally likely.
const TOKEN_BYTE_LIMIT: u8 = 248;

/// Normalize a username for lookup/uniqueness checks.
pub(super) fn normalize_name(name: &str) -> String {
    name.trim().to_string()
}

/// Validate already-normalized credentials, returning a human message on failure.
pub(super) fn validate_credentials(name: &str, password: &str) -> Result<(), String> {
    if name.is_empty() || password.is_empty() {
        return Err("Username and password are required".to_string());
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(format!(
            "Username must be at most {MAX_NAME_CHARS} characters"
        ));
    }
    Ok(())
}

/// `hex(sha256(user_id || password))`.
pub(super) fn hash_password(user_id: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub(super) fn verify_password(user_id: &str, password: &str, password_digest: &str) -> bool {
    hash_password(user_id, password) == password_digest
}

/// Create a 64-character alphanumeric token from the OS CSPRNG.
pub(super) fn generate_token() -> Result<String> {
    let mut token = String::with_capacity(TOKEN_LENGTH);
    let mut bytes = [0u8; TOKEN_LENGTH];
    while token.len() < TOKEN_LENGTH {
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate session token")?;
        for byte in bytes.iter().filter(|byte| **byte < TOKEN_BYTE_LIMIT) {
            if token.len() == TOKEN_LENGTH {
                break;
            }
            let index = usize::from(*byte) % TOKEN_ALPHABET.len();
            token.push(char::from(TOKEN_ALPHABET[index]));
        }
    }
    Ok(token)
}
