//! OTP and password hashing primitives.
//!
//! Plain codes are never persisted; only Argon2id PHC strings reach the
//! database. Verification is constant-time via the `password_hash` crate.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng as HashRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::{rngs::OsRng, Rng};

/// Number of digits in a login OTP.
pub const OTP_LENGTH: u32 = 6;

/// Generate a zero-padded numeric OTP from the OS random source.
#[must_use]
pub fn generate_otp() -> String {
    let upper = 10u32.pow(OTP_LENGTH);
    let code = OsRng.gen_range(0..upper);
    format!("{code:0width$}", width = OTP_LENGTH as usize)
}

/// Hash an OTP for storage. Each call salts independently, so two hashes of
/// the same code differ in representation but both verify.
pub fn hash_otp(otp: &str) -> Result<String> {
    hash_secret(otp)
}

/// Verify an OTP against a stored hash. Returns `false` for empty inputs or
/// malformed hashes rather than erroring.
#[must_use]
pub fn verify_otp(otp: &str, otp_hash: &str) -> bool {
    verify_secret(otp, otp_hash)
}

/// Hash a password with the same scheme as OTPs.
pub fn hash_password(password: &str) -> Result<String> {
    hash_secret(password)
}

#[must_use]
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    verify_secret(password, password_hash)
}

fn hash_secret(value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(anyhow!("refusing to hash an empty secret"));
    }
    let salt = SaltString::generate(&mut HashRng);
    let hash = Argon2::default()
        .hash_password(value.as_bytes(), &salt)
        .map_err(|err| anyhow!("argon2 hashing failed: {err}"))
        .context("failed to hash secret")?;
    Ok(hash.to_string())
}

fn verify_secret(value: &str, stored: &str) -> bool {
    if value.is_empty() || stored.is_empty() {
        return false;
    }
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(value.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn generate_otp_is_six_digits() {
        let pattern = Regex::new(r"^\d{6}$").expect("valid regex");
        for _ in 0..50 {
            assert!(pattern.is_match(&generate_otp()));
        }
    }

    #[test]
    fn generate_otp_varies() {
        let codes: std::collections::HashSet<String> = (0..20).map(|_| generate_otp()).collect();
        // Statistical: 20 draws from a million values collide occasionally,
        // but all-identical would mean a broken RNG.
        assert!(codes.len() > 1);
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let otp = generate_otp();
        let hash = hash_otp(&otp).expect("hashing succeeds");
        assert!(verify_otp(&otp, &hash));
    }

    #[test]
    fn different_code_does_not_verify() {
        let hash = hash_otp("123456").expect("hashing succeeds");
        assert!(!verify_otp("654321", &hash));
    }

    #[test]
    fn salted_hashes_differ_but_both_verify() {
        let first = hash_otp("004821").expect("hashing succeeds");
        let second = hash_otp("004821").expect("hashing succeeds");
        assert_ne!(first, second);
        assert!(verify_otp("004821", &first));
        assert!(verify_otp("004821", &second));
    }

    #[test]
    fn empty_inputs_never_verify() {
        let hash = hash_otp("123456").expect("hashing succeeds");
        assert!(!verify_otp("", &hash));
        assert!(!verify_otp("123456", ""));
        assert!(!verify_otp("", ""));
    }

    #[test]
    fn malformed_hash_returns_false() {
        assert!(!verify_otp("123456", "not-a-phc-string"));
    }

    #[test]
    fn empty_secret_refuses_to_hash() {
        assert!(hash_otp("").is_err());
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("peter").expect("hashing succeeds");
        assert!(verify_password("peter", &hash));
        assert!(!verify_password("wrong", &hash));
    }
}
