//! Password hashing and verification
//!
//! Credentials are stored as `base64(salt):base64(key)` where `key` is a
//! PBKDF2-HMAC-SHA256 derivation of the password. The iteration count is a
//! property of the hasher, so every record written by one deployment shares
//! the same cost.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes (256 bits)
pub const KEY_LEN: usize = 32;

/// Minimum password length, counted in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// A well-formed record that no password is expected to match.
///
/// Verified in place of a real record when the user does not exist so that
/// both failure paths perform the same key derivation.
pub const DUMMY_HASH: &str = "dGltaW5nLWVxdWFsaXplcg==:K1oQKIeIpDspLitfyrX8EVtBcjSEmLq/kOi5hkdV+4g=";

/// The first complexity rule a candidate password fails
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordPolicyViolation {
    #[error("password must be at least {min} characters long (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("password must contain an uppercase letter")]
    MissingUppercase,

    #[error("password must contain a lowercase letter")]
    MissingLowercase,

    #[error("password must contain a digit")]
    MissingDigit,

    #[error("password must contain a special character")]
    MissingSpecial,
}

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password policy violation: {0}")]
    Policy(#[from] PasswordPolicyViolation),

    #[error("Password hashing error: {0}")]
    Hashing(String),
}

/// Check a candidate password against the complexity rules, in order
pub fn check_policy(password: &str) -> Result<(), PasswordPolicyViolation> {
    let actual = password.chars().count();
    if actual < MIN_PASSWORD_LEN {
        return Err(PasswordPolicyViolation::TooShort {
            min: MIN_PASSWORD_LEN,
            actual,
        });
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(PasswordPolicyViolation::MissingUppercase);
    }
    if !password.chars().any(char::is_lowercase) {
        return Err(PasswordPolicyViolation::MissingLowercase);
    }
    if !password.chars().any(char::is_numeric) {
        return Err(PasswordPolicyViolation::MissingDigit);
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err(PasswordPolicyViolation::MissingSpecial);
    }
    Ok(())
}

/// Constant-time comparison for derived keys
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// PBKDF2-HMAC-SHA256 password hasher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hasher with a custom cost factor (at least one iteration)
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Enforce the complexity policy, then hash with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        check_policy(password)?;

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = self.derive(password, &salt, KEY_LEN);
        Ok(format!("{}:{}", STANDARD.encode(salt), STANDARD.encode(key)))
    }

    /// Verify a password against a stored record
    ///
    /// Malformed records, including ones whose salt or key has the wrong
    /// length, never match.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let mut parts = stored.split(':');
        let (Some(salt_b64), Some(key_b64), None) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt_b64), STANDARD.decode(key_b64)) else {
            return false;
        };
        if salt.len() != SALT_LEN || expected.len() != KEY_LEN {
            return false;
        }

        let actual = self.derive(password, &salt, KEY_LEN);
        constant_time_eq(&actual, &expected)
    }

    fn derive(&self, password: &str, salt: &[u8], key_len: usize) -> Vec<u8> {
        let mut key = vec![0u8; key_len];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.iterations, &mut key);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_iterations(1_000)
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let stored = hasher.hash("Admin123!").unwrap();

        assert!(hasher.verify("Admin123!", &stored));
        assert!(!hasher.verify("Admin123?", &stored));
        assert!(!hasher.verify("", &stored));
    }

    #[test]
    fn test_record_format() {
        let stored = hasher().hash("Admin123!").unwrap();
        let (salt, key) = stored.split_once(':').unwrap();

        assert_eq!(STANDARD.decode(salt).unwrap().len(), SALT_LEN);
        assert_eq!(STANDARD.decode(key).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn test_same_password_different_salt() {
        let hasher = hasher();
        let a = hasher.hash("User123!").unwrap();
        let b = hasher.hash("User123!").unwrap();

        assert_ne!(a, b);
        assert!(hasher.verify("User123!", &a));
        assert!(hasher.verify("User123!", &b));
    }

    #[test]
    fn test_tampered_record_rejected() {
        let hasher = hasher();
        let stored = hasher.hash("User123!").unwrap();
        let (salt, key) = stored.split_once(':').unwrap();

        let salt_bytes = STANDARD.decode(salt).unwrap();
        let key_bytes = STANDARD.decode(key).unwrap();

        for i in 0..salt_bytes.len() {
            let mut flipped = salt_bytes.clone();
            flipped[i] ^= 0x01;
            let tampered = format!("{}:{}", STANDARD.encode(&flipped), key);
            assert!(!hasher.verify("User123!", &tampered), "salt byte {} flip accepted", i);
        }

        for i in [0, key_bytes.len() - 1] {
            let mut flipped = key_bytes.clone();
            flipped[i] ^= 0x80;
            let tampered = format!("{}:{}", salt, STANDARD.encode(&flipped));
            assert!(!hasher.verify("User123!", &tampered), "key byte {} flip accepted", i);
        }

        assert!(hasher.verify("User123!", &stored));
    }

    #[test]
    fn test_wrong_length_records_rejected() {
        let hasher = hasher();
        let stored = hasher.hash("User123!").unwrap();
        let (salt, key) = stored.split_once(':').unwrap();
        let salt_bytes = STANDARD.decode(salt).unwrap();
        let key_bytes = STANDARD.decode(key).unwrap();

        // a truncated key is a genuine prefix of the derived key, still refused
        let short_key = format!("{}:{}", salt, STANDARD.encode(&key_bytes[..1]));
        assert!(!hasher.verify("User123!", &short_key));

        let short_salt = format!("{}:{}", STANDARD.encode(&salt_bytes[..8]), key);
        assert!(!hasher.verify("User123!", &short_salt));

        let mut long_key = key_bytes.clone();
        long_key.push(0);
        let long_key = format!("{}:{}", salt, STANDARD.encode(&long_key));
        assert!(!hasher.verify("User123!", &long_key));
    }

    #[test]
    fn test_malformed_records_fail_closed() {
        let hasher = hasher();
        for stored in [
            "",
            "no-separator",
            "a:b:c",
            "!!!:AAAA",
            "AAAA:!!!",
            ":AAAA",
            "AAAA:",
        ] {
            assert!(!hasher.verify("Admin123!", stored), "accepted {:?}", stored);
        }
    }

    #[test]
    fn test_iteration_count_matters() {
        let stored = PasswordHasher::with_iterations(1_000).hash("Admin123!").unwrap();
        assert!(!PasswordHasher::with_iterations(1_001).verify("Admin123!", &stored));
    }

    #[test]
    fn test_dummy_hash_is_well_formed() {
        let (salt, key) = DUMMY_HASH.split_once(':').unwrap();
        assert_eq!(STANDARD.decode(salt).unwrap().len(), SALT_LEN);
        assert_eq!(STANDARD.decode(key).unwrap().len(), KEY_LEN);
        assert!(!hasher().verify("Admin123!", DUMMY_HASH));
    }

    #[test]
    fn test_policy_names_first_missing_rule() {
        let hasher = hasher();
        let violation = |pw: &str| match hasher.hash(pw) {
            Err(PasswordError::Policy(v)) => v,
            other => panic!("expected policy violation for {:?}, got {:?}", pw, other),
        };

        assert_eq!(
            violation("Ab1!"),
            PasswordPolicyViolation::TooShort { min: 8, actual: 4 }
        );
        assert_eq!(
            violation(""),
            PasswordPolicyViolation::TooShort { min: 8, actual: 0 }
        );
        assert_eq!(violation("admin123!"), PasswordPolicyViolation::MissingUppercase);
        assert_eq!(violation("ADMIN123!"), PasswordPolicyViolation::MissingLowercase);
        assert_eq!(violation("Adminxyz!"), PasswordPolicyViolation::MissingDigit);
        assert_eq!(violation("Admin1234"), PasswordPolicyViolation::MissingSpecial);
    }

    #[test]
    fn test_policy_counts_characters_not_bytes() {
        // Seven characters, more than eight bytes
        assert_eq!(
            check_policy("Äbc12€!"),
            Err(PasswordPolicyViolation::TooShort { min: 8, actual: 7 })
        );
        assert!(check_policy("Äbc123€!").is_ok());
    }

    #[test]
    fn test_with_iterations_clamps_to_one() {
        assert_eq!(PasswordHasher::with_iterations(0).iterations(), 1);
        assert_eq!(PasswordHasher::new().iterations(), DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"key", b"key"));
        assert!(!constant_time_eq(b"key", b"kez"));
        assert!(!constant_time_eq(b"key", b"key2"));
    }
}
