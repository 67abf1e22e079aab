//! Credential hashing and the account password rules.
//!
//! Hashes are Argon2id PHC strings. Stored hashes carry their own cost
//! parameters, so verification works across config changes and
//! [`PasswordHasher::needs_rehash`] reports when a login should upgrade one.
//!
//! ```rust,ignore
//! use estate_auth::auth::{PasswordHasher, PasswordPolicy};
//!
//! let hasher = PasswordHasher::default();
//! let stored = hasher.hash("Passw0rd1")?;
//! assert!(hasher.verify("Passw0rd1", &stored)?);
//!
//! PasswordPolicy::default().check("weak")?; // Err(Validation([...]))
//! ```

use crate::error::{AuthError, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use std::sync::OnceLock;

/// Argon2id cost settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordConfig {
    /// Memory in KiB.
    pub memory_kib: u32,
    /// Passes over memory.
    pub iterations: u32,
    /// Degree of parallelism.
    pub lanes: u32,
}

impl Default for PasswordConfig {
    /// 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self::new(19 * 1024, 2, 1)
    }
}

impl PasswordConfig {
    pub fn new(memory_kib: u32, iterations: u32, lanes: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            lanes,
        }
    }

    /// Minimal cost for tests. Never use in production.
    pub fn fast() -> Self {
        Self::new(1024, 1, 1)
    }

    fn params(&self) -> Result<Params> {
        Params::new(self.memory_kib, self.iterations, self.lanes, None)
            .map_err(|e| AuthError::internal(format!("Argon2 parameters rejected: {e}")))
    }

    fn matches(&self, params: &Params) -> bool {
        params.m_cost() == self.memory_kib
            && params.t_cost() == self.iterations
            && params.p_cost() == self.lanes
    }
}

/// Argon2id hashing with a fixed cost profile.
#[derive(Clone, Debug, Default)]
pub struct PasswordHasher {
    config: PasswordConfig,
}

impl PasswordHasher {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PasswordConfig {
        &self.config
    }

    /// Hash `password` with a fresh salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.config.params()?);
        let salt = SaltString::generate(&mut OsRng);

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|phc| phc.to_string())
            .map_err(|e| AuthError::internal(format!("Password hashing failed: {e}")))
    }

    /// Check `password` against a stored PHC string.
    ///
    /// A wrong password is `Ok(false)`; a corrupt stored hash is an error.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let phc = parse_phc(stored)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &phc)
            .is_ok())
    }

    /// Spend one verification's worth of work against a throwaway hash.
    ///
    /// Keeps an unknown-account login as slow as a wrong-password login.
    pub fn dummy_verify(&self, password: &str) {
        static DECOY: OnceLock<Option<String>> = OnceLock::new();
        if let Some(decoy) = DECOY.get_or_init(|| self.hash("decoy-credential").ok()) {
            let _ = self.verify(password, decoy);
        }
    }

    /// True when `stored` is not Argon2id or used other cost settings.
    pub fn needs_rehash(&self, stored: &str) -> Result<bool> {
        let phc = parse_phc(stored)?;
        if phc.algorithm != argon2::ARGON2ID_IDENT {
            return Ok(true);
        }

        Ok(match Params::try_from(&phc) {
            Ok(params) => !self.config.matches(&params),
            Err(_) => true,
        })
    }
}

fn parse_phc(stored: &str) -> Result<PasswordHash<'_>> {
    PasswordHash::new(stored)
        .map_err(|e| AuthError::internal(format!("Stored password hash unreadable: {e}")))
}

/// One rule a password failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordViolation {
    TooShort(usize),
    TooLong(usize),
    NoLowercase,
    NoUppercase,
    NoDigit,
}

impl std::fmt::Display for PasswordViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort(min) => write!(f, "Password must be at least {min} characters"),
            Self::TooLong(max) => write!(f, "Password must be at most {max} characters"),
            Self::NoLowercase => f.write_str("Password must contain a lowercase letter"),
            Self::NoUppercase => f.write_str("Password must contain an uppercase letter"),
            Self::NoDigit => f.write_str("Password must contain a digit"),
        }
    }
}

/// Account password rules, applied at registration and reset.
///
/// Defaults: 8 to 128 characters with at least one lowercase letter, one
/// uppercase letter and one digit.
#[derive(Clone, Debug)]
pub struct PasswordPolicy {
    pub min_chars: usize,
    /// Upper bound so hashing cost stays predictable.
    pub max_chars: usize,
    pub mixed_case: bool,
    pub digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_chars: 8,
            max_chars: 128,
            mixed_case: true,
            digit: true,
        }
    }
}

impl PasswordPolicy {
    /// Every rule `password` breaks, in a fixed order.
    pub fn validate(&self, password: &str) -> Vec<PasswordViolation> {
        let chars = password.chars().count();
        let has = |pred: fn(char) -> bool| password.chars().any(pred);

        [
            (chars < self.min_chars, PasswordViolation::TooShort(self.min_chars)),
            (chars > self.max_chars, PasswordViolation::TooLong(self.max_chars)),
            (self.mixed_case && !has(char::is_lowercase), PasswordViolation::NoLowercase),
            (self.mixed_case && !has(char::is_uppercase), PasswordViolation::NoUppercase),
            (self.digit && !has(|c| c.is_ascii_digit()), PasswordViolation::NoDigit),
        ]
        .into_iter()
        .filter_map(|(broken, violation)| broken.then_some(violation))
        .collect()
    }

    pub fn is_valid(&self, password: &str) -> bool {
        self.validate(password).is_empty()
    }

    /// [`validate`](Self::validate), reported as [`AuthError::Validation`].
    pub fn check(&self, password: &str) -> Result<()> {
        let violations = self.validate(password);
        if violations.is_empty() {
            return Ok(());
        }
        Err(AuthError::Validation(
            violations.iter().map(ToString::to_string).collect(),
        ))
    }
}
