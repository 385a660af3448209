//! Password hashing.
//!
//! The manager only sees the [`PasswordHasher`] trait; [`Argon2Hasher`] is the
//! production implementation.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use core_config::{ConfigError, FromEnv, env_parse};

use crate::error::{UserError, UserResult};

/// Credential collaborator: turns raw passwords into stored hashes and back.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, raw: &str) -> UserResult<String>;

    /// `Ok(false)` on mismatch; `Err` only if `encoded` is not a valid hash.
    fn verify(&self, raw: &str, encoded: &str) -> UserResult<bool>;
}

/// Argon2id with a random salt per hash.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// `m_cost` is in KiB.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> UserResult<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| UserError::PasswordHash(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, raw: &str) -> UserResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(raw.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserError::PasswordHash(e.to_string()))
    }

    fn verify(&self, raw: &str, encoded: &str) -> UserResult<bool> {
        let parsed =
            PasswordHash::new(encoded).map_err(|e| UserError::PasswordHash(e.to_string()))?;

        // Parameters come from the encoded hash, not from `self`.
        Ok(Argon2::default()
            .verify_password(raw.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Argon2 cost settings
///
/// - `ARGON2_MEMORY_KIB` (default 19456)
/// - `ARGON2_ITERATIONS` (default 2)
/// - `ARGON2_PARALLELISM` (default 1)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HasherConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HasherConfig {
    pub fn build(&self) -> UserResult<Argon2Hasher> {
        Argon2Hasher::with_params(self.memory_kib, self.iterations, self.parallelism)
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl FromEnv for HasherConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            memory_kib: env_parse("ARGON2_MEMORY_KIB", &Params::DEFAULT_M_COST.to_string())?,
            iterations: env_parse("ARGON2_ITERATIONS", &Params::DEFAULT_T_COST.to_string())?,
            parallelism: env_parse("ARGON2_PARALLELISM", &Params::DEFAULT_P_COST.to_string())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> Argon2Hasher {
        Argon2Hasher::with_params(8, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_then_verify() {
        let hasher = fast_hasher();
        let encoded = hasher.hash("pw123").unwrap();

        assert!(encoded.starts_with("$argon2id$"));
        assert!(hasher.verify("pw123", &encoded).unwrap());
        assert!(!hasher.verify("pw124", &encoded).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = fast_hasher();
        assert_ne!(hasher.hash("pw123").unwrap(), hasher.hash("pw123").unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        let result = fast_hasher().verify("pw123", "not-a-phc-string");
        assert!(matches!(result, Err(UserError::PasswordHash(_))));
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        assert!(Argon2Hasher::with_params(8, 0, 1).is_err());
    }

    #[test]
    fn test_hasher_config_from_env() {
        temp_env::with_vars(
            [
                ("ARGON2_MEMORY_KIB", Some("4096")),
                ("ARGON2_ITERATIONS", None),
                ("ARGON2_PARALLELISM", None),
            ],
            || {
                let config = HasherConfig::from_env().unwrap();
                assert_eq!(config.memory_kib, 4096);
                assert_eq!(config.iterations, Params::DEFAULT_T_COST);
                assert!(config.build().is_ok());
            },
        );
    }
}
