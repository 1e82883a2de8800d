use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use scrypt::Params;
use sha2::Sha256;
use tracing::debug;
use crate::crypto::keystore::KeystoreError;
use crate::security::{vec_to_secret, SecretVec};

/// Longest key `derive_key` will produce.
pub const MAX_KEY_LENGTH: usize = 64;

/// Password-based KDFs a keystore may name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KdfAlgorithm {
    /// PBKDF2-HMAC-SHA256
    Pbkdf2 { iterations: u32 },
    /// scrypt with `N = 2^log_n`
    Scrypt { log_n: u8, r: u32, p: u32 },
}

pub struct KeyDerivation {
    algorithm: KdfAlgorithm,
}

impl KeyDerivation {
    pub fn new(algorithm: KdfAlgorithm) -> Self {
        debug!("Key derivation configured: {:?}", algorithm);
        Self { algorithm }
    }

    pub fn pbkdf2(iterations: u32) -> Self {
        Self::new(KdfAlgorithm::Pbkdf2 { iterations })
    }

    pub fn scrypt(log_n: u8, r: u32, p: u32) -> Self {
        Self::new(KdfAlgorithm::Scrypt { log_n, r, p })
    }

    /// scrypt from a raw cost `n`, which must be a power of two greater than 1.
    pub fn scrypt_from_n(n: u64, r: u32, p: u32) -> Result<Self, KeystoreError> {
        if n < 2 || !n.is_power_of_two() {
            return Err(KeystoreError::InvalidParams(format!(
                "scrypt n must be a power of two > 1, got {}",
                n
            )));
        }
        Ok(Self::scrypt(n.trailing_zeros() as u8, r, p))
    }

    pub fn algorithm(&self) -> &KdfAlgorithm {
        &self.algorithm
    }

    /// Stretch `password` into `key_length` bytes.
    ///
    /// CPU-bound; callers on the async runtime run this under `spawn_blocking`.
    pub fn derive_key(
        &self,
        password: &[u8],
        salt: &[u8],
        key_length: usize,
    ) -> Result<SecretVec, KeystoreError> {
        if key_length == 0 || key_length > MAX_KEY_LENGTH {
            return Err(KeystoreError::InvalidParams(format!(
                "key length must be 1..={}, got {}",
                MAX_KEY_LENGTH, key_length
            )));
        }
        let mut key = vec_to_secret(vec![0u8; key_length]);
        match &self.algorithm {
            KdfAlgorithm::Pbkdf2 { iterations } => {
                if *iterations == 0 {
                    return Err(KeystoreError::InvalidParams("pbkdf2 c must be > 0".into()));
                }
                pbkdf2_hmac::<Sha256>(password, salt, *iterations, &mut key);
            }
            KdfAlgorithm::Scrypt { log_n, r, p } => {
                let params = Params::new(*log_n, *r, *p, key_length)
                    .map_err(|e| KeystoreError::InvalidParams(format!("scrypt: {}", e)))?;
                scrypt::scrypt(password, salt, &params, &mut key)
                    .map_err(|e| KeystoreError::InvalidParams(format!("scrypt: {}", e)))?;
            }
        }
        debug!("Derived {}-byte key", key_length);
        Ok(key)
    }

    pub fn generate_salt(length: usize) -> Vec<u8> {
        let mut salt = vec![0u8; length];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        salt
    }
}

impl Default for KeyDerivation {
    fn default() -> Self {
        // N = 2^17, r = 8, p = 1
        Self::scrypt(17, 8, 1)
    }
}
