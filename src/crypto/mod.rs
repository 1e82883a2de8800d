pub mod kdf;
pub mod keystore;

pub use self::kdf::{KdfAlgorithm, KeyDerivation};
pub use self::keystore::{decrypt_keystore, encrypt_keystore, KeystoreError, KeystoreJson, ScryptParams};
