// src/security/mod.rs
//! Secret-handling helpers shared by the wallet: zeroizing buffers and
//! redaction for anything that might end up in a log line.

pub mod secret;

// Secret buffer alias re-export
pub use secret::{secret_hex, vec_to_secret, SecretVec};

// Redaction helpers to avoid accidental secret prints
pub mod redaction;
pub use redaction::{redact_body, redact_hex_bytes};
