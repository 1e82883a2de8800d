//! Address parsing and EIP-55 normalisation.
//!
//! Every address the wallet stores or compares goes through
//! [`normalize_address`] so that `0xabc…`, `ABC…` and the checksummed form all
//! name the same account.

use ethers::types::Address;
use ethers::utils::to_checksum;
use sha3::{Digest, Keccak256};

use crate::core::errors::WalletError;

/// Parse a 20-byte hex address (with or without `0x`).
///
/// All-lowercase and all-uppercase bodies are accepted as-is; a mixed-case body
/// must carry a valid EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<Address, WalletError> {
    let trimmed = address.trim();
    let body = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")).unwrap_or(trimmed);
    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidAddress(address.to_string()));
    }
    let is_all_lower = !body.chars().any(|c| c.is_ascii_uppercase());
    let is_all_upper = !body.chars().any(|c| c.is_ascii_lowercase());
    if !is_all_lower && !is_all_upper && !is_eip55_checksum_valid(body) {
        return Err(WalletError::InvalidAddress(format!("{} (bad EIP-55 checksum)", address)));
    }
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(body, &mut bytes)
        .map_err(|e| WalletError::InvalidAddress(format!("{}: {}", address, e)))?;
    Ok(Address::from(bytes))
}

/// Canonical `0x`-prefixed EIP-55 form of an address string.
pub fn normalize_address(address: &str) -> Result<String, WalletError> {
    parse_address(address).map(|a| checksum(&a))
}

/// EIP-55 checksummed rendering.
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}

fn is_eip55_checksum_valid(body: &str) -> bool {
    let lower = body.to_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());
    for (i, ch) in body.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - (i % 2)))) & 0x0f;
        match ch {
            'a'..='f' if nibble >= 8 => return false,
            'A'..='F' if nibble < 8 => return false,
            _ => {}
        }
    }
    true
}
