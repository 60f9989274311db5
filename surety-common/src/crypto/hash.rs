use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    address::Address,
    error::{Result, SuretyError},
};

/// Computes the SHA-256 digest of the given data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[derive(Serialize)]
struct IndexSeedView<'a> {
    seed: &'a [u8; 32],
    account: &'a Address,
    nonce: u64,
    context: u64,
}

/// Pseudo-random index in `0..range` derived from `(seed, account, nonce, context)`.
///
/// Pure: the same inputs always give the same index. `context` is the ledger
/// commit height at the time of derivation, `nonce` a counter the caller bumps
/// after every draw.
pub fn derive_index(seed: &[u8; 32], account: &Address, nonce: u64, context: u64, range: u8) -> Result<u8> {
    if range == 0 {
        return Err(SuretyError::Config("index range must be positive".to_string()));
    }
    let bytes = bincode::serialize(&IndexSeedView { seed, account, nonce, context })
        .map_err(|e| SuretyError::Serialization(format!("index seed: {e}")))?;
    let hash = sha256(&bytes);
    let mut word = [0u8; 8];
    word.copy_from_slice(&hash[..8]);
    Ok((u64::from_be_bytes(word) % range as u64) as u8)
}

/// Parses a 32-byte seed from hex. Shorter input is rejected.
pub fn parse_seed(hex_seed: &str) -> Result<[u8; 32]> {
    let decoded = hex::decode(hex_seed.trim_start_matches("0x"))
        .map_err(|e| SuretyError::Config(format!("seed is not hex: {e}")))?;
    decoded
        .as_slice()
        .try_into()
        .map_err(|_| SuretyError::Config(format!("seed must be 32 bytes, got {}", decoded.len())))
}
