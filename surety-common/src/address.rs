use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::crypto::hash::sha256;

pub const ADDRESS_LEN: usize = 20;

/// Errors related to parsing account addresses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address must start with 0x: {0}")]
    MissingPrefix(String),

    #[error("Invalid hex in address: {0}")]
    InvalidHex(String),

    /// Decoded length is not 20 bytes.
    #[error("Invalid address length: {0}")]
    InvalidLength(usize),
}

/// A 20-byte account identifier, written as `0x` followed by 40 hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Deterministically derives an address from an arbitrary label.
    ///
    /// Used by the simulator and tests to mint stable accounts ("airline-1", "oracle-7", ...).
    pub fn from_label(label: &str) -> Self {
        let digest = sha256(label.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[..ADDRESS_LEN]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix("0x")
            .ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;
        let decoded = hex::decode(body).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        let bytes: [u8; ADDRESS_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(decoded.len()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<&str> for Address {
    type Error = AddressError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
