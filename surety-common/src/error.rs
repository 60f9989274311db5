use thiserror::Error;

use crate::{address::Address, flight::FlightKey};

/// Typed rejection reasons for every governance and insurance operation.
///
/// A call that returns one of these leaves the ledger exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuretyError {
    /// The caller lacks the role or funding the operation requires.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Airline {0} is not funded")]
    NotFunded(Address),

    #[error("Airline {0} is not registered")]
    NotRegistered(Address),

    /// Benign: the target is already a member, nothing to do.
    #[error("{0} is already registered")]
    AlreadyRegistered(String),

    #[error("Airline {0} is already funded")]
    AlreadyFunded(Address),

    #[error("Airline {0} was never proposed for admission")]
    UnknownCandidate(Address),

    #[error("{insuree} already holds a policy for {key}")]
    AlreadyInsured { insuree: Address, key: FlightKey },

    #[error("Flight {0} already has a final status")]
    AlreadyFinalized(FlightKey),

    #[error("Index {index} is not assigned to oracle {oracle}")]
    IndexMismatch { oracle: Address, index: u8 },

    #[error("No open status request with index {index} for {key}")]
    RequestNotOpen { key: FlightKey, index: u8 },

    #[error("Insufficient fee: paid {paid}, required {required}")]
    InsufficientFee { paid: u128, required: u128 },

    #[error("Unknown flight: {0}")]
    UnknownFlight(FlightKey),

    #[error("Invalid flight: {0}")]
    InvalidFlight(String),

    #[error("Invalid premium {amount}: must be between 1 and {max}")]
    InvalidPremium { amount: u128, max: u128 },

    #[error("Contract is not operational")]
    NotOperational,

    #[error("Treasury holds {available}, cannot pay {requested}")]
    TreasuryExhausted { available: u128, requested: u128 },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

impl SuretyError {
    /// `AlreadyRegistered` is reported to the caller but is a no-op, not a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, SuretyError::AlreadyRegistered(_))
    }
}

impl From<std::io::Error> for SuretyError {
    fn from(err: std::io::Error) -> Self {
        SuretyError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SuretyError {
    fn from(err: serde_json::Error) -> Self {
        SuretyError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SuretyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_already_registered_is_benign() {
        assert!(SuretyError::AlreadyRegistered("0x01".into()).is_benign());
        assert!(!SuretyError::NotOperational.is_benign());
        assert!(!SuretyError::Unauthorized("x".into()).is_benign());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SuretyError = io.into();
        assert!(matches!(err, SuretyError::Io(msg) if msg.contains("missing")));
    }
}
