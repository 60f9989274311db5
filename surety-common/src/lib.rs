//! Types shared by every Flight Surety crate: account addresses, flight keys
//! and status codes, the error taxonomy, configuration and ledger events.

pub mod address;
pub mod amount;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod flight;
pub mod utils;

pub use address::Address;
pub use amount::{Amount, ETHER};
pub use config::SuretyConfig;
pub use error::{Result, SuretyError};
pub use events::{CommittedEvent, LedgerEvent};
pub use flight::{FlightKey, FlightStatus, StatusCode};
