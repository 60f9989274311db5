use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    amount::Amount,
    flight::{FlightKey, StatusCode},
};

/// Notifications published by the ledger after each successful commit.
///
/// Oracle agents watch `StatusRequested`; payout and reporting consumers
/// watch `StatusFinalized`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    AirlineRegistered { airline: Address, proposer: Address },
    AdmissionVote { candidate: Address, voter: Address, votes: usize, electorate: usize },
    AirlineFunded { airline: Address, amount: Amount },
    OracleRegistered { oracle: Address, indexes: [u8; 3] },
    FlightRegistered { key: FlightKey },
    StatusRequested { request_index: u8, key: FlightKey },
    OracleReported { oracle: Address, request_index: u8, key: FlightKey, code: StatusCode },
    StatusFinalized { key: FlightKey, code: StatusCode },
    PolicyPurchased { insuree: Address, key: FlightKey, amount: Amount },
    InsureeCredited { insuree: Address, key: FlightKey, amount: Amount },
    Claimed { insuree: Address, amount: Amount },
    OperatingStatusChanged { operational: bool },
}

/// An event stamped with the commit that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedEvent {
    pub commit_height: u64,
    pub event: LedgerEvent,
}
