use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use surety_common::{Address, FlightKey, StatusCode};

/// One oracle's answer to a status request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleResponse {
    pub oracle: Address,
    pub request_index: u8,
    pub key: FlightKey,
    pub code: StatusCode,
}

/// Stores accepted responses, grouped by flight, request index and reported code.
///
/// Responses for different codes never merge, and an oracle repeating itself
/// for the same triple is counted once.
#[derive(Debug, Default, Clone)]
pub struct ResponseRegistry {
    // FlightKey -> (Index, Code) -> Oracles
    responses: BTreeMap<FlightKey, BTreeMap<(u8, StatusCode), BTreeSet<Address>>>,
}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct oracles that reported `code` for `(key, index)`.
    pub fn count(&self, key: &FlightKey, index: u8, code: StatusCode) -> usize {
        self.oracles_for(key, index, code).map(|o| o.len()).unwrap_or(0)
    }

    /// The count `response` would produce once recorded.
    pub fn count_with(&self, response: &OracleResponse) -> usize {
        match self.oracles_for(&response.key, response.request_index, response.code) {
            Some(oracles) if oracles.contains(&response.oracle) => oracles.len(),
            Some(oracles) => oracles.len() + 1,
            None => 1,
        }
    }

    /// Records the response and returns the new count for its triple.
    pub fn record(&mut self, response: OracleResponse) -> usize {
        let oracles = self
            .responses
            .entry(response.key)
            .or_default()
            .entry((response.request_index, response.code))
            .or_default();
        oracles.insert(response.oracle);
        oracles.len()
    }

    /// Every tally recorded for a flight.
    pub fn tallies(&self, key: &FlightKey) -> Vec<(u8, StatusCode, usize)> {
        self.responses
            .get(key)
            .map(|by_code| {
                by_code
                    .iter()
                    .map(|((index, code), oracles)| (*index, *code, oracles.len()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn oracles_for(&self, key: &FlightKey, index: u8, code: StatusCode) -> Option<&BTreeSet<Address>> {
        self.responses.get(key).and_then(|by_code| by_code.get(&(index, code)))
    }
}
