use std::collections::BTreeMap;

use serde::Serialize;
use surety_common::{
    error::{Result, SuretyError},
    Address, Amount, FlightKey, FlightStatus, LedgerEvent, StatusCode,
};
use tracing::info;

use super::state::{values_only, State};
use crate::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flight {
    pub key: FlightKey,
    pub registered_at: u64,
}

/// A request for oracles to report on a flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRequest {
    pub request_index: u8,
    pub key: FlightKey,
    pub requester: Address,
    pub opened_at: u64,
    pub open: bool,
}

/// Where a flight stands in the status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    NoRequest,
    RequestOpen,
    Finalized,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FlightBook {
    #[serde(serialize_with = "values_only")]
    flights: BTreeMap<FlightKey, Flight>,
    #[serde(serialize_with = "values_only")]
    statuses: BTreeMap<FlightKey, FlightStatus>,
    #[serde(serialize_with = "values_only")]
    requests: BTreeMap<FlightKey, Vec<StatusRequest>>,
}

impl FlightBook {
    pub fn is_registered(&self, key: &FlightKey) -> bool {
        self.flights.contains_key(key)
    }

    pub fn flights(&self) -> impl Iterator<Item = &Flight> {
        self.flights.values()
    }

    /// Status of a registered flight; `Unknown` until finalized.
    pub fn status(&self, key: &FlightKey) -> Option<FlightStatus> {
        if !self.is_registered(key) {
            return None;
        }
        Some(
            self.statuses
                .get(key)
                .cloned()
                .unwrap_or_else(|| FlightStatus::unknown(key.clone())),
        )
    }

    pub fn is_finalized(&self, key: &FlightKey) -> bool {
        self.statuses.get(key).is_some_and(|s| s.finalized)
    }

    pub fn open_requests(&self, key: &FlightKey) -> Vec<StatusRequest> {
        self.requests
            .get(key)
            .map(|reqs| reqs.iter().filter(|r| r.open).cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_open_request(&self, key: &FlightKey, index: u8) -> bool {
        self.requests
            .get(key)
            .is_some_and(|reqs| reqs.iter().any(|r| r.open && r.request_index == index))
    }

    pub fn phase(&self, key: &FlightKey) -> RequestPhase {
        if self.is_finalized(key) {
            RequestPhase::Finalized
        } else if self.requests.get(key).is_some_and(|reqs| reqs.iter().any(|r| r.open)) {
            RequestPhase::RequestOpen
        } else {
            RequestPhase::NoRequest
        }
    }
}

impl State {
    /// Registers a flight operated by a funded airline.
    pub fn register_flight(&mut self, airline: Address, flight: &str, timestamp: u64) -> Result<FlightKey> {
        self.ensure_operational()?;
        if !self.membership.is_funded(&airline) {
            return Err(SuretyError::NotFunded(airline));
        }
        if flight.trim().is_empty() {
            return Err(SuretyError::InvalidFlight("flight number is empty".to_string()));
        }
        let key = FlightKey::new(airline, flight.trim(), timestamp);
        if self.flights.is_registered(&key) {
            return Err(SuretyError::AlreadyRegistered(format!("flight {}", key)));
        }
        self.flights.flights.insert(
            key.clone(),
            Flight {
                key: key.clone(),
                registered_at: self.commit_height + 1,
            },
        );
        self.emit(LedgerEvent::FlightRegistered { key: key.clone() });
        Ok(key)
    }

    /// Opens a status request and returns its pseudo-random index.
    ///
    /// Several requests may be open for the same flight at once; each call
    /// draws a fresh index.
    pub fn request_status(&mut self, requester: Address, key: &FlightKey) -> Result<u8> {
        self.ensure_operational()?;
        if !self.flights.is_registered(key) {
            return Err(SuretyError::UnknownFlight(key.clone()));
        }
        let range = self.config.oracle.index_range;
        let request_index = self.oracles.draw_index(&requester, self.commit_height, range)?;

        let opened_at = self.commit_height + 1;
        self.flights.requests.entry(key.clone()).or_default().push(StatusRequest {
            request_index,
            key: key.clone(),
            requester,
            opened_at,
            open: true,
        });
        self.emit(LedgerEvent::StatusRequested {
            request_index,
            key: key.clone(),
        });
        Ok(request_index)
    }

    /// Validates an oracle response against the committed state without changing it.
    pub fn check_response(&self, oracle: &Address, request_index: u8, key: &FlightKey) -> Result<()> {
        self.ensure_operational()?;
        let registered = self
            .oracles
            .get(oracle)
            .ok_or_else(|| SuretyError::Unauthorized(format!("{} is not a registered oracle", oracle)))?;
        if !registered.has_index(request_index) {
            return Err(SuretyError::IndexMismatch {
                oracle: *oracle,
                index: request_index,
            });
        }
        if !self.flights.is_registered(key) {
            return Err(SuretyError::UnknownFlight(key.clone()));
        }
        if self.flights.is_finalized(key) {
            return Err(SuretyError::AlreadyFinalized(key.clone()));
        }
        if !self.flights.has_open_request(key, request_index) {
            return Err(SuretyError::RequestNotOpen {
                key: key.clone(),
                index: request_index,
            });
        }
        Ok(())
    }

    /// Adopts `code` as the final status of `key` and settles its policies.
    ///
    /// Returns the total credited to insurees. A second call for the same
    /// flight fails with `AlreadyFinalized`, so payouts cannot repeat.
    pub fn finalize_status(&mut self, key: &FlightKey, code: StatusCode) -> Result<Amount> {
        self.ensure_operational()?;
        if !self.flights.is_registered(key) {
            return Err(SuretyError::UnknownFlight(key.clone()));
        }
        if self.flights.is_finalized(key) {
            return Err(SuretyError::AlreadyFinalized(key.clone()));
        }

        self.flights.statuses.insert(
            key.clone(),
            FlightStatus {
                key: key.clone(),
                code,
                finalized: true,
            },
        );
        if let Some(reqs) = self.flights.requests.get_mut(key) {
            reqs.iter_mut().for_each(|r| r.open = false);
        }
        self.emit(LedgerEvent::StatusFinalized { key: key.clone(), code });

        self.settle_policies(key, code)
    }
}

impl Ledger {
    pub async fn register_flight(&self, airline: Address, flight: &str, timestamp: u64) -> Result<FlightKey> {
        let key = self.transact(|state| state.register_flight(airline, flight, timestamp)).await?;
        info!("🛫 Flight {} registered", key);
        Ok(key)
    }

    pub async fn request_status(&self, requester: Address, key: &FlightKey) -> Result<u8> {
        let index = self.transact(|state| state.request_status(requester, key)).await?;
        info!("📡 Status requested for {} (index {})", key, index);
        Ok(index)
    }

    pub async fn flight_status(&self, key: &FlightKey) -> Option<FlightStatus> {
        self.read(|state| state.flights.status(key)).await
    }

    pub async fn open_requests(&self, key: &FlightKey) -> Vec<StatusRequest> {
        self.read(|state| state.flights.open_requests(key)).await
    }

    pub async fn request_phase(&self, key: &FlightKey) -> RequestPhase {
        self.read(|state| state.flights.phase(key)).await
    }
}
