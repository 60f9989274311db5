use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use surety_common::{
    error::{Result, SuretyError},
    Address, Amount, LedgerEvent,
};
use tracing::info;

use super::state::State;
use crate::Ledger;

/// An airline known to the membership set, admitted or pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Airline {
    pub address: Address,
    pub registered: bool,
    pub funded: bool,
    /// Funded airlines that voted to admit this one. Kept after admission as an audit trail.
    pub votes: BTreeSet<Address>,
    pub proposer: Option<Address>,
    pub registered_at: Option<u64>,
}

impl Airline {
    fn candidate(address: Address, proposer: Option<Address>) -> Self {
        Self {
            address,
            registered: false,
            funded: false,
            votes: BTreeSet::new(),
            proposer,
            registered_at: None,
        }
    }
}

/// Result of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Admitted on the fast path.
    Registered,
    /// Waiting for votes from the funded electorate.
    Pending,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MembershipStore {
    airlines: BTreeMap<Address, Airline>,
}

impl MembershipStore {
    pub(crate) fn insert_genesis(&mut self, address: Address) {
        let mut airline = Airline::candidate(address, None);
        airline.registered = true;
        airline.registered_at = Some(0);
        self.airlines.insert(address, airline);
    }

    pub fn get(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.airlines.get(address).is_some_and(|a| a.registered)
    }

    pub fn is_funded(&self, address: &Address) -> bool {
        self.airlines.get(address).is_some_and(|a| a.funded)
    }

    pub fn is_pending(&self, address: &Address) -> bool {
        self.airlines.get(address).is_some_and(|a| !a.registered)
    }

    pub fn registered_count(&self) -> usize {
        self.airlines.values().filter(|a| a.registered).count()
    }

    pub fn funded_count(&self) -> usize {
        self.airlines.values().filter(|a| a.funded).count()
    }

    pub fn funded_airlines(&self) -> Vec<Address> {
        self.airlines.values().filter(|a| a.funded).map(|a| a.address).collect()
    }

    pub fn pending_candidates(&self) -> Vec<Address> {
        self.airlines.values().filter(|a| !a.registered).map(|a| a.address).collect()
    }

    /// Adds `voter` to the candidate's vote set. Returns `false` for a repeated vote.
    pub fn record_vote(&mut self, candidate: &Address, voter: Address) -> Result<bool> {
        let airline = self
            .airlines
            .get_mut(candidate)
            .ok_or(SuretyError::UnknownCandidate(*candidate))?;
        Ok(airline.votes.insert(voter))
    }

    pub fn vote_count(&self, candidate: &Address) -> usize {
        self.airlines.get(candidate).map(|a| a.votes.len()).unwrap_or(0)
    }

    /// Marks a known candidate as registered.
    pub fn admit(&mut self, candidate: &Address, height: u64) -> Result<()> {
        let airline = self
            .airlines
            .get_mut(candidate)
            .ok_or(SuretyError::UnknownCandidate(*candidate))?;
        airline.registered = true;
        airline.registered_at = Some(height);
        Ok(())
    }

    fn propose(&mut self, candidate: Address, proposer: Address) {
        self.airlines
            .entry(candidate)
            .or_insert_with(|| Airline::candidate(candidate, Some(proposer)));
    }
}

impl State {
    /// Requests admission of `candidate` on behalf of a funded airline.
    ///
    /// Below the fast registration threshold the candidate is registered at
    /// once; from the threshold on it becomes a pending candidate that only
    /// votes can admit.
    pub fn register_airline(&mut self, requester: Address, candidate: Address) -> Result<Registration> {
        self.ensure_operational()?;
        if !self.membership.is_funded(&requester) {
            return Err(SuretyError::Unauthorized(format!(
                "{} must be a funded airline to register others",
                requester
            )));
        }
        if self.membership.is_registered(&candidate) {
            return Err(SuretyError::AlreadyRegistered(candidate.to_string()));
        }

        let threshold = self.config.membership.fast_registration_threshold;
        self.membership.propose(candidate, requester);

        if self.membership.registered_count() < threshold {
            self.membership.admit(&candidate, self.commit_height + 1)?;
            self.emit(LedgerEvent::AirlineRegistered { airline: candidate, proposer: requester });
            Ok(Registration::Registered)
        } else {
            Ok(Registration::Pending)
        }
    }

    /// Pays the funding fee for a registered airline, making it part of the electorate.
    pub fn fund_airline(&mut self, airline: Address, amount: Amount) -> Result<()> {
        self.ensure_operational()?;
        let required = self.config.membership.funding_fee;
        if amount < required {
            return Err(SuretyError::InsufficientFee { paid: amount, required });
        }
        let entry = match self.membership.airlines.get_mut(&airline) {
            Some(a) if a.registered => a,
            _ => return Err(SuretyError::NotRegistered(airline)),
        };
        if entry.funded {
            return Err(SuretyError::AlreadyFunded(airline));
        }
        entry.funded = true;
        self.deposit(amount);
        self.emit(LedgerEvent::AirlineFunded { airline, amount });
        Ok(())
    }
}

impl Ledger {
    pub async fn register_airline(&self, requester: Address, candidate: Address) -> Result<Registration> {
        let outcome = self.transact(|state| state.register_airline(requester, candidate)).await?;
        info!("✈️ Airline {} admission requested by {}: {:?}", candidate, requester, outcome);
        Ok(outcome)
    }

    pub async fn fund_airline(&self, airline: Address, amount: Amount) -> Result<()> {
        self.transact(|state| state.fund_airline(airline, amount)).await?;
        info!("💰 Airline {} funded with {}", airline, amount);
        Ok(())
    }

    pub async fn is_registered(&self, airline: &Address) -> bool {
        self.read(|state| state.membership.is_registered(airline)).await
    }

    pub async fn is_funded(&self, airline: &Address) -> bool {
        self.read(|state| state.membership.is_funded(airline)).await
    }

    pub async fn airline(&self, airline: &Address) -> Option<Airline> {
        self.read(|state| state.membership.get(airline).cloned()).await
    }

    pub async fn funded_airlines(&self) -> Vec<Address> {
        self.read(|state| state.membership.funded_airlines()).await
    }
}
