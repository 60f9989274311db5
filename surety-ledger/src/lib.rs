//! The shared, versioned ledger every governance operation commits against.
//!
//! One `RwLock` guards the whole [`State`]; holding its write half is the
//! commit boundary, so votes, oracle responses and payouts are serialized in
//! a single global order. Committed events are appended to an in-memory log
//! and broadcast to subscribers.

pub mod core;

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use surety_common::{error::Result, Address, CommittedEvent, SuretyConfig};

pub use crate::core::{
    flights::{Flight, FlightBook, RequestPhase, StatusRequest},
    insurance::{ClaimOutcome, InsuranceBook, InsurancePolicy},
    membership::{Airline, MembershipStore, Registration},
    oracles::{Oracle, OracleRegistry},
    state::State,
};

#[derive(Debug)]
pub struct Ledger {
    config: Arc<SuretyConfig>,
    state: RwLock<State>,
    log: RwLock<Vec<CommittedEvent>>,
    events: broadcast::Sender<CommittedEvent>,
}

impl Ledger {
    pub fn new(config: SuretyConfig) -> Result<Self> {
        let config = Arc::new(config);
        let state = State::genesis(Arc::clone(&config))?;
        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            config,
            state: RwLock::new(state),
            log: RwLock::new(Vec::new()),
            events,
        })
    }

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    /// Runs `f` as one atomic commit.
    ///
    /// `f` works on a scratch copy of the latest state. On `Ok` the copy
    /// becomes the committed state, the commit height advances and the events
    /// `f` raised are logged and broadcast in order. On `Err` nothing changes.
    pub async fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut State) -> Result<T>,
    {
        let mut state = self.state.write().await;
        let mut scratch = state.clone();
        scratch.journal.clear();

        let value = f(&mut scratch)?;

        scratch.commit_height += 1;
        let height = scratch.commit_height;
        let events = scratch.take_journal();
        *state = scratch;

        let mut log = self.log.write().await;
        for event in events {
            let committed = CommittedEvent {
                commit_height: height,
                event,
            };
            log.push(committed.clone());
            // No subscribers is fine; the log keeps the record.
            let _ = self.events.send(committed);
        }
        drop(log);
        drop(state);

        debug!("🧱 Commit #{} applied", height);
        Ok(value)
    }

    /// Runs a read-only query against the latest committed state.
    pub async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&State) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommittedEvent> {
        self.events.subscribe()
    }

    /// Committed events with a height strictly above `height`.
    pub async fn events_since(&self, height: u64) -> Vec<CommittedEvent> {
        self.log
            .read()
            .await
            .iter()
            .filter(|e| e.commit_height > height)
            .cloned()
            .collect()
    }

    pub async fn commit_height(&self) -> u64 {
        self.read(|state| state.commit_height).await
    }

    pub async fn is_operational(&self) -> bool {
        self.read(|state| state.operational).await
    }

    pub async fn set_operating_status(&self, caller: Address, operational: bool) -> Result<()> {
        self.transact(|state| state.set_operating_status(caller, operational)).await
    }

    /// JSON view of the committed state for read-only reporting.
    pub async fn snapshot(&self) -> Result<String> {
        let state = self.state.read().await;
        Ok(serde_json::to_string_pretty(&*state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surety_common::{LedgerEvent, SuretyError, ETHER};

    #[tokio::test]
    async fn failed_transaction_leaves_state_untouched() {
        let ledger = Ledger::new(SuretyConfig::default()).unwrap();
        let genesis = ledger.config().genesis_airline;

        let err = ledger
            .transact(|state| {
                state.fund_airline(genesis, 10 * ETHER)?;
                Err::<(), _>(SuretyError::NotOperational)
            })
            .await
            .unwrap_err();
        assert_eq!(err, SuretyError::NotOperational);
        assert!(!ledger.is_funded(&genesis).await);
        assert_eq!(ledger.treasury().await, 0);
        assert_eq!(ledger.commit_height().await, 0);
        assert!(ledger.events_since(0).await.is_empty());
    }

    #[tokio::test]
    async fn committed_events_are_broadcast_and_logged() {
        let ledger = Ledger::new(SuretyConfig::default()).unwrap();
        let mut rx = ledger.subscribe();
        let genesis = ledger.config().genesis_airline;

        ledger.fund_airline(genesis, 10 * ETHER).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.commit_height, 1);
        assert_eq!(received.event, LedgerEvent::AirlineFunded { airline: genesis, amount: 10 * ETHER });
        assert_eq!(ledger.events_since(0).await, vec![received]);
        assert!(ledger.events_since(1).await.is_empty());
    }

    #[tokio::test]
    async fn paused_ledger_rejects_mutations() {
        let ledger = Ledger::new(SuretyConfig::default()).unwrap();
        let owner = ledger.config().owner;
        let genesis = ledger.config().genesis_airline;

        ledger.set_operating_status(owner, false).await.unwrap();
        assert!(!ledger.is_operational().await);
        assert_eq!(ledger.fund_airline(genesis, 10 * ETHER).await, Err(SuretyError::NotOperational));
        assert_eq!(
            ledger.register_oracle(Address::from_label("oracle"), ETHER).await,
            Err(SuretyError::NotOperational)
        );

        ledger.set_operating_status(owner, true).await.unwrap();
        ledger.fund_airline(genesis, 10 * ETHER).await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_exposes_committed_state() {
        let ledger = Ledger::new(SuretyConfig::default()).unwrap();
        let genesis = ledger.config().genesis_airline;
        ledger.fund_airline(genesis, 10 * ETHER).await.unwrap();
        let snapshot: serde_json::Value = serde_json::from_str(&ledger.snapshot().await.unwrap()).unwrap();
        assert_eq!(snapshot["commit_height"], 1);
        assert_eq!(snapshot["operational"], true);
    }
}
