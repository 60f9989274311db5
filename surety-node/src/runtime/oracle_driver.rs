use std::sync::Arc;

use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use surety_common::{error::Result, Address, CommittedEvent, FlightKey, LedgerEvent, SuretyError};
use surety_consensus::AggregatorHandle;
use surety_ledger::Ledger;

use super::source::StatusSource;

/// A simulated oracle and the indexes it was assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleAgent {
    pub address: Address,
    pub indexes: [u8; 3],
}

/// Watches the ledger for status requests and answers them on behalf of simulated oracles.
pub struct OracleDriver {
    aggregator: AggregatorHandle,
    agents: Vec<OracleAgent>,
    source: Arc<dyn StatusSource>,
}

impl OracleDriver {
    pub fn new(aggregator: AggregatorHandle, agents: Vec<OracleAgent>, source: Arc<dyn StatusSource>) -> Self {
        Self { aggregator, agents, source }
    }

    /// Registers `count` oracles, paying the configured fee for each.
    pub async fn register_agents(ledger: &Ledger, count: usize) -> Result<Vec<OracleAgent>> {
        let fee = ledger.config().oracle.registration_fee;
        let mut agents = Vec::with_capacity(count);
        for n in 0..count {
            let address = Address::from_label(&format!("oracle-{}", n));
            let indexes = ledger.register_oracle(address, fee).await?;
            agents.push(OracleAgent { address, indexes });
        }
        info!("🔮 {} oracles registered", agents.len());
        Ok(agents)
    }

    pub fn agents(&self) -> &[OracleAgent] {
        &self.agents
    }

    /// Runs until the ledger's event channel closes.
    pub fn spawn(self, events: broadcast::Receiver<CommittedEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    async fn run(self, mut events: broadcast::Receiver<CommittedEvent>) {
        loop {
            match events.recv().await {
                Ok(CommittedEvent {
                    event: LedgerEvent::StatusRequested { request_index, key },
                    ..
                }) => self.answer(request_index, &key).await,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("⚠️ Oracle driver lagged behind by {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("🛑 Oracle driver stopped");
    }

    /// Lets every agent holding `request_index` report once.
    pub async fn answer(&self, request_index: u8, key: &FlightKey) {
        for agent in self.agents.iter().filter(|a| a.indexes.contains(&request_index)) {
            let Some(code) = self.source.status_of(&agent.address, key).await else {
                continue;
            };
            match self
                .aggregator
                .submit_response(agent.address, request_index, key.clone(), code)
                .await
            {
                Ok(_) => {}
                Err(SuretyError::AlreadyFinalized(_)) => {
                    debug!("✔️ {} already settled, {} stands down", key, agent.address);
                    break;
                }
                Err(SuretyError::IndexMismatch { .. }) | Err(SuretyError::RequestNotOpen { .. }) => {
                    debug!("🔇 {} cannot answer index {} for {}", agent.address, request_index, key);
                }
                Err(err) => warn!("⚠️ Oracle {} failed to report on {}: {}", agent.address, key, err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::source::FixedStatusSource;
    use surety_common::{StatusCode, SuretyConfig, ETHER};
    use surety_consensus::StatusAggregator;

    #[tokio::test]
    async fn answering_a_request_finalizes_the_flight() {
        let ledger = Arc::new(Ledger::new(SuretyConfig::default()).unwrap());
        let airline = ledger.config().genesis_airline;
        ledger.fund_airline(airline, 10 * ETHER).await.unwrap();
        let key = ledger.register_flight(airline, "ND1309", 1).await.unwrap();

        let agents = OracleDriver::register_agents(&ledger, 20).await.unwrap();
        let (aggregator, _task) = StatusAggregator::new(Arc::clone(&ledger)).spawn(16);
        let driver = OracleDriver::new(aggregator.clone(), agents, Arc::new(FixedStatusSource(StatusCode::LateWeather)));

        // Find a request index held by enough agents to reach the quorum.
        let mut index = aggregator.request_status(Address::ZERO, &key).await.unwrap();
        while driver.agents().iter().filter(|a| a.indexes.contains(&index)).count() < 3 {
            index = aggregator.request_status(Address::ZERO, &key).await.unwrap();
        }
        driver.answer(index, &key).await;

        let status = ledger.flight_status(&key).await.unwrap();
        assert!(status.finalized);
        assert_eq!(status.code, StatusCode::LateWeather);
    }

    #[tokio::test]
    async fn spawned_driver_reacts_to_requests() {
        let ledger = Arc::new(Ledger::new(SuretyConfig::default()).unwrap());
        let airline = ledger.config().genesis_airline;
        ledger.fund_airline(airline, 10 * ETHER).await.unwrap();
        let key = ledger.register_flight(airline, "ND1309", 1).await.unwrap();

        let agents = OracleDriver::register_agents(&ledger, 20).await.unwrap();
        let (aggregator, _task) = StatusAggregator::new(Arc::clone(&ledger)).spawn(16);
        let driver = OracleDriver::new(aggregator.clone(), agents, Arc::new(FixedStatusSource(StatusCode::OnTime)));
        let _driver_task = driver.spawn(ledger.subscribe());

        let mut finalized = ledger.subscribe();
        for _ in 0..50 {
            aggregator.request_status(Address::ZERO, &key).await.unwrap();
            let settled = tokio::time::timeout(std::time::Duration::from_millis(200), async {
                loop {
                    if let Ok(CommittedEvent { event: LedgerEvent::StatusFinalized { .. }, .. }) = finalized.recv().await {
                        return;
                    }
                }
            })
            .await;
            if settled.is_ok() {
                break;
            }
        }
        assert_eq!(ledger.flight_status(&key).await.unwrap().code, StatusCode::OnTime);
    }
}
