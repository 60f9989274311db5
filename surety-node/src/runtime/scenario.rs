use std::{sync::Arc, time::Duration};

use tokio::{sync::broadcast, time::timeout};
use tracing::{info, warn};

use surety_common::{
    amount::format_ether, error::Result, utils::time::current_time, Address, Amount, CommittedEvent, FlightKey,
    FlightStatus, LedgerEvent, ETHER,
};
use surety_ledger::{ClaimOutcome, Registration};

use super::{
    builder::SuretyRuntime,
    oracle_driver::OracleDriver,
    source::StatusSource,
};

/// Parameters of a full end-to-end run.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Total airlines, genesis included.
    pub airlines: usize,
    pub oracles: usize,
    pub flight: String,
    pub premium: Amount,
    /// Status requests to issue before giving up on finalization.
    pub max_requests: usize,
    /// How long to wait for finalization after each request.
    pub wait: Duration,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            airlines: 5,
            oracles: 20,
            flight: "ND1309".to_string(),
            premium: ETHER,
            max_requests: 20,
            wait: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub key: FlightKey,
    pub passenger: Address,
    pub status: Option<FlightStatus>,
    pub requests: usize,
    pub claim: ClaimOutcome,
    pub treasury: Amount,
    pub commit_height: u64,
}

impl ScenarioReport {
    pub fn finalized(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.finalized)
    }
}

/// Drives one flight from airline onboarding to the passenger's claim.
pub async fn run_scenario(
    runtime: &SuretyRuntime,
    scenario: &Scenario,
    source: Arc<dyn StatusSource>,
) -> Result<ScenarioReport> {
    let ledger = &runtime.ledger;
    let genesis = ledger.config().genesis_airline;
    let funding_fee = ledger.config().membership.funding_fee;

    // 1. Airlines
    ledger.fund_airline(genesis, funding_fee).await?;
    let mut members = vec![genesis];
    for n in 1..scenario.airlines {
        let candidate = Address::from_label(&format!("airline-{}", n));
        if ledger.register_airline(genesis, candidate).await? == Registration::Pending {
            for voter in &members {
                if runtime.admissions.vote(*voter, candidate).await?.is_admitted() {
                    break;
                }
            }
        }
        ledger.fund_airline(candidate, funding_fee).await?;
        members.push(candidate);
    }
    info!("🏢 {} airlines registered and funded", members.len());

    // 2. Oracles
    let agents = OracleDriver::register_agents(ledger, scenario.oracles).await?;
    let driver = OracleDriver::new(runtime.aggregator.clone(), agents, source);
    let driver_task = driver.spawn(ledger.subscribe());

    // 3. Flight and policy
    let departure = current_time();
    let key = ledger.register_flight(genesis, &scenario.flight, departure).await?;
    if let Some(at) = chrono::DateTime::from_timestamp(departure as i64, 0) {
        info!("🛫 {} departs {}", key.flight, at.format("%Y-%m-%d %H:%M UTC"));
    }
    let passenger = Address::from_label("passenger-0");
    ledger.purchase(passenger, &key, scenario.premium).await?;

    // 4. Status requests until the oracles settle the flight
    let mut events = ledger.subscribe();
    let mut requests = 0;
    while requests < scenario.max_requests && !is_finalized(runtime, &key).await {
        runtime.aggregator.request_status(passenger, &key).await?;
        requests += 1;
        if timeout(scenario.wait, wait_for_finalization(&mut events, &key)).await.is_err() {
            info!("⏳ Request {} for {} did not reach a quorum", requests, key);
        }
    }
    driver_task.abort();

    let status = ledger.flight_status(&key).await;
    if !is_finalized(runtime, &key).await {
        warn!("⚠️ {} still unsettled after {} requests", key, requests);
    }

    // 5. Claim
    let claim = ledger.claim(passenger).await?;
    let report = ScenarioReport {
        key,
        passenger,
        status,
        requests,
        claim,
        treasury: ledger.treasury().await,
        commit_height: ledger.commit_height().await,
    };
    info!(
        "📊 {} settled={} claim={:?} treasury={} ETH",
        report.key,
        report.finalized(),
        report.claim,
        format_ether(report.treasury)
    );
    Ok(report)
}

async fn is_finalized(runtime: &SuretyRuntime, key: &FlightKey) -> bool {
    runtime
        .ledger
        .flight_status(key)
        .await
        .is_some_and(|s| s.finalized)
}

async fn wait_for_finalization(events: &mut broadcast::Receiver<CommittedEvent>, key: &FlightKey) {
    loop {
        match events.recv().await {
            Ok(CommittedEvent {
                event: LedgerEvent::StatusFinalized { key: finalized, .. },
                ..
            }) if &finalized == key => return,
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
