use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use surety_common::{
    error::{Result, SuretyError},
    Address, Amount, FlightKey, LedgerEvent, StatusCode,
};
use surety_ledger::Ledger;

use super::registry::{OracleResponse, ResponseRegistry};

/// What an accepted response led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Counted; the code has `responses` of the `required` matching reports.
    Recorded { responses: usize, required: usize },
    /// This response completed the quorum and finalized the flight.
    Finalized { code: StatusCode, credited: Amount },
}

#[derive(Debug)]
enum AggregatorCommand {
    Submit {
        response: OracleResponse,
        reply: oneshot::Sender<Result<SubmitOutcome>>,
    },
    Tallies {
        key: FlightKey,
        reply: oneshot::Sender<Vec<(u8, StatusCode, usize)>>,
    },
}

/// Owns the response table and processes submissions one at a time.
///
/// Validation, counting and finalization for a submission run inside a single
/// ledger commit. The response is added to the table only after that commit
/// succeeds, so a rejected submission leaves no trace.
pub struct StatusAggregator {
    ledger: Arc<Ledger>,
    registry: ResponseRegistry,
    min_responses: usize,
}

impl StatusAggregator {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        let min_responses = ledger.config().oracle.min_responses;
        Self {
            ledger,
            registry: ResponseRegistry::new(),
            min_responses,
        }
    }

    /// Moves the aggregator onto its own task and returns a handle to it.
    ///
    /// The task ends when every handle has been dropped.
    pub fn spawn(self, queue_cap: usize) -> (AggregatorHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<AggregatorCommand>(queue_cap);
        let ledger = Arc::clone(&self.ledger);

        let task = tokio::spawn(async move {
            let mut aggregator = self;
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    AggregatorCommand::Submit { response, reply } => {
                        let result = aggregator.submit(response).await;
                        let _ = reply.send(result);
                    }
                    AggregatorCommand::Tallies { key, reply } => {
                        let _ = reply.send(aggregator.registry.tallies(&key));
                    }
                }
            }
            debug!("🛑 Status aggregator stopped");
        });

        (AggregatorHandle { tx, ledger }, task)
    }

    /// Validates, counts and possibly finalizes one response.
    pub async fn submit(&mut self, response: OracleResponse) -> Result<SubmitOutcome> {
        let min_responses = self.min_responses;
        let registry = &self.registry;

        let result = self
            .ledger
            .transact(|state| {
                state.check_response(&response.oracle, response.request_index, &response.key)?;
                let responses = registry.count_with(&response);
                state.emit(LedgerEvent::OracleReported {
                    oracle: response.oracle,
                    request_index: response.request_index,
                    key: response.key.clone(),
                    code: response.code,
                });

                if responses >= min_responses {
                    let credited = state.finalize_status(&response.key, response.code)?;
                    Ok(SubmitOutcome::Finalized {
                        code: response.code,
                        credited,
                    })
                } else {
                    Ok(SubmitOutcome::Recorded {
                        responses,
                        required: min_responses,
                    })
                }
            })
            .await;

        match &result {
            Ok(SubmitOutcome::Finalized { code, credited }) => {
                tracing::info!(target: "consensus", "EVENT:FINALIZE key={} code={} credited={}", response.key, code, credited);
                info!("🏁 Flight {} finalized as {}", response.key, code);
            }
            Ok(SubmitOutcome::Recorded { responses, required }) => {
                debug!(
                    "📨 {} reported {} for {} ({}/{})",
                    response.oracle, response.code, response.key, responses, required
                );
            }
            Err(SuretyError::IndexMismatch { oracle, index }) => {
                debug!("🔇 Oracle {} does not hold index {}", oracle, index);
            }
            Err(err) if err.is_benign() || matches!(err, SuretyError::AlreadyFinalized(_)) => {
                debug!("↩️ Response from {} ignored: {}", response.oracle, err);
            }
            Err(err) => warn!("⚠️ Response from {} rejected: {}", response.oracle, err),
        }

        if result.is_ok() {
            self.registry.record(response);
        }
        result
    }

    pub fn registry(&self) -> &ResponseRegistry {
        &self.registry
    }
}

/// Cloneable front end to a running [`StatusAggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorHandle {
    tx: mpsc::Sender<AggregatorCommand>,
    ledger: Arc<Ledger>,
}

impl AggregatorHandle {
    /// Opens a status request; oracles holding the returned index may answer it.
    pub async fn request_status(&self, requester: Address, key: &FlightKey) -> Result<u8> {
        self.ledger.request_status(requester, key).await
    }

    pub async fn submit_response(
        &self,
        oracle: Address,
        request_index: u8,
        key: FlightKey,
        code: StatusCode,
    ) -> Result<SubmitOutcome> {
        let (reply, rx) = oneshot::channel();
        let response = OracleResponse {
            oracle,
            request_index,
            key,
            code,
        };
        self.tx
            .send(AggregatorCommand::Submit { response, reply })
            .await
            .map_err(|e| SuretyError::ChannelClosed(format!("aggregator queue: {e}")))?;
        rx.await
            .map_err(|e| SuretyError::ChannelClosed(format!("aggregator reply: {e}")))?
    }

    /// `(index, code, responses)` for every tally recorded against `key`.
    pub async fn tallies(&self, key: &FlightKey) -> Result<Vec<(u8, StatusCode, usize)>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(AggregatorCommand::Tallies { key: key.clone(), reply })
            .await
            .map_err(|e| SuretyError::ChannelClosed(format!("aggregator queue: {e}")))?;
        rx.await
            .map_err(|e| SuretyError::ChannelClosed(format!("aggregator reply: {e}")))
    }

    pub async fn response_count(&self, key: &FlightKey, request_index: u8, code: StatusCode) -> Result<usize> {
        Ok(self
            .tallies(key)
            .await?
            .into_iter()
            .find(|(index, c, _)| *index == request_index && *c == code)
            .map(|(_, _, count)| count)
            .unwrap_or(0))
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}
