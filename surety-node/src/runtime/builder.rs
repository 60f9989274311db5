use std::{path::Path, sync::Arc};

use tokio::task::JoinHandle;

use surety_common::{error::Result, SuretyConfig};
use surety_consensus::{AdmissionEngine, AggregatorHandle, StatusAggregator};
use surety_ledger::Ledger;

const AGGREGATOR_QUEUE_CAP: usize = 64;

/// Everything a node needs to serve governance operations.
pub struct SuretyRuntime {
    pub ledger: Arc<Ledger>,
    pub admissions: AdmissionEngine,
    pub aggregator: AggregatorHandle,
    pub aggregator_task: JoinHandle<()>,
}

pub fn build_runtime(config: SuretyConfig) -> Result<SuretyRuntime> {
    let ledger = Arc::new(Ledger::new(config)?);
    tracing::debug!("✅ Ledger initialised at genesis");

    let admissions = AdmissionEngine::new(Arc::clone(&ledger));
    let (aggregator, aggregator_task) = StatusAggregator::new(Arc::clone(&ledger)).spawn(AGGREGATOR_QUEUE_CAP);
    tracing::debug!("✅ Status aggregator running");

    Ok(SuretyRuntime {
        ledger,
        admissions,
        aggregator,
        aggregator_task,
    })
}

/// Loads the config at `path`, or starts from defaults when no path is given.
pub fn build_runtime_from(path: Option<&Path>) -> Result<SuretyRuntime> {
    let config = match path {
        Some(path) => {
            tracing::info!("📄 Loading config from {}", path.display());
            SuretyConfig::load_from_file(path)?
        }
        None => SuretyConfig::default(),
    };
    build_runtime(config)
}
