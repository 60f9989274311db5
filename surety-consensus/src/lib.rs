//! Decision making on top of the ledger: admission voting for new airlines
//! and the oracle quorum that settles flight statuses.

pub mod admission;
pub mod aggregator;

pub use admission::{
    engine::{AdmissionEngine, AdmissionOutcome},
    evaluator::{quorum_met, QuorumEvaluator},
};
pub use aggregator::{
    registry::{OracleResponse, ResponseRegistry},
    service::{AggregatorHandle, StatusAggregator, SubmitOutcome},
};
