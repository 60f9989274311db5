use std::sync::Arc;

use surety_common::{
    error::{Result, SuretyError},
    Address, LedgerEvent,
};
use surety_ledger::{Ledger, State};
use tracing::info;

use super::evaluator::QuorumEvaluator;

/// Result of a single admission vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Admitted { votes: usize, electorate: usize },
    Pending { votes: usize, electorate: usize, required: usize },
}

impl AdmissionOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionOutcome::Admitted { .. })
    }
}

/// Admits pending airlines once a strict majority of funded airlines vote for them.
///
/// Each vote is one ledger commit: the vote is recorded, the electorate is
/// read and the quorum is evaluated against the same state, so concurrent
/// voters never observe a half-applied tally.
#[derive(Debug, Clone)]
pub struct AdmissionEngine {
    ledger: Arc<Ledger>,
    evaluator: QuorumEvaluator,
}

impl AdmissionEngine {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        let evaluator = QuorumEvaluator::new(ledger.config().membership.quorum);
        Self { ledger, evaluator }
    }

    pub fn evaluator(&self) -> &QuorumEvaluator {
        &self.evaluator
    }

    pub async fn vote(&self, voter: Address, candidate: Address) -> Result<AdmissionOutcome> {
        let evaluator = self.evaluator;
        let outcome = self
            .ledger
            .transact(|state| cast_vote(state, &evaluator, voter, candidate))
            .await?;

        match outcome {
            AdmissionOutcome::Admitted { votes, electorate } => {
                tracing::info!(target: "consensus", "EVENT:ADMIT candidate={} votes={} electorate={}", candidate, votes, electorate);
                info!("✅ Airline {} admitted with {}/{} votes", candidate, votes, electorate);
            }
            AdmissionOutcome::Pending { votes, electorate, required } => {
                info!("🗳️ Airline {} has {}/{} votes ({} required)", candidate, votes, electorate, required);
            }
        }
        Ok(outcome)
    }

    pub async fn pending_candidates(&self) -> Vec<Address> {
        self.ledger.read(|state| state.membership.pending_candidates()).await
    }

    pub async fn vote_count(&self, candidate: &Address) -> usize {
        self.ledger.read(|state| state.membership.vote_count(candidate)).await
    }
}

fn cast_vote(state: &mut State, evaluator: &QuorumEvaluator, voter: Address, candidate: Address) -> Result<AdmissionOutcome> {
    state.ensure_operational()?;
    if !state.membership.is_funded(&voter) {
        return Err(SuretyError::NotFunded(voter));
    }
    if state.membership.is_registered(&candidate) {
        return Err(SuretyError::AlreadyRegistered(candidate.to_string()));
    }
    if !state.membership.is_pending(&candidate) {
        return Err(SuretyError::UnknownCandidate(candidate));
    }

    let fresh = state.membership.record_vote(&candidate, voter)?;
    let votes = state.membership.vote_count(&candidate);
    let electorate = state.membership.funded_count();

    if fresh {
        tracing::info!(target: "consensus", "EVENT:VOTE candidate={} voter={} votes={} electorate={}", candidate, voter, votes, electorate);
        state.emit(LedgerEvent::AdmissionVote {
            candidate,
            voter,
            votes,
            electorate,
        });
    }

    if !evaluator.quorum_met(votes, electorate) {
        return Ok(AdmissionOutcome::Pending {
            votes,
            electorate,
            required: evaluator.required_votes(electorate),
        });
    }

    let proposer = state
        .membership
        .get(&candidate)
        .and_then(|a| a.proposer)
        .unwrap_or(voter);
    let height = state.commit_height + 1;
    state.membership.admit(&candidate, height)?;
    state.emit(LedgerEvent::AirlineRegistered {
        airline: candidate,
        proposer,
    });
    Ok(AdmissionOutcome::Admitted { votes, electorate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use surety_common::{SuretyConfig, ETHER};
    use surety_ledger::Registration;

    fn airline(n: usize) -> Address {
        Address::from_label(&format!("airline-{}", n))
    }

    /// Genesis plus three fast-registered airlines; the first `funded` of them are funded.
    async fn consortium(funded: usize) -> (Arc<Ledger>, AdmissionEngine) {
        let ledger = Arc::new(Ledger::new(SuretyConfig::default()).unwrap());
        let genesis = ledger.config().genesis_airline;
        assert_eq!(genesis, airline(0));
        ledger.fund_airline(genesis, 10 * ETHER).await.unwrap();
        for n in 1..4 {
            assert_eq!(ledger.register_airline(genesis, airline(n)).await.unwrap(), Registration::Registered);
        }
        for n in 1..funded {
            ledger.fund_airline(airline(n), 10 * ETHER).await.unwrap();
        }
        let engine = AdmissionEngine::new(Arc::clone(&ledger));
        (ledger, engine)
    }

    #[tokio::test]
    async fn fifth_airline_needs_majority_of_funded() {
        let (ledger, engine) = consortium(4).await;
        let candidate = airline(4);
        assert_eq!(ledger.register_airline(airline(0), candidate).await.unwrap(), Registration::Pending);
        assert!(!ledger.is_registered(&candidate).await);

        let first = engine.vote(airline(1), candidate).await.unwrap();
        assert_eq!(first, AdmissionOutcome::Pending { votes: 1, electorate: 4, required: 3 });
        let second = engine.vote(airline(2), candidate).await.unwrap();
        assert!(!second.is_admitted());
        let third = engine.vote(airline(3), candidate).await.unwrap();
        assert_eq!(third, AdmissionOutcome::Admitted { votes: 3, electorate: 4 });
        assert!(ledger.is_registered(&candidate).await);
        assert_eq!(ledger.airline(&candidate).await.unwrap().proposer, Some(airline(0)));
    }

    #[tokio::test]
    async fn duplicate_votes_count_once() {
        let (ledger, engine) = consortium(4).await;
        let candidate = airline(4);
        ledger.register_airline(airline(0), candidate).await.unwrap();

        engine.vote(airline(1), candidate).await.unwrap();
        let again = engine.vote(airline(1), candidate).await.unwrap();
        assert_eq!(again, AdmissionOutcome::Pending { votes: 1, electorate: 4, required: 3 });
        assert_eq!(engine.vote_count(&candidate).await, 1);
    }

    #[tokio::test]
    async fn funding_new_airlines_dilutes_the_quorum() {
        // Three funded out of four registered: two votes would pass.
        let (ledger, engine) = consortium(3).await;
        let candidate = airline(4);
        ledger.register_airline(airline(0), candidate).await.unwrap();
        engine.vote(airline(0), candidate).await.unwrap();

        // The fourth airline funds before the second vote arrives.
        ledger.fund_airline(airline(3), 10 * ETHER).await.unwrap();
        let second = engine.vote(airline(1), candidate).await.unwrap();
        assert_eq!(second, AdmissionOutcome::Pending { votes: 2, electorate: 4, required: 3 });
        assert!(!ledger.is_registered(&candidate).await);

        let third = engine.vote(airline(2), candidate).await.unwrap();
        assert!(third.is_admitted());
    }

    #[tokio::test]
    async fn vote_preconditions() {
        let (ledger, engine) = consortium(3).await;
        let candidate = airline(4);

        assert_eq!(
            engine.vote(airline(1), candidate).await,
            Err(SuretyError::UnknownCandidate(candidate))
        );
        ledger.register_airline(airline(0), candidate).await.unwrap();

        // airline-3 is registered but unfunded.
        assert_eq!(engine.vote(airline(3), candidate).await, Err(SuretyError::NotFunded(airline(3))));
        assert!(matches!(
            engine.vote(airline(0), airline(1)).await,
            Err(SuretyError::AlreadyRegistered(_))
        ));
        assert_eq!(engine.vote_count(&candidate).await, 0);
        assert_eq!(engine.pending_candidates().await, vec![candidate]);
    }

    #[tokio::test]
    async fn votes_after_admission_are_rejected() {
        let (ledger, engine) = consortium(4).await;
        let candidate = airline(4);
        ledger.register_airline(airline(0), candidate).await.unwrap();
        for n in 1..4 {
            engine.vote(airline(n), candidate).await.unwrap();
        }
        let err = engine.vote(airline(0), candidate).await.unwrap_err();
        assert!(err.is_benign());
    }

    #[tokio::test]
    async fn concurrent_voters_admit_exactly_once() {
        let (ledger, engine) = consortium(4).await;
        let candidate = airline(4);
        ledger.register_airline(airline(0), candidate).await.unwrap();

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.vote(airline(n), candidate).await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(outcome) if outcome.is_admitted() => admitted += 1,
                Ok(_) => {}
                Err(err) => assert!(err.is_benign()),
            }
        }
        assert_eq!(admitted, 1);
        let registrations = ledger
            .events_since(0)
            .await
            .into_iter()
            .filter(|e| matches!(e.event, LedgerEvent::AirlineRegistered { airline, .. } if airline == candidate))
            .count();
        assert_eq!(registrations, 1);
    }

    #[tokio::test]
    async fn paused_ledger_rejects_votes() {
        let (ledger, engine) = consortium(4).await;
        let candidate = airline(4);
        ledger.register_airline(airline(0), candidate).await.unwrap();
        ledger.set_operating_status(ledger.config().owner, false).await.unwrap();
        assert_eq!(engine.vote(airline(1), candidate).await, Err(SuretyError::NotOperational));
    }
}
