use surety_common::config::QuorumPolicy;

/// True when `vote_count` strictly exceeds half of `funded_count`.
///
/// The electorate is whatever the funded count is at the moment of the vote,
/// so a tally that passed yesterday may fall short today.
pub fn quorum_met(vote_count: usize, funded_count: usize) -> bool {
    QuorumEvaluator::new(QuorumPolicy::default()).quorum_met(vote_count, funded_count)
}

/// Evaluates admission tallies against a configurable fraction of the funded electorate.
#[derive(Debug, Clone, Copy)]
pub struct QuorumEvaluator {
    pub policy: QuorumPolicy,
}

impl QuorumEvaluator {
    pub fn new(policy: QuorumPolicy) -> Self {
        Self { policy }
    }

    /// `votes / electorate > numerator / denominator`, in integer arithmetic.
    pub fn quorum_met(&self, vote_count: usize, funded_count: usize) -> bool {
        let votes = vote_count as u128 * self.policy.denominator as u128;
        let threshold = funded_count as u128 * self.policy.numerator as u128;
        votes > threshold
    }

    /// Smallest vote count that passes for the given electorate.
    pub fn required_votes(&self, funded_count: usize) -> usize {
        let threshold = funded_count as u128 * self.policy.numerator as u128;
        (threshold / self.policy.denominator as u128 + 1) as usize
    }
}
