use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    amount::{Amount, ETHER},
    crypto::hash::parse_seed,
    error::{Result, SuretyError},
};

/// Fraction of the funded electorate that must be strictly exceeded for an admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumPolicy {
    pub numerator: u64,
    pub denominator: u64,
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self { numerator: 1, denominator: 2 }
    }
}

/// Factor applied to a premium when a delay is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutMultiplier {
    pub numerator: u128,
    pub denominator: u128,
}

impl Default for PayoutMultiplier {
    fn default() -> Self {
        Self { numerator: 3, denominator: 2 }
    }
}

impl PayoutMultiplier {
    /// `amount × numerator / denominator`, rounded down.
    pub fn apply(&self, amount: Amount) -> Amount {
        amount.saturating_mul(self.numerator) / self.denominator
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipConfig {
    pub funding_fee: Amount,
    /// Below this many registered airlines, a funded airline registers others alone.
    pub fast_registration_threshold: usize,
    pub quorum: QuorumPolicy,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            funding_fee: 10 * ETHER,
            fast_registration_threshold: 4,
            quorum: QuorumPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub registration_fee: Amount,
    /// Indexes are drawn from `0..index_range`.
    pub index_range: u8,
    pub min_responses: usize,
    #[serde(default)]
    pub distinct_indexes: bool,
    /// Hex-encoded 32-byte seed for index derivation.
    pub seed: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            registration_fee: ETHER,
            index_range: 10,
            min_responses: 3,
            distinct_indexes: false,
            seed: "00".repeat(32),
        }
    }
}

impl OracleConfig {
    pub fn seed_bytes(&self) -> Result<[u8; 32]> {
        parse_seed(&self.seed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceConfig {
    pub max_premium: Amount,
    pub payout: PayoutMultiplier,
}

impl Default for InsuranceConfig {
    fn default() -> Self {
        Self {
            max_premium: ETHER,
            payout: PayoutMultiplier::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuretyConfig {
    /// Account allowed to pause and resume the contract.
    pub owner: Address,
    /// Registered at genesis so that it can fund itself and bootstrap membership.
    pub genesis_airline: Address,
    #[serde(default)]
    pub membership: MembershipConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub insurance: InsuranceConfig,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    1024
}

impl Default for SuretyConfig {
    fn default() -> Self {
        Self {
            owner: Address::from_label("owner"),
            genesis_airline: Address::from_label("airline-0"),
            membership: MembershipConfig::default(),
            oracle: OracleConfig::default(),
            insurance: InsuranceConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SuretyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.membership.quorum.denominator == 0 || self.membership.quorum.numerator > self.membership.quorum.denominator {
            return Err(SuretyError::Config(format!(
                "quorum {}/{} must be a fraction in [0, 1]",
                self.membership.quorum.numerator, self.membership.quorum.denominator
            )));
        }
        if self.membership.fast_registration_threshold == 0 {
            return Err(SuretyError::Config("fast registration threshold must be positive".to_string()));
        }
        if self.oracle.index_range == 0 {
            return Err(SuretyError::Config("oracle index range must be positive".to_string()));
        }
        if self.oracle.distinct_indexes && self.oracle.index_range < 3 {
            return Err(SuretyError::Config("distinct indexes need an index range of at least 3".to_string()));
        }
        if self.oracle.min_responses == 0 {
            return Err(SuretyError::Config("min responses must be positive".to_string()));
        }
        if self.insurance.payout.denominator == 0 {
            return Err(SuretyError::Config("payout denominator must be positive".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(SuretyError::Config("event capacity must be positive".to_string()));
        }
        self.oracle.seed_bytes()?;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let parsed = serde_json::from_str::<SuretyConfig>(&data)?;
        parsed.validate()?;
        Ok(parsed)
    }
}
