use std::{collections::BTreeMap, sync::Arc};

use serde::{Serialize, Serializer};
use surety_common::{
    error::{Result, SuretyError},
    Address, Amount, LedgerEvent, SuretyConfig,
};

use super::{flights::FlightBook, insurance::InsuranceBook, membership::MembershipStore, oracles::OracleRegistry};

/// The whole governance state, versioned by `commit_height`.
///
/// Operations mutate a scratch copy inside [`crate::Ledger::transact`]; a
/// failed operation never reaches the committed copy.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    #[serde(skip)]
    pub(crate) config: Arc<SuretyConfig>,
    pub commit_height: u64,
    pub owner: Address,
    pub operational: bool,
    pub treasury: Amount,
    pub membership: MembershipStore,
    pub oracles: OracleRegistry,
    pub flights: FlightBook,
    pub insurance: InsuranceBook,
    // Events raised by the transaction in progress.
    #[serde(skip)]
    pub(crate) journal: Vec<LedgerEvent>,
}

impl State {
    /// Genesis state: the genesis airline is registered but not yet funded.
    pub fn genesis(config: Arc<SuretyConfig>) -> Result<Self> {
        config.validate()?;
        let seed = config.oracle.seed_bytes()?;
        let mut membership = MembershipStore::default();
        membership.insert_genesis(config.genesis_airline);

        Ok(Self {
            owner: config.owner,
            operational: true,
            treasury: 0,
            commit_height: 0,
            membership,
            oracles: OracleRegistry::new(seed),
            flights: FlightBook::default(),
            insurance: InsuranceBook::default(),
            journal: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        self.journal.push(event);
    }

    pub(crate) fn take_journal(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.journal)
    }

    pub fn ensure_operational(&self) -> Result<()> {
        if self.operational {
            Ok(())
        } else {
            Err(SuretyError::NotOperational)
        }
    }

    /// Pauses or resumes every mutating operation. Owner only.
    pub fn set_operating_status(&mut self, caller: Address, operational: bool) -> Result<()> {
        if caller != self.owner {
            return Err(SuretyError::Unauthorized(format!("{} is not the contract owner", caller)));
        }
        if self.operational != operational {
            self.operational = operational;
            self.emit(LedgerEvent::OperatingStatusChanged { operational });
        }
        Ok(())
    }

    pub(crate) fn deposit(&mut self, amount: Amount) {
        self.treasury = self.treasury.saturating_add(amount);
    }

    pub(crate) fn withdraw(&mut self, amount: Amount) -> Result<()> {
        if self.treasury < amount {
            return Err(SuretyError::TreasuryExhausted {
                available: self.treasury,
                requested: amount,
            });
        }
        self.treasury -= amount;
        Ok(())
    }
}

/// Serializes a map as the sequence of its values, for maps whose keys are not strings.
pub(crate) fn values_only<S, K, V>(map: &BTreeMap<K, V>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    serializer.collect_seq(map.values())
}
