use std::collections::BTreeMap;

use serde::Serialize;
use surety_common::{
    crypto::hash::derive_index,
    error::{Result, SuretyError},
    Address, Amount, LedgerEvent,
};
use tracing::info;

use super::state::State;
use crate::Ledger;

// Upper bound on redraws when distinct indexes are required.
const MAX_DISTINCT_DRAWS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Oracle {
    pub address: Address,
    pub indexes: [u8; 3],
    pub registered_at: u64,
}

impl Oracle {
    pub fn has_index(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// Registered oracles and the seeded index generator.
#[derive(Debug, Clone, Serialize)]
pub struct OracleRegistry {
    oracles: BTreeMap<Address, Oracle>,
    #[serde(skip)]
    seed: [u8; 32],
    /// Bumped after every draw, registrations and status requests alike.
    nonce: u64,
}

impl OracleRegistry {
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            oracles: BTreeMap::new(),
            seed,
            nonce: 0,
        }
    }

    pub fn get(&self, account: &Address) -> Option<&Oracle> {
        self.oracles.get(account)
    }

    pub fn is_registered(&self, account: &Address) -> bool {
        self.oracles.contains_key(account)
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &Oracle> {
        self.oracles.values()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Draws the next pseudo-random index for `account` in `0..range`.
    pub fn draw_index(&mut self, account: &Address, context: u64, range: u8) -> Result<u8> {
        let index = derive_index(&self.seed, account, self.nonce, context, range)?;
        self.nonce += 1;
        Ok(index)
    }

    /// Draws an index triple. Duplicates are kept unless `distinct` is set.
    pub fn draw_indexes(&mut self, account: &Address, context: u64, range: u8, distinct: bool) -> Result<[u8; 3]> {
        let first = self.draw_index(account, context, range)?;
        if !distinct {
            let second = self.draw_index(account, context, range)?;
            let third = self.draw_index(account, context, range)?;
            return Ok([first, second, third]);
        }

        let mut picked = vec![first];
        for _ in 0..MAX_DISTINCT_DRAWS {
            if picked.len() == 3 {
                break;
            }
            let next = self.draw_index(account, context, range)?;
            if !picked.contains(&next) {
                picked.push(next);
            }
        }
        match picked.as_slice() {
            [a, b, c] => Ok([*a, *b, *c]),
            _ => Err(SuretyError::Config(format!(
                "could not draw 3 distinct indexes in range {} after {} attempts",
                range, MAX_DISTINCT_DRAWS
            ))),
        }
    }
}

impl State {
    /// Registers `account` as an oracle and assigns its index triple.
    pub fn register_oracle(&mut self, account: Address, fee_paid: Amount) -> Result<[u8; 3]> {
        self.ensure_operational()?;
        let required = self.config.oracle.registration_fee;
        if fee_paid < required {
            return Err(SuretyError::InsufficientFee { paid: fee_paid, required });
        }
        if self.oracles.is_registered(&account) {
            return Err(SuretyError::AlreadyRegistered(format!("oracle {}", account)));
        }

        let range = self.config.oracle.index_range;
        let distinct = self.config.oracle.distinct_indexes;
        let indexes = self.oracles.draw_indexes(&account, self.commit_height, range, distinct)?;

        self.oracles.oracles.insert(
            account,
            Oracle {
                address: account,
                indexes,
                registered_at: self.commit_height + 1,
            },
        );
        self.deposit(fee_paid);
        self.emit(LedgerEvent::OracleRegistered { oracle: account, indexes });
        Ok(indexes)
    }

    pub fn oracle_indexes(&self, account: &Address) -> Result<[u8; 3]> {
        self.oracles
            .get(account)
            .map(|o| o.indexes)
            .ok_or_else(|| SuretyError::Unauthorized(format!("{} is not a registered oracle", account)))
    }
}

impl Ledger {
    pub async fn register_oracle(&self, account: Address, fee_paid: Amount) -> Result<[u8; 3]> {
        let indexes = self.transact(|state| state.register_oracle(account, fee_paid)).await?;
        info!("🔮 Oracle {} registered with indexes {:?}", account, indexes);
        Ok(indexes)
    }

    pub async fn get_indexes(&self, account: &Address) -> Result<[u8; 3]> {
        self.read(|state| state.oracle_indexes(account)).await
    }

    pub async fn is_oracle(&self, account: &Address) -> bool {
        self.read(|state| state.oracles.is_registered(account)).await
    }

    pub async fn oracle_count(&self) -> usize {
        self.read(|state| state.oracles.len()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::state::tests::genesis_state;
    use surety_common::{SuretyConfig, ETHER};

    #[test]
    fn registration_requires_fee() {
        let mut state = genesis_state();
        let oracle = Address::from_label("oracle-1");
        let err = state.register_oracle(oracle, ETHER - 1).unwrap_err();
        assert_eq!(err, SuretyError::InsufficientFee { paid: ETHER - 1, required: ETHER });
        assert!(!state.oracles.is_registered(&oracle));
        assert_eq!(state.treasury, 0);
    }

    #[test]
    fn indexes_are_stable_and_in_range() {
        let mut state = genesis_state();
        let oracle = Address::from_label("oracle-1");
        let assigned = state.register_oracle(oracle, ETHER).unwrap();
        assert!(assigned.iter().all(|i| *i < 10));
        for _ in 0..5 {
            assert_eq!(state.oracle_indexes(&oracle).unwrap(), assigned);
        }
    }

    #[test]
    fn second_registration_is_rejected_without_charging() {
        let mut state = genesis_state();
        let oracle = Address::from_label("oracle-1");
        let first = state.register_oracle(oracle, ETHER).unwrap();
        assert!(state.register_oracle(oracle, ETHER).unwrap_err().is_benign());
        assert_eq!(state.oracle_indexes(&oracle).unwrap(), first);
        assert_eq!(state.treasury, ETHER);
    }

    #[test]
    fn unknown_oracle_has_no_indexes() {
        let state = genesis_state();
        assert!(matches!(
            state.oracle_indexes(&Address::from_label("nobody")),
            Err(SuretyError::Unauthorized(_))
        ));
    }

    #[test]
    fn same_seed_gives_same_assignments() {
        let assign = || {
            let mut state = genesis_state();
            (0..10)
                .map(|i| state.register_oracle(Address::from_label(&format!("oracle-{i}")), ETHER).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(assign(), assign());
    }

    #[test]
    fn duplicate_indexes_are_permitted_by_default() {
        // With a range of one every draw collides; the triple keeps the duplicates.
        let mut registry = OracleRegistry::new([9u8; 32]);
        let account = Address::from_label("oracle-dup");
        assert_eq!(registry.draw_indexes(&account, 0, 1, false).unwrap(), [0, 0, 0]);
        assert_eq!(registry.nonce(), 3);
    }

    #[test]
    fn distinct_indexes_when_configured() {
        let mut cfg = SuretyConfig::default();
        cfg.oracle.distinct_indexes = true;
        cfg.oracle.index_range = 3;
        let mut state = State::genesis(Arc::new(cfg)).unwrap();
        for i in 0..20 {
            let mut indexes = state.register_oracle(Address::from_label(&format!("oracle-{i}")), ETHER).unwrap();
            indexes.sort();
            assert_eq!(indexes, [0, 1, 2]);
        }
    }

    #[test]
    fn distinct_draw_fails_when_range_too_small() {
        let mut registry = OracleRegistry::new([1u8; 32]);
        let account = Address::from_label("oracle-x");
        assert!(matches!(
            registry.draw_indexes(&account, 0, 2, true),
            Err(SuretyError::Config(_))
        ));
    }
}
