use std::collections::BTreeMap;

use serde::Serialize;
use surety_common::{
    error::{Result, SuretyError},
    Address, Amount, FlightKey, LedgerEvent, StatusCode,
};
use tracing::info;

use super::state::{values_only, State};
use crate::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsurancePolicy {
    pub insuree: Address,
    pub key: FlightKey,
    pub amount_paid: Amount,
    /// Set once the flight is finalized, whether or not the policy paid out.
    pub settled: bool,
}

/// What a claim did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Paid(Amount),
    NothingToClaim,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InsuranceBook {
    // FlightKey -> Insuree -> Policy
    #[serde(serialize_with = "values_only")]
    policies: BTreeMap<FlightKey, BTreeMap<Address, InsurancePolicy>>,
    balances: BTreeMap<Address, Amount>,
    withdrawals: BTreeMap<Address, Amount>,
}

impl InsuranceBook {
    pub fn is_insured(&self, insuree: &Address, key: &FlightKey) -> bool {
        self.policies.get(key).is_some_and(|p| p.contains_key(insuree))
    }

    pub fn policies_for(&self, key: &FlightKey) -> Vec<InsurancePolicy> {
        self.policies
            .get(key)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn balance_of(&self, insuree: &Address) -> Amount {
        self.balances.get(insuree).copied().unwrap_or(0)
    }

    pub fn withdrawn_by(&self, insuree: &Address) -> Amount {
        self.withdrawals.get(insuree).copied().unwrap_or(0)
    }
}

impl State {
    /// Buys a delay policy on a registered, not yet finalized flight.
    pub fn purchase(&mut self, insuree: Address, key: &FlightKey, amount: Amount) -> Result<()> {
        self.ensure_operational()?;
        if !self.flights.is_registered(key) {
            return Err(SuretyError::UnknownFlight(key.clone()));
        }
        if self.insurance.is_insured(&insuree, key) {
            return Err(SuretyError::AlreadyInsured {
                insuree,
                key: key.clone(),
            });
        }
        let max = self.config.insurance.max_premium;
        if amount == 0 || amount > max {
            return Err(SuretyError::InvalidPremium { amount, max });
        }
        if self.flights.is_finalized(key) {
            return Err(SuretyError::AlreadyFinalized(key.clone()));
        }

        self.insurance.policies.entry(key.clone()).or_default().insert(
            insuree,
            InsurancePolicy {
                insuree,
                key: key.clone(),
                amount_paid: amount,
                settled: false,
            },
        );
        self.deposit(amount);
        self.emit(LedgerEvent::PolicyPurchased {
            insuree,
            key: key.clone(),
            amount,
        });
        Ok(())
    }

    /// Settles every open policy on `key`. Delay codes credit the premium
    /// times the payout multiplier; other codes credit nothing.
    pub(crate) fn settle_policies(&mut self, key: &FlightKey, code: StatusCode) -> Result<Amount> {
        let payout = self.config.insurance.payout;
        let mut credits = Vec::new();

        if let Some(policies) = self.insurance.policies.get_mut(key) {
            for policy in policies.values_mut().filter(|p| !p.settled) {
                policy.settled = true;
                if code.is_delay() {
                    credits.push((policy.insuree, payout.apply(policy.amount_paid)));
                }
            }
        }

        let mut total: Amount = 0;
        for (insuree, amount) in credits {
            let balance = self.insurance.balances.entry(insuree).or_insert(0);
            *balance = balance.saturating_add(amount);
            total = total.saturating_add(amount);
            self.emit(LedgerEvent::InsureeCredited {
                insuree,
                key: key.clone(),
                amount,
            });
        }
        Ok(total)
    }

    /// Withdraws the insuree's whole credited balance.
    pub fn claim(&mut self, insuree: Address) -> Result<ClaimOutcome> {
        self.ensure_operational()?;
        let amount = self.insurance.balance_of(&insuree);
        if amount == 0 {
            return Ok(ClaimOutcome::NothingToClaim);
        }
        self.withdraw(amount)?;
        self.insurance.balances.insert(insuree, 0);
        let withdrawn = self.insurance.withdrawals.entry(insuree).or_insert(0);
        *withdrawn = withdrawn.saturating_add(amount);
        self.emit(LedgerEvent::Claimed { insuree, amount });
        Ok(ClaimOutcome::Paid(amount))
    }
}

impl Ledger {
    pub async fn purchase(&self, insuree: Address, key: &FlightKey, amount: Amount) -> Result<()> {
        self.transact(|state| state.purchase(insuree, key, amount)).await?;
        info!("🧾 {} insured {} for {}", insuree, key, amount);
        Ok(())
    }

    pub async fn claim(&self, insuree: Address) -> Result<ClaimOutcome> {
        let outcome = self.transact(|state| state.claim(insuree)).await?;
        if let ClaimOutcome::Paid(amount) = outcome {
            info!("💸 {} claimed {}", insuree, amount);
        }
        Ok(outcome)
    }

    pub async fn is_insured(&self, insuree: &Address, key: &FlightKey) -> bool {
        self.read(|state| state.insurance.is_insured(insuree, key)).await
    }

    pub async fn balance_of(&self, insuree: &Address) -> Amount {
        self.read(|state| state.insurance.balance_of(insuree)).await
    }

    pub async fn withdrawn_by(&self, insuree: &Address) -> Amount {
        self.read(|state| state.insurance.withdrawn_by(insuree)).await
    }

    pub async fn policies_for(&self, key: &FlightKey) -> Vec<InsurancePolicy> {
        self.read(|state| state.insurance.policies_for(key)).await
    }

    pub async fn treasury(&self) -> Amount {
        self.read(|state| state.treasury).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::tests::genesis_state;
    use surety_common::ETHER;

    fn state_with_flight() -> (State, FlightKey) {
        let mut state = genesis_state();
        let genesis = state.config().genesis_airline;
        state.fund_airline(genesis, 10 * ETHER).unwrap();
        let key = state.register_flight(genesis, "LX1051", 1_700_000_000).unwrap();
        (state, key)
    }

    #[test]
    fn purchase_escrows_premium() {
        let (mut state, key) = state_with_flight();
        let passenger = Address::from_label("passenger-1");
        state.purchase(passenger, &key, ETHER).unwrap();
        assert!(state.insurance.is_insured(&passenger, &key));
        assert_eq!(state.treasury, 11 * ETHER);
    }

    #[test]
    fn double_purchase_is_rejected_and_moves_no_funds() {
        let (mut state, key) = state_with_flight();
        let passenger = Address::from_label("passenger-1");
        state.purchase(passenger, &key, ETHER).unwrap();
        let treasury = state.treasury;

        let err = state.purchase(passenger, &key, ETHER / 2).unwrap_err();
        assert_eq!(err, SuretyError::AlreadyInsured { insuree: passenger, key: key.clone() });
        assert_eq!(state.treasury, treasury);
        assert_eq!(state.insurance.policies_for(&key)[0].amount_paid, ETHER);
    }

    #[test]
    fn purchase_validates_flight_and_premium() {
        let (mut state, key) = state_with_flight();
        let passenger = Address::from_label("passenger-1");
        let unknown = FlightKey::new(key.airline, "NOPE", 0);
        assert_eq!(state.purchase(passenger, &unknown, ETHER), Err(SuretyError::UnknownFlight(unknown.clone())));
        assert!(matches!(state.purchase(passenger, &key, 0), Err(SuretyError::InvalidPremium { .. })));
        assert!(matches!(
            state.purchase(passenger, &key, 2 * ETHER),
            Err(SuretyError::InvalidPremium { .. })
        ));

        state.finalize_status(&key, StatusCode::OnTime).unwrap();
        assert_eq!(state.purchase(passenger, &key, ETHER), Err(SuretyError::AlreadyFinalized(key.clone())));
    }

    #[test]
    fn delay_credits_one_and_a_half_times_premium_once() {
        let (mut state, key) = state_with_flight();
        let passenger = Address::from_label("passenger-1");
        state.purchase(passenger, &key, ETHER).unwrap();

        let credited = state.finalize_status(&key, StatusCode::LateAirline).unwrap();
        assert_eq!(credited, ETHER + ETHER / 2);
        assert_eq!(state.insurance.balance_of(&passenger), ETHER + ETHER / 2);
        assert!(state.insurance.policies_for(&key)[0].settled);

        assert!(state.finalize_status(&key, StatusCode::LateAirline).is_err());
        assert_eq!(state.settle_policies(&key, StatusCode::LateAirline).unwrap(), 0);
        assert_eq!(state.insurance.balance_of(&passenger), ETHER + ETHER / 2);
    }

    #[test]
    fn on_time_credits_nothing() {
        let (mut state, key) = state_with_flight();
        let passenger = Address::from_label("passenger-1");
        state.purchase(passenger, &key, ETHER).unwrap();
        assert_eq!(state.finalize_status(&key, StatusCode::OnTime).unwrap(), 0);
        assert_eq!(state.insurance.balance_of(&passenger), 0);
        assert!(state.insurance.policies_for(&key)[0].settled);
    }

    #[test]
    fn claim_pays_once() {
        let (mut state, key) = state_with_flight();
        let passenger = Address::from_label("passenger-1");
        state.purchase(passenger, &key, ETHER).unwrap();
        state.finalize_status(&key, StatusCode::LateTechnical).unwrap();
        let treasury = state.treasury;

        assert_eq!(state.claim(passenger).unwrap(), ClaimOutcome::Paid(ETHER + ETHER / 2));
        assert_eq!(state.insurance.balance_of(&passenger), 0);
        assert_eq!(state.insurance.withdrawn_by(&passenger), ETHER + ETHER / 2);
        assert_eq!(state.treasury, treasury - (ETHER + ETHER / 2));

        assert_eq!(state.claim(passenger).unwrap(), ClaimOutcome::NothingToClaim);
        assert_eq!(state.insurance.withdrawn_by(&passenger), ETHER + ETHER / 2);
    }

    #[test]
    fn claim_fails_when_treasury_cannot_cover() {
        let (mut state, key) = state_with_flight();
        let passenger = Address::from_label("passenger-1");
        state.purchase(passenger, &key, ETHER).unwrap();
        state.finalize_status(&key, StatusCode::LateOther).unwrap();
        state.treasury = ETHER;

        assert!(matches!(state.claim(passenger), Err(SuretyError::TreasuryExhausted { .. })));
        assert_eq!(state.insurance.balance_of(&passenger), ETHER + ETHER / 2);
    }
}
