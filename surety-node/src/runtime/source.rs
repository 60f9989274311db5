use std::sync::Mutex;

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};

use surety_common::{Address, FlightKey, StatusCode};

/// Where a simulated oracle gets the status it reports.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// `None` means the oracle stays silent for this request.
    async fn status_of(&self, oracle: &Address, key: &FlightKey) -> Option<StatusCode>;
}

/// Every oracle reports the same code.
#[derive(Debug, Clone, Copy)]
pub struct FixedStatusSource(pub StatusCode);

#[async_trait]
impl StatusSource for FixedStatusSource {
    async fn status_of(&self, _oracle: &Address, _key: &FlightKey) -> Option<StatusCode> {
        Some(self.0)
    }
}

/// Each oracle picks a code at random from a seeded generator, so a run can be replayed.
#[derive(Debug)]
pub struct SeededStatusSource {
    rng: Mutex<StdRng>,
}

impl SeededStatusSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl StatusSource for SeededStatusSource {
    async fn status_of(&self, _oracle: &Address, _key: &FlightKey) -> Option<StatusCode> {
        let mut rng = self.rng.lock().ok()?;
        let pick = rng.gen_range(0..StatusCode::ALL.len());
        Some(StatusCode::ALL[pick])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FlightKey {
        FlightKey::new(Address::from_label("airline-0"), "ND1309", 1)
    }

    #[tokio::test]
    async fn fixed_source_always_reports_its_code() {
        let source = FixedStatusSource(StatusCode::LateWeather);
        for n in 0..5 {
            let oracle = Address::from_label(&format!("oracle-{}", n));
            assert_eq!(source.status_of(&oracle, &key()).await, Some(StatusCode::LateWeather));
        }
    }

    #[tokio::test]
    async fn seeded_source_is_reproducible() {
        let a = SeededStatusSource::new(7);
        let b = SeededStatusSource::new(7);
        let oracle = Address::from_label("oracle-0");
        for _ in 0..20 {
            assert_eq!(a.status_of(&oracle, &key()).await, b.status_of(&oracle, &key()).await);
        }
    }
}
