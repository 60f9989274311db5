use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Identifies one flight instance: operating airline, flight number and
/// scheduled departure (UNIX seconds).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
}

impl FlightKey {
    pub fn new(airline: Address, flight: impl Into<String>, timestamp: u64) -> Self {
        Self {
            airline,
            flight: flight.into(),
            timestamp,
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.flight, self.timestamp, self.airline)
    }
}

/// Flight status codes as reported by oracles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum StatusCode {
    #[default]
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl StatusCode {
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Unknown,
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    /// Delay codes are the ones that trigger an insurance payout.
    pub fn is_delay(&self) -> bool {
        matches!(
            self,
            StatusCode::LateAirline | StatusCode::LateWeather | StatusCode::LateTechnical | StatusCode::LateOther
        )
    }
}

impl From<StatusCode> for u8 {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::Unknown => 0,
            StatusCode::OnTime => 10,
            StatusCode::LateAirline => 20,
            StatusCode::LateWeather => 30,
            StatusCode::LateTechnical => 40,
            StatusCode::LateOther => 50,
        }
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StatusCode::Unknown),
            10 => Ok(StatusCode::OnTime),
            20 => Ok(StatusCode::LateAirline),
            30 => Ok(StatusCode::LateWeather),
            40 => Ok(StatusCode::LateTechnical),
            50 => Ok(StatusCode::LateOther),
            other => Err(other),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Unknown => "Unknown",
            StatusCode::OnTime => "OnTime",
            StatusCode::LateAirline => "LateAirline",
            StatusCode::LateWeather => "LateWeather",
            StatusCode::LateTechnical => "LateTechnical",
            StatusCode::LateOther => "LateOther",
        };
        write!(f, "{}", s)
    }
}

/// The authoritative status of a flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightStatus {
    pub key: FlightKey,
    pub code: StatusCode,
    pub finalized: bool,
}

impl FlightStatus {
    pub fn unknown(key: FlightKey) -> Self {
        Self {
            key,
            code: StatusCode::Unknown,
            finalized: false,
        }
    }
}
