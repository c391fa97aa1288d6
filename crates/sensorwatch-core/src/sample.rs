//! A single sensor observation.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One validated temperature/humidity observation.
///
/// The timestamp is the moment the reading arrived, not a device clock.
/// Fields are private so a sample cannot change after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    timestamp: DateTime<Local>,
    temperature: f64,
    humidity: f64,
}

impl Sample {
    /// Build a sample stamped with the current local time.
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self::at(Local::now(), temperature, humidity)
    }

    /// Build a sample with an explicit timestamp.
    pub fn at(timestamp: DateTime<Local>, temperature: f64, humidity: f64) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
        }
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Temperature in °C.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Relative humidity in %.
    pub fn humidity(&self) -> f64 {
        self.humidity
    }
}
