use crate::prelude::EstimatorConfig;
use crate::sensor_interface::ChannelReading;

/// A channel reading that passed the sanity checks, with its proximity weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedPoint {
    pub pm25_raw: f64,
    pub weight: f64,
    pub humidity: f64,
}

/// Per-channel age and range filter.
#[derive(Debug, Clone)]
pub struct ReadingValidator {
    max_age_minutes: u32,
    lower: f64,
    upper: f64,
}

impl ReadingValidator {
    pub fn new(max_age_minutes: u32, lower: f64, upper: f64) -> Self {
        Self {
            max_age_minutes,
            lower,
            upper,
        }
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::new(config.max_age_minutes, config.pm25_lower, config.pm25_upper)
    }

    pub fn accepts(&self, reading: &ChannelReading, weight: f64) -> bool {
        reading.age_minutes < self.max_age_minutes
            && reading.pm25_raw >= self.lower
            && reading.pm25_raw < self.upper
            && weight >= 0.0
    }

    pub fn validate(&self, reading: &ChannelReading, weight: f64) -> Option<ValidatedPoint> {
        self.accepts(reading, weight).then_some(ValidatedPoint {
            pm25_raw: reading.pm25_raw,
            weight,
            humidity: reading.humidity,
        })
    }
}
