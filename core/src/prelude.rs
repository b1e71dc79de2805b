use crate::processing::correction::CorrectionModel;
use crate::processing::outlier::OutlierMethod;
use serde::{Deserialize, Serialize};

/// Geographic position in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn from_radians(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: latitude.to_radians(),
            longitude: longitude.to_radians(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Shared configuration for one estimation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub target: Coordinate,
    /// Search radius in kilometres, the unit returned by the haversine helper.
    pub radius: f64,
    pub max_sensors: usize,
    pub max_age_minutes: u32,
    /// Inclusive lower bound on raw PM2.5.
    pub pm25_lower: f64,
    /// Exclusive upper bound on raw PM2.5.
    pub pm25_upper: f64,
    pub correction: CorrectionModel,
    pub outlier_method: OutlierMethod,
    pub contamination: f64,
    pub outlier_min_samples: usize,
    pub detector_seed: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            target: Coordinate::from_degrees(37.256886, -122.039156),
            radius: 5.0,
            max_sensors: 30,
            max_age_minutes: 10,
            pm25_lower: 0.0,
            pm25_upper: 500.0,
            correction: CorrectionModel::Epa,
            outlier_method: OutlierMethod::IsolationForest,
            contamination: 0.01,
            outlier_min_samples: 10,
            detector_seed: 42,
        }
    }
}

impl EstimatorConfig {
    /// Builds a configuration around a target given in degrees.
    pub fn from_degrees(latitude: f64, longitude: f64, radius: f64) -> Self {
        Self {
            target: Coordinate::from_degrees(latitude, longitude),
            radius,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> EstimateResult<()> {
        if !self.target.is_finite() {
            return Err(EstimateError::InvalidConfig(
                "target coordinate must be finite".into(),
            ));
        }
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(EstimateError::InvalidConfig(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        if self.max_sensors == 0 {
            return Err(EstimateError::InvalidConfig(
                "max_sensors must be at least 1".into(),
            ));
        }
        if !(self.pm25_lower < self.pm25_upper) {
            return Err(EstimateError::InvalidConfig(format!(
                "empty PM2.5 range [{}, {})",
                self.pm25_lower, self.pm25_upper
            )));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(EstimateError::InvalidConfig(format!(
                "contamination must lie in (0, 0.5], got {}",
                self.contamination
            )));
        }
        Ok(())
    }
}

/// Common error type for an estimation run.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EstimateError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("sensor directory unavailable: {0}")]
    DirectoryUnavailable(String),
    #[error("no candidate sensors within radius")]
    NoCandidateSensors,
    #[error("no valid readings from selected sensors")]
    NoValidReadings,
    #[error("surviving proximity weights sum to zero")]
    DegenerateAggregation,
}

pub type EstimateResult<T> = Result<T, EstimateError>;

/// Failure to obtain one sensor's reading. Costs that sensor its points only.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("transport failure for sensor {id}: {message}")]
    Transport { id: u64, message: String },
    #[error("malformed reading for sensor {id}: {source}")]
    Malformed { id: u64, source: EstimateError },
    #[error("no reading available for sensor {0}")]
    Missing(u64),
}

/// A processing step in the estimation pipeline.
pub trait ProcessingStage {
    type Input;
    type Output;

    fn name(&self) -> &'static str;
    fn execute(&mut self, input: Self::Input) -> EstimateResult<Self::Output>;
}
