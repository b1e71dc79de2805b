use aqicore::processing::{CorrectionModel, OutlierMethod};
use aqicore::EstimatorConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "https://www.purpleair.com/json";

/// `~/<name>`, falling back to the working directory when `HOME` is unset.
pub fn home_file(name: &str) -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(name)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Target latitude in degrees.
    pub latitude: f64,
    /// Target longitude in degrees.
    pub longitude: f64,
    /// Search radius in kilometres.
    pub radius: f64,
    pub max_sensors: usize,
    /// Readings older than this many minutes are ignored.
    pub max_age: u32,
    pub correction: CorrectionModel,
    pub outlier_method: OutlierMethod,
    /// Seconds before the sensor directory is fetched again.
    pub sensors_list_ttl: u64,
    pub sensors_list_cache_file: PathBuf,
    /// Seconds before a cached AQI value is recomputed.
    pub results_ttl: u64,
    pub results_cache_file: PathBuf,
    pub endpoint: String,
    pub dry_run: bool,
    pub offline: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            latitude: 37.256886,
            longitude: -122.039156,
            radius: 5.0,
            max_sensors: 30,
            max_age: 10,
            correction: CorrectionModel::Epa,
            outlier_method: OutlierMethod::IsolationForest,
            sensors_list_ttl: 1800,
            sensors_list_cache_file: home_file(".purple-all-sensors.list"),
            results_ttl: 600,
            results_cache_file: home_file(".purple-avg.cache"),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            dry_run: false,
            offline: false,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn to_estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            max_sensors: self.max_sensors,
            max_age_minutes: self.max_age,
            correction: self.correction,
            outlier_method: self.outlier_method,
            ..EstimatorConfig::from_degrees(self.latitude, self.longitude, self.radius)
        }
    }
}
