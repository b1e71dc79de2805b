use crate::cache::FileStore;
use crate::source::SensorSource;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use aqicore::cache::{get_or_refresh, read_fresh, TtlStore};
use aqicore::sensor_interface::SensorDirectory;
use aqicore::{AqiEstimate, EstimateError, Pipeline};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Last computed value, tagged with the query that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub aqi: u16,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

impl CachedResult {
    fn answers(&self, config: &WorkflowConfig) -> bool {
        self.latitude == config.latitude
            && self.longitude == config.longitude
            && self.radius == config.radius
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Cached(CachedResult),
    Computed(AqiEstimate),
}

impl RunOutcome {
    pub fn aqi(&self) -> u16 {
        match self {
            RunOutcome::Cached(cached) => cached.aqi,
            RunOutcome::Computed(estimate) => estimate.aqi,
        }
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, source: &dyn SensorSource) -> anyhow::Result<RunOutcome> {
        let mut pipeline = Pipeline::new(self.config.to_estimator_config())
            .context("building estimation pipeline")?;

        if let Some(cached) = self.cached_result() {
            info!("returning cached value");
            return Ok(RunOutcome::Cached(cached));
        }

        let directory = self.load_directory(source)?;
        info!("loaded {} sensors", directory.len());

        let selected = pipeline
            .select(&directory)
            .context("selecting nearby sensors")?;
        info!("found {} suitable sensors", selected.len());

        let mut readings = source.readings(&selected);
        let estimate = pipeline
            .estimate_selected(&selected, &mut readings)
            .context("estimating AQI")?;
        if estimate.stats.outliers_dropped > 0 {
            info!("dropped {} outlier(s)", estimate.stats.outliers_dropped);
        }

        self.store_result(estimate.aqi);
        Ok(RunOutcome::Computed(estimate))
    }

    fn load_directory(&self, source: &dyn SensorSource) -> anyhow::Result<SensorDirectory> {
        let fetch = || {
            source
                .directory()
                .map_err(|err| EstimateError::DirectoryUnavailable(format!("{:#}", err)))
        };

        let directory = if self.config.dry_run {
            fetch()?
        } else {
            let mut store = FileStore::new(&self.config.sensors_list_cache_file);
            get_or_refresh(
                &mut store,
                Duration::from_secs(self.config.sensors_list_ttl),
                fetch,
            )?
        };
        Ok(directory)
    }

    fn cached_result(&self) -> Option<CachedResult> {
        if self.config.dry_run {
            return None;
        }
        let store = FileStore::new(&self.config.results_cache_file);
        let cached: CachedResult =
            read_fresh(&store, Duration::from_secs(self.config.results_ttl))?;
        if cached.answers(&self.config) {
            Some(cached)
        } else {
            info!("cached value is for a different location, recomputing");
            None
        }
    }

    fn store_result(&self, aqi: u16) {
        if self.config.dry_run {
            return;
        }
        let record = CachedResult {
            aqi,
            latitude: self.config.latitude,
            longitude: self.config.longitude,
            radius: self.config.radius,
        };
        let mut store = FileStore::new(&self.config.results_cache_file);
        if let Err(err) = store.write(&record) {
            warn!("error writing cached value: {}", err);
        }
    }
}
