use aqicore::processing::{CorrectionModel, OutlierMethod};
use clap::{Parser, ValueEnum};
use generator::{GeneratorConfig, SyntheticSource};
use log::debug;
use source::PurpleAirClient;
use std::path::PathBuf;
use workflow::config::{home_file, WorkflowConfig, DEFAULT_ENDPOINT};
use workflow::runner::{RunOutcome, Runner};

mod cache;
mod generator;
mod source;
mod workflow;

#[derive(Clone, Copy, ValueEnum)]
enum CorrectionArg {
    Epa,
    Lrapa,
}

impl From<CorrectionArg> for CorrectionModel {
    fn from(arg: CorrectionArg) -> Self {
        match arg {
            CorrectionArg::Epa => CorrectionModel::Epa,
            CorrectionArg::Lrapa => CorrectionModel::Lrapa,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutlierArg {
    IsolationForest,
    ModifiedZScore,
}

impl From<OutlierArg> for OutlierMethod {
    fn from(arg: OutlierArg) -> Self {
        match arg {
            OutlierArg::IsolationForest => OutlierMethod::IsolationForest,
            OutlierArg::ModifiedZScore => OutlierMethod::ModifiedZScore,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Estimate local AQI from nearby PurpleAir sensors")]
struct Args {
    #[arg(long, default_value_t = false)]
    verbose: bool,
    /// Do not read or update cache files
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Radius in kilometres
    #[arg(long, default_value_t = 5.0)]
    radius: f64,
    /// Latitude in degrees
    #[arg(long, default_value_t = 37.256886, allow_hyphen_values = true)]
    lat: f64,
    /// Longitude in degrees
    #[arg(long, default_value_t = -122.039156, allow_hyphen_values = true)]
    lon: f64,
    /// Max number of sensors to query
    #[arg(long, default_value_t = 30)]
    max_sensors: usize,
    /// How often to update the sensor list cache (in seconds)
    #[arg(long, default_value_t = 1800)]
    sensors_list_ttl: u64,
    /// Sensor list cache file location
    #[arg(long)]
    sensors_list_cache_file: Option<PathBuf>,
    /// How often to recompute the cached result (in seconds)
    #[arg(long, default_value_t = 600)]
    results_ttl: u64,
    /// Result cache file location
    #[arg(long)]
    results_cache_file: Option<PathBuf>,
    /// Ignore readings older than this many minutes
    #[arg(long, default_value_t = 10)]
    max_age: u32,
    #[arg(long, value_enum, default_value_t = CorrectionArg::Epa)]
    correction: CorrectionArg,
    #[arg(long, value_enum, default_value_t = OutlierArg::IsolationForest)]
    outlier_method: OutlierArg,
    /// Sensor directory endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    /// Use a synthetic sensor network instead of the network API
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load the workflow config from YAML instead of the options above
    #[arg(long)]
    workflow: Option<PathBuf>,
}

impl Args {
    fn into_workflow(self) -> anyhow::Result<WorkflowConfig> {
        if let Some(path) = &self.workflow {
            let mut config = WorkflowConfig::load(path)?;
            config.dry_run |= self.dry_run;
            config.offline |= self.offline;
            return Ok(config);
        }

        Ok(WorkflowConfig {
            latitude: self.lat,
            longitude: self.lon,
            radius: self.radius,
            max_sensors: self.max_sensors,
            max_age: self.max_age,
            correction: self.correction.into(),
            outlier_method: self.outlier_method.into(),
            sensors_list_ttl: self.sensors_list_ttl,
            sensors_list_cache_file: self
                .sensors_list_cache_file
                .unwrap_or_else(|| home_file(".purple-all-sensors.list")),
            results_ttl: self.results_ttl,
            results_cache_file: self
                .results_cache_file
                .unwrap_or_else(|| home_file(".purple-avg.cache")),
            endpoint: self.endpoint,
            dry_run: self.dry_run,
            offline: self.offline,
        })
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = args.into_workflow()?;
    debug!("coordinates: {},{}", config.latitude, config.longitude);

    let runner = Runner::new(config.clone());
    let outcome = if config.offline {
        let source = SyntheticSource::new(&GeneratorConfig::around(
            config.latitude,
            config.longitude,
            config.radius,
        ))?;
        runner.execute(&source)?
    } else {
        let source = PurpleAirClient::new(config.endpoint.clone())?;
        runner.execute(&source)?
    };

    if let RunOutcome::Computed(estimate) = &outcome {
        debug!(
            "{:.2} ug/m3 ({:?}), stats {:?}",
            estimate.concentration, estimate.category, estimate.stats
        );
    }
    println!("{}", outcome.aqi());
    Ok(())
}
