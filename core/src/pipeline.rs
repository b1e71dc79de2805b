use crate::prelude::{EstimateError, EstimateResult, EstimatorConfig, FetchError, ProcessingStage};
use crate::processing::{
    Aggregator, AqiCategory, AqiConverter, GeoFilter, OutlierRejector, PollutantCorrector,
    ReadingValidator, SelectedSensor, ValidatedPoint,
};
use crate::sensor_interface::{SensorDirectory, SensorReading};
use crate::telemetry::{LogManager, MetricsRecorder, PipelineStats};
use serde::Serialize;
use std::collections::HashMap;

/// Supplies the latest dual-channel reading for a sensor.
pub trait ReadingFetcher {
    fn fetch(&mut self, sensor_id: u64) -> Result<SensorReading, FetchError>;
}

impl<F> ReadingFetcher for F
where
    F: FnMut(u64) -> Result<SensorReading, FetchError>,
{
    fn fetch(&mut self, sensor_id: u64) -> Result<SensorReading, FetchError> {
        self(sensor_id)
    }
}

/// Readings retrieved ahead of time, e.g. by a concurrent fan-out.
#[derive(Debug, Default)]
pub struct PrefetchedReadings {
    readings: HashMap<u64, Result<SensorReading, FetchError>>,
}

impl PrefetchedReadings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sensor_id: u64, reading: Result<SensorReading, FetchError>) {
        self.readings.insert(sensor_id, reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl FromIterator<(u64, Result<SensorReading, FetchError>)> for PrefetchedReadings {
    fn from_iter<I: IntoIterator<Item = (u64, Result<SensorReading, FetchError>)>>(
        iter: I,
    ) -> Self {
        Self {
            readings: iter.into_iter().collect(),
        }
    }
}

impl ReadingFetcher for PrefetchedReadings {
    fn fetch(&mut self, sensor_id: u64) -> Result<SensorReading, FetchError> {
        self.readings
            .get(&sensor_id)
            .cloned()
            .unwrap_or(Err(FetchError::Missing(sensor_id)))
    }
}

/// Result of one estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AqiEstimate {
    pub aqi: u16,
    pub index: f64,
    pub category: AqiCategory,
    /// Weighted, corrected PM2.5 in µg/m³.
    pub concentration: f64,
    pub stats: PipelineStats,
}

/// Orchestrates selection, validation, outlier rejection, correction,
/// aggregation and conversion for one configuration.
pub struct Pipeline {
    config: EstimatorConfig,
    geo_filter: GeoFilter,
    validator: ReadingValidator,
    rejector: OutlierRejector,
    corrector: PollutantCorrector,
    aggregator: Aggregator,
    converter: AqiConverter,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl Pipeline {
    pub fn new(config: EstimatorConfig) -> EstimateResult<Self> {
        config.validate()?;
        Ok(Self {
            geo_filter: GeoFilter::from_config(&config),
            validator: ReadingValidator::from_config(&config),
            rejector: OutlierRejector::from_config(&config),
            corrector: PollutantCorrector::from_config(&config),
            aggregator: Aggregator::new(),
            converter: AqiConverter::new(),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("pipeline"),
            config,
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Sensors worth fetching, or `NoCandidateSensors`.
    pub fn select(&self, directory: &SensorDirectory) -> EstimateResult<Vec<SelectedSensor>> {
        self.metrics.reset();
        self.metrics.record_directory(directory.len());

        let selected = self.geo_filter.select(directory);
        self.metrics.record_selected(selected.len());
        if selected.is_empty() {
            return Err(EstimateError::NoCandidateSensors);
        }
        Ok(selected)
    }

    /// Fetches, filters and combines readings for an already selected set.
    pub fn estimate_selected<F>(
        &mut self,
        selected: &[SelectedSensor],
        fetcher: &mut F,
    ) -> EstimateResult<AqiEstimate>
    where
        F: ReadingFetcher + ?Sized,
    {
        self.metrics.reset_counts();
        self.metrics.record_selected(selected.len());
        if selected.is_empty() {
            return Err(EstimateError::NoCandidateSensors);
        }

        let points = self.collect_points(selected, fetcher);
        if points.is_empty() {
            return Err(EstimateError::NoValidReadings);
        }

        let before = points.len();
        let survivors = self.rejector.execute(points)?;
        self.metrics.record_outliers(before - survivors.len());

        let corrected = self.corrector.execute(survivors)?;
        self.metrics.record_aggregated(corrected.len());
        let concentration = self.aggregator.execute(corrected)?;
        let converted = self.converter.execute(concentration)?;

        let stats = self.metrics.snapshot();
        self.logger.record(&format!(
            "AQI {} from {} points ({} rejected, {} outliers)",
            converted.aqi, stats.points_aggregated, stats.readings_rejected, stats.outliers_dropped
        ));

        Ok(AqiEstimate {
            aqi: converted.aqi,
            index: converted.index,
            category: converted.category,
            concentration,
            stats,
        })
    }

    /// Full run: select sensors from the directory, then estimate.
    pub fn run<F>(
        &mut self,
        directory: &SensorDirectory,
        fetcher: &mut F,
    ) -> EstimateResult<AqiEstimate>
    where
        F: ReadingFetcher + ?Sized,
    {
        let selected = self.select(directory)?;
        self.estimate_selected(&selected, fetcher)
    }

    fn collect_points<F>(&self, selected: &[SelectedSensor], fetcher: &mut F) -> Vec<ValidatedPoint>
    where
        F: ReadingFetcher + ?Sized,
    {
        let mut points = Vec::with_capacity(selected.len() * 2);
        for sensor in selected {
            let reading = match fetcher.fetch(sensor.id) {
                Ok(reading) => reading,
                Err(err) => {
                    self.logger.warn(&format!("skipping sensor: {}", err));
                    self.metrics.record_fetch_failure();
                    continue;
                }
            };

            let weight = self.config.radius - sensor.distance;
            for channel in reading.channels() {
                match self.validator.validate(&channel, weight) {
                    Some(point) => points.push(point),
                    None => {
                        self.logger.detail(&format!(
                            "sensor {} channel rejected: pm2.5 {} age {}",
                            sensor.id, channel.pm25_raw, channel.age_minutes
                        ));
                        self.metrics.record_rejected();
                    }
                }
            }
        }
        points
    }
}

/// One-shot estimate for a configuration, directory snapshot and fetcher.
pub fn estimate_aqi<F>(
    config: &EstimatorConfig,
    directory: &SensorDirectory,
    fetcher: &mut F,
) -> EstimateResult<AqiEstimate>
where
    F: ReadingFetcher + ?Sized,
{
    Pipeline::new(config.clone())?.run(directory, fetcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::geo::EARTH_RADIUS_KM;
    use crate::processing::CorrectionModel;
    use crate::sensor_interface::{ChannelReading, SensorRecord};

    const TARGET_LAT: f64 = 37.256886;
    const TARGET_LON: f64 = -122.039156;

    fn sensor_at(id: u64, km: f64) -> SensorRecord {
        let lat = TARGET_LAT + (km / EARTH_RADIUS_KM).to_degrees();
        SensorRecord::outdoor(id, lat, TARGET_LON)
    }

    fn channel(pm25_raw: f64, age_minutes: u32) -> ChannelReading {
        ChannelReading {
            pm25_raw,
            humidity: 50.0,
            age_minutes,
        }
    }

    fn config() -> EstimatorConfig {
        EstimatorConfig::from_degrees(TARGET_LAT, TARGET_LON, 5.0)
    }

    fn three_sensor_scenario() -> (SensorDirectory, PrefetchedReadings) {
        let directory =
            SensorDirectory::new(vec![sensor_at(1, 1.0), sensor_at(2, 2.0), sensor_at(3, 4.0)]);
        let readings = [(1, 8.0, 10.0), (2, 9.0, 11.0), (3, 7.0, 12.0)]
            .into_iter()
            .map(|(id, a, b)| (id, Ok(SensorReading::new(channel(a, 0), channel(b, 1)))))
            .collect();
        (directory, readings)
    }

    #[test]
    fn three_sensor_scenario_matches_hand_computation() {
        let (directory, mut readings) = three_sensor_scenario();
        let estimate = estimate_aqi(&config(), &directory, &mut readings).unwrap();

        // EPA(x, 50) = 0.534x + 1.384, weights 4, 3, 1 per channel
        let expected = (4.0 * (0.534 * 18.0 + 2.768)
            + 3.0 * (0.534 * 20.0 + 2.768)
            + 1.0 * (0.534 * 19.0 + 2.768))
            / 16.0;
        assert!((estimate.concentration - expected).abs() < 1e-6);
        assert_eq!(estimate.aqi, 27);
        assert_eq!(estimate.category, AqiCategory::Good);
        assert_eq!(estimate.stats.points_aggregated, 6);
        assert_eq!(estimate.stats.directory_size, 3);
    }

    #[test]
    fn rerunning_same_snapshot_is_idempotent() {
        let (directory, mut readings) = three_sensor_scenario();
        let mut pipeline = Pipeline::new(config()).unwrap();
        let first = pipeline.run(&directory, &mut readings).unwrap();
        let second = pipeline.run(&directory, &mut readings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn no_sensors_in_radius() {
        let directory = SensorDirectory::new(vec![sensor_at(1, 50.0)]);
        let mut readings = PrefetchedReadings::new();
        assert_eq!(
            estimate_aqi(&config(), &directory, &mut readings),
            Err(EstimateError::NoCandidateSensors)
        );
    }

    #[test]
    fn all_readings_rejected() {
        let directory = SensorDirectory::new(vec![sensor_at(1, 1.0)]);
        let mut stale = |_: u64| -> Result<SensorReading, FetchError> {
            Ok(SensorReading::new(channel(5.0, 60), channel(600.0, 0)))
        };
        assert_eq!(
            estimate_aqi(&config(), &directory, &mut stale),
            Err(EstimateError::NoValidReadings)
        );
    }

    #[test]
    fn failed_fetch_only_costs_that_sensor() {
        let (directory, _) = three_sensor_scenario();
        let mut flaky = |id: u64| -> Result<SensorReading, FetchError> {
            if id == 2 {
                Err(FetchError::Transport {
                    id,
                    message: "timed out".into(),
                })
            } else {
                Ok(SensorReading::new(channel(10.0, 0), channel(10.0, 0)))
            }
        };
        let estimate = estimate_aqi(&config(), &directory, &mut flaky).unwrap();
        assert_eq!(estimate.stats.fetch_failures, 1);
        assert_eq!(estimate.stats.points_aggregated, 4);
        assert!((estimate.concentration - (0.534 * 10.0 + 1.384)).abs() < 1e-9);
    }

    #[test]
    fn unparseable_humidity_drops_that_sensor() {
        let directory = SensorDirectory::new(vec![sensor_at(1, 1.0), sensor_at(2, 2.0)]);
        let mut fetcher = |id: u64| -> Result<SensorReading, FetchError> {
            let humidity = if id == 2 { "\"NaN\"" } else { "\"50\"" };
            let text = format!(
                r#"{{"results":[{{"pm2_5_cf_1":"20","humidity":{},"AGE":0}},{{"pm2_5_cf_1":"20","AGE":0}}]}}"#,
                humidity
            );
            SensorReading::from_json(&text).map_err(|source| FetchError::Malformed { id, source })
        };
        let estimate = estimate_aqi(&config(), &directory, &mut fetcher).unwrap();
        assert_eq!(estimate.stats.fetch_failures, 1);
        assert_eq!(estimate.stats.points_aggregated, 2);
        assert!((estimate.concentration - 12.064).abs() < 1e-9);
        assert_eq!(estimate.aqi, 51);
    }

    #[test]
    fn every_fetch_failing_is_no_valid_readings() {
        let (directory, _) = three_sensor_scenario();
        let mut empty = PrefetchedReadings::new();
        assert_eq!(
            estimate_aqi(&config(), &directory, &mut empty),
            Err(EstimateError::NoValidReadings)
        );
    }

    #[test]
    fn spike_is_dropped_before_aggregation() {
        let sensors: Vec<SensorRecord> = (0..50).map(|id| sensor_at(id, 2.0)).collect();
        let directory = SensorDirectory::new(sensors);
        let mut fetcher = |id: u64| -> Result<SensorReading, FetchError> {
            let base = 10.0 + (id % 5) as f64 * 0.1;
            let b = if id == 17 { 480.0 } else { base + 0.05 };
            Ok(SensorReading::new(channel(base, 0), channel(b, 0)))
        };
        let cfg = EstimatorConfig {
            max_sensors: 50,
            ..config()
        };
        let estimate = estimate_aqi(&cfg, &directory, &mut fetcher).unwrap();
        assert_eq!(estimate.stats.outliers_dropped, 1);
        assert_eq!(estimate.stats.points_aggregated, 99);
        assert!(estimate.concentration < 8.0);
    }

    #[test]
    fn correction_model_is_swappable() {
        let (directory, mut readings) = three_sensor_scenario();
        let cfg = EstimatorConfig {
            correction: CorrectionModel::Lrapa,
            ..config()
        };
        let estimate = estimate_aqi(&cfg, &directory, &mut readings).unwrap();
        let expected = (4.0 * (0.5 * 18.0 - 1.32)
            + 3.0 * (0.5 * 20.0 - 1.32)
            + 1.0 * (0.5 * 19.0 - 1.32))
            / 16.0;
        assert!((estimate.concentration - expected).abs() < 1e-6);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let cfg = EstimatorConfig {
            max_sensors: 0,
            ..config()
        };
        assert!(matches!(
            Pipeline::new(cfg),
            Err(EstimateError::InvalidConfig(_))
        ));
    }
}
