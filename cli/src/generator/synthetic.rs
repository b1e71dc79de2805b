use crate::source::SensorSource;
use aqicore::math::geo::EARTH_RADIUS_KM;
use aqicore::processing::SelectedSensor;
use aqicore::sensor_interface::{SensorDirectory, SensorReading};
use aqicore::{FetchError, PrefetchedReadings};
use anyhow::Context;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::f64::consts::PI;

/// Configuration for generating a synthetic sensor network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Network centre in degrees.
    pub latitude: f64,
    pub longitude: f64,
    pub sensors: usize,
    /// Sensors are scattered uniformly out to this many kilometres.
    pub spread_km: f64,
    pub base_pm25: f64,
    pub noise: f64,
    pub humidity: f64,
    /// Probability that a channel reports a spurious spike.
    pub spike_rate: f64,
    pub max_age: u32,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            latitude: 37.256886,
            longitude: -122.039156,
            sensors: 60,
            spread_km: 8.0,
            base_pm25: 14.0,
            noise: 2.0,
            humidity: 45.0,
            spike_rate: 0.02,
            max_age: 15,
            seed: 0,
        }
    }
}

impl GeneratorConfig {
    pub fn around(latitude: f64, longitude: f64, radius: f64) -> Self {
        Self {
            latitude,
            longitude,
            spread_km: radius * 1.6,
            ..Default::default()
        }
    }
}

/// Directory entry in the upstream document layout.
fn directory_entry(config: &GeneratorConfig, id: u64, rng: &mut StdRng) -> Value {
    let bearing = rng.gen_range(0.0..2.0 * PI);
    let reach = rng.gen_range(0.0..config.spread_km.max(f64::EPSILON)) / EARTH_RADIUS_KM;
    let lat = config.latitude + (reach * bearing.cos()).to_degrees();
    let lon = config.longitude
        + (reach * bearing.sin() / config.latitude.to_radians().cos()).to_degrees();

    let location = if id % 5 == 4 { "inside" } else { "outside" };
    let hidden = if id % 7 == 6 { "true" } else { "false" };
    let mut entry = json!({
        "ID": id,
        "Label": format!("synthetic-{}", id),
        "DEVICE_LOCATIONTYPE": location,
        "Lat": lat,
        "Hidden": hidden,
    });
    if id % 11 != 10 {
        entry["Lon"] = json!(lon);
    }
    entry
}

fn channel_value(config: &GeneratorConfig, rng: &mut StdRng) -> f64 {
    if rng.gen_bool(config.spike_rate.clamp(0.0, 1.0)) {
        rng.gen_range(300.0..480.0)
    } else {
        (config.base_pm25 + rng.gen_range(-config.noise..=config.noise)).max(0.0)
    }
}

/// `?show=<id>` document for one sensor, with humidity on channel A only.
fn reading_document(config: &GeneratorConfig, id: u64, rng: &mut StdRng) -> Value {
    json!({
        "results": [
            {
                "ID": id,
                "pm2_5_cf_1": format!("{:.2}", channel_value(config, rng)),
                "humidity": format!("{:.0}", config.humidity + rng.gen_range(-5.0..5.0)),
                "AGE": rng.gen_range(0..=config.max_age),
            },
            {
                "ID": id + 1_000_000,
                "ParentID": id,
                "pm2_5_cf_1": format!("{:.2}", channel_value(config, rng)),
                "AGE": rng.gen_range(0..=config.max_age),
            }
        ]
    })
}

/// Offline stand-in for the PurpleAir API, deterministic for a given seed.
pub struct SyntheticSource {
    directory: String,
    readings: HashMap<u64, String>,
}

impl SyntheticSource {
    pub fn new(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let ids = 0..config.sensors as u64;

        let entries: Vec<Value> = ids
            .clone()
            .map(|id| directory_entry(config, id, &mut rng))
            .collect();
        let directory = serde_json::to_string(&json!({ "results": entries }))
            .context("serialising synthetic directory")?;

        let mut readings = HashMap::with_capacity(config.sensors);
        for id in ids {
            let document = serde_json::to_string(&reading_document(config, id, &mut rng))
                .context("serialising synthetic reading")?;
            readings.insert(id, document);
        }

        Ok(Self {
            directory,
            readings,
        })
    }
}

impl SensorSource for SyntheticSource {
    fn directory(&self) -> anyhow::Result<SensorDirectory> {
        Ok(SensorDirectory::from_json(&self.directory)?)
    }

    fn readings(&self, sensors: &[SelectedSensor]) -> PrefetchedReadings {
        sensors
            .iter()
            .map(|sensor| {
                let reading = match self.readings.get(&sensor.id) {
                    Some(text) => SensorReading::from_json(text).map_err(|source| {
                        FetchError::Malformed {
                            id: sensor.id,
                            source,
                        }
                    }),
                    None => Err(FetchError::Missing(sensor.id)),
                };
                (sensor.id, reading)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqicore::sensor_interface::LocationType;
    use aqicore::ReadingFetcher;

    #[test]
    fn generator_builds_expected_directory() {
        let config = GeneratorConfig {
            sensors: 22,
            ..Default::default()
        };
        let directory = SyntheticSource::new(&config).unwrap().directory().unwrap();
        assert_eq!(directory.len(), 22);
        assert_eq!(directory.sensors[4].location, LocationType::Inside);
        assert!(directory.sensors[6].hidden);
        assert!(directory.sensors[10].coordinate.is_none());
        assert!(directory.sensors[0].coordinate.is_some());
    }

    #[test]
    fn generator_is_deterministic_per_seed() {
        let config = GeneratorConfig::default();
        let a = SyntheticSource::new(&config).unwrap();
        let b = SyntheticSource::new(&config).unwrap();
        assert_eq!(a.directory().unwrap(), b.directory().unwrap());
        assert_eq!(a.readings, b.readings);
    }

    #[test]
    fn readings_parse_and_share_humidity() {
        let source = SyntheticSource::new(&GeneratorConfig::default()).unwrap();
        let mut readings = source.readings(&[
            SelectedSensor {
                id: 0,
                distance: 1.0,
            },
            SelectedSensor {
                id: 9999,
                distance: 1.0,
            },
        ]);
        let reading = readings.fetch(0).unwrap();
        assert_eq!(reading.channel_a.humidity, reading.channel_b.humidity);
        assert!(matches!(readings.fetch(9999), Err(FetchError::Missing(9999))));
    }
}
