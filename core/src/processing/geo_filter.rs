use crate::math::geo::GeoHelper;
use crate::prelude::{Coordinate, EstimatorConfig};
use crate::sensor_interface::{LocationType, SensorDirectory, SensorRecord};
use crate::telemetry::log::LogManager;

/// A directory entry that passed the proximity filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedSensor {
    pub id: u64,
    /// Kilometres from the target, always below the search radius.
    pub distance: f64,
}

/// Selects visible outdoor sensors within the radius, in directory order.
pub struct GeoFilter {
    target: Coordinate,
    radius: f64,
    max_sensors: usize,
    logger: LogManager,
}

impl GeoFilter {
    pub fn new(target: Coordinate, radius: f64, max_sensors: usize) -> Self {
        Self {
            target,
            radius,
            max_sensors,
            logger: LogManager::new("geo_filter"),
        }
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::new(config.target, config.radius, config.max_sensors)
    }

    fn distance_if_eligible(&self, record: &SensorRecord) -> Option<f64> {
        let coordinate = record.coordinate?;
        if record.location != LocationType::Outside || record.hidden {
            return None;
        }
        let distance = GeoHelper::haversine(&self.target, &coordinate);
        (distance < self.radius).then_some(distance)
    }

    pub fn select(&self, directory: &SensorDirectory) -> Vec<SelectedSensor> {
        let mut selected = Vec::new();
        for record in &directory.sensors {
            if selected.len() >= self.max_sensors {
                break;
            }
            if let Some(distance) = self.distance_if_eligible(record) {
                self.logger
                    .detail(&format!("sensor {} at {:.3} km", record.id, distance));
                selected.push(SelectedSensor {
                    id: record.id,
                    distance,
                });
            }
        }

        self.logger.record(&format!(
            "selected {} of {} sensors",
            selected.len(),
            directory.len()
        ));
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::geo::EARTH_RADIUS_KM;

    const TARGET_LAT: f64 = 37.25;
    const TARGET_LON: f64 = -122.0;

    /// Sensor due north of the target at `km` kilometres.
    fn sensor_at(id: u64, km: f64) -> SensorRecord {
        let lat = TARGET_LAT + (km / EARTH_RADIUS_KM).to_degrees();
        SensorRecord::outdoor(id, lat, TARGET_LON)
    }

    fn filter(radius: f64, max_sensors: usize) -> GeoFilter {
        GeoFilter::new(
            Coordinate::from_degrees(TARGET_LAT, TARGET_LON),
            radius,
            max_sensors,
        )
    }

    #[test]
    fn excludes_hidden_indoor_and_unplaced_sensors() {
        let mut hidden = sensor_at(2, 1.0);
        hidden.hidden = true;
        let mut inside = sensor_at(3, 1.0);
        inside.location = LocationType::Inside;
        let mut unspecified = sensor_at(4, 1.0);
        unspecified.location = LocationType::Unspecified;
        let mut unplaced = sensor_at(5, 1.0);
        unplaced.coordinate = None;

        let directory =
            SensorDirectory::new(vec![sensor_at(1, 1.0), hidden, inside, unspecified, unplaced]);
        let selected = filter(5.0, 10).select(&directory);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, 1);
        assert!((selected[0].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn radius_bound_is_strict() {
        let directory = SensorDirectory::new(vec![sensor_at(1, 3.0), sensor_at(2, 4.0)]);
        let exact = GeoHelper::haversine(
            &Coordinate::from_degrees(TARGET_LAT, TARGET_LON),
            &directory.sensors[1].coordinate.unwrap(),
        );
        let selected = filter(exact, 10).select(&directory);
        assert_eq!(selected.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn cap_preserves_directory_order() {
        let directory = SensorDirectory::new(
            [4.0, 0.5, 9.0, 2.0, 1.0, 3.0]
                .iter()
                .enumerate()
                .map(|(idx, &km)| sensor_at(idx as u64, km))
                .collect(),
        );
        let selected = filter(5.0, 3).select(&directory);
        assert_eq!(
            selected.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![0, 1, 3]
        );
    }
}
