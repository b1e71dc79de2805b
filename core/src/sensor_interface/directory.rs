use crate::prelude::{Coordinate, EstimateError, EstimateResult};
use serde::{Deserialize, Serialize};

/// Installation type reported by the sensor owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationType {
    Outside,
    Inside,
    Other(String),
    Unspecified,
}

impl From<Option<String>> for LocationType {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            None | Some("") => LocationType::Unspecified,
            Some("outside") => LocationType::Outside,
            Some("inside") => LocationType::Inside,
            Some(other) => LocationType::Other(other.to_string()),
        }
    }
}

/// One entry of the sensor directory snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub id: u64,
    /// `None` when the directory omits either latitude or longitude.
    pub coordinate: Option<Coordinate>,
    pub location: LocationType,
    pub hidden: bool,
    pub label: Option<String>,
    /// Set on the secondary-channel entries, pointing at the primary device.
    pub parent_id: Option<u64>,
}

impl SensorRecord {
    /// Convenience constructor for an outdoor, visible sensor at a position in degrees.
    pub fn outdoor(id: u64, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            coordinate: Some(Coordinate::from_degrees(latitude, longitude)),
            location: LocationType::Outside,
            hidden: false,
            label: None,
            parent_id: None,
        }
    }
}

#[derive(Deserialize)]
struct RawSensorRecord {
    #[serde(rename = "ID")]
    id: u64,
    #[serde(rename = "Lat", default, deserialize_with = "super::lenient_opt_f64")]
    lat: Option<f64>,
    #[serde(rename = "Lon", default, deserialize_with = "super::lenient_opt_f64")]
    lon: Option<f64>,
    #[serde(rename = "DEVICE_LOCATIONTYPE", default)]
    location_type: Option<String>,
    #[serde(rename = "Hidden", deserialize_with = "super::lenient_bool")]
    hidden: bool,
    #[serde(rename = "Label", default)]
    label: Option<String>,
    #[serde(rename = "ParentID", default)]
    parent_id: Option<u64>,
}

impl From<RawSensorRecord> for SensorRecord {
    fn from(raw: RawSensorRecord) -> Self {
        let coordinate = match (raw.lat, raw.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::from_degrees(lat, lon)),
            _ => None,
        };
        Self {
            id: raw.id,
            coordinate,
            location: raw.location_type.into(),
            hidden: raw.hidden,
            label: raw.label,
            parent_id: raw.parent_id,
        }
    }
}

#[derive(Deserialize)]
struct RawDirectory {
    results: Vec<RawSensorRecord>,
}

/// Full directory snapshot, in upstream order.
///
/// [`SensorDirectory::from_json`] reads the upstream document; the serde
/// derives describe the compact form drivers use for caching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorDirectory {
    pub sensors: Vec<SensorRecord>,
}

impl SensorDirectory {
    pub fn new(sensors: Vec<SensorRecord>) -> Self {
        Self { sensors }
    }

    pub fn from_json(text: &str) -> EstimateResult<Self> {
        let raw: RawDirectory = serde_json::from_str(text)
            .map_err(|err| EstimateError::Parse(format!("sensor directory: {}", err)))?;
        Ok(Self {
            sensors: raw.results.into_iter().map(SensorRecord::from).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}
