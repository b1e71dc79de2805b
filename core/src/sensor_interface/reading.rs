use crate::prelude::{EstimateError, EstimateResult};
use serde::Deserialize;

/// One channel of a dual-laser sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    /// Raw PM2.5 (CF=1) in µg/m³.
    pub pm25_raw: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    pub age_minutes: u32,
}

/// Latest reading of a physical sensor: channels A and B.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub channel_a: ChannelReading,
    pub channel_b: ChannelReading,
}

impl SensorReading {
    pub fn new(channel_a: ChannelReading, channel_b: ChannelReading) -> Self {
        Self {
            channel_a,
            channel_b,
        }
    }

    pub fn channels(&self) -> [ChannelReading; 2] {
        [self.channel_a, self.channel_b]
    }

    /// Parses the `?show=<id>` document. Humidity is only reported on
    /// channel A by most devices, so it is shared with channel B.
    pub fn from_json(text: &str) -> EstimateResult<Self> {
        let raw: RawReading = serde_json::from_str(text)
            .map_err(|err| EstimateError::Parse(format!("sensor reading: {}", err)))?;

        let mut channels = raw.results.into_iter();
        let (a, b) = match (channels.next(), channels.next()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(EstimateError::Parse(
                    "sensor reading: expected two channels".into(),
                ))
            }
        };

        let humidity = a.humidity.or(b.humidity).ok_or_else(|| {
            EstimateError::Parse("sensor reading: humidity missing on both channels".into())
        })?;
        if !humidity.is_finite() {
            return Err(EstimateError::Parse(format!(
                "sensor reading: invalid humidity {}",
                humidity
            )));
        }

        Ok(Self {
            channel_a: a.into_channel(humidity)?,
            channel_b: b.into_channel(humidity)?,
        })
    }
}

#[derive(Deserialize)]
struct RawChannel {
    #[serde(deserialize_with = "super::lenient_f64")]
    pm2_5_cf_1: f64,
    #[serde(default, deserialize_with = "super::lenient_opt_f64")]
    humidity: Option<f64>,
    #[serde(rename = "AGE", deserialize_with = "super::lenient_f64")]
    age: f64,
}

impl RawChannel {
    fn into_channel(self, humidity: f64) -> EstimateResult<ChannelReading> {
        if !(self.age.is_finite() && self.age >= 0.0) {
            return Err(EstimateError::Parse(format!(
                "sensor reading: invalid AGE {}",
                self.age
            )));
        }
        Ok(ChannelReading {
            pm25_raw: self.pm2_5_cf_1,
            humidity,
            age_minutes: self.age as u32,
        })
    }
}

#[derive(Deserialize)]
struct RawReading {
    results: Vec<RawChannel>,
}
