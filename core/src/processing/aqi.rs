//! PM2.5 to AQI conversion using the EPA piecewise-linear breakpoints
//! (Technical Assistance Document, September 2018).

use crate::prelude::{EstimateError, EstimateResult, ProcessingStage};
use crate::telemetry::log::LogManager;
use serde::Serialize;

/// One row of the breakpoint table, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AqiBreakpoint {
    pub conc_low: f64,
    pub conc_high: f64,
    pub index_low: f64,
    pub index_high: f64,
}

const fn bp(conc_low: f64, conc_high: f64, index_low: f64, index_high: f64) -> AqiBreakpoint {
    AqiBreakpoint {
        conc_low,
        conc_high,
        index_low,
        index_high,
    }
}

pub const PM25_BREAKPOINTS: [AqiBreakpoint; 7] = [
    bp(0.0, 12.0, 0.0, 50.0),
    bp(12.1, 35.4, 51.0, 100.0),
    bp(35.5, 55.4, 101.0, 150.0),
    bp(55.5, 150.4, 151.0, 200.0),
    bp(150.5, 250.4, 201.0, 300.0),
    bp(250.5, 350.4, 301.0, 400.0),
    bp(350.5, 500.4, 401.0, 500.0),
];

/// Reported for concentrations above the last breakpoint.
pub const BEYOND_INDEX: f64 = 501.0;

/// Health category of a rounded AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
    BeyondIndex,
}

impl AqiCategory {
    pub fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            301..=500 => AqiCategory::Hazardous,
            _ => AqiCategory::BeyondIndex,
        }
    }
}

/// Converted index for one concentration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AqiIndex {
    /// Interpolated index before rounding.
    pub index: f64,
    pub aqi: u16,
    pub category: AqiCategory,
}

/// Interpolated index for a concentration; negative input is treated as zero.
pub fn concentration_to_index(concentration: f64) -> f64 {
    let clamped = concentration.max(0.0);
    // rounds the exact binary value, so 500.45 (stored as 500.4499...) gives 500.4
    let cp = format!("{:.1}", clamped)
        .parse::<f64>()
        .unwrap_or(clamped);
    PM25_BREAKPOINTS
        .iter()
        .find(|b| cp >= b.conc_low && cp <= b.conc_high)
        .map(|b| {
            (b.index_high - b.index_low) / (b.conc_high - b.conc_low) * (cp - b.conc_low)
                + b.index_low
        })
        .unwrap_or(BEYOND_INDEX)
}

pub struct AqiConverter {
    logger: LogManager,
}

impl AqiConverter {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("aqi_converter"),
        }
    }

    pub fn convert(concentration: f64) -> AqiIndex {
        let index = concentration_to_index(concentration);
        let aqi = index.round_ties_even() as u16;
        AqiIndex {
            index,
            aqi,
            category: AqiCategory::from_aqi(aqi),
        }
    }
}

impl Default for AqiConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for AqiConverter {
    type Input = f64;
    type Output = AqiIndex;

    fn name(&self) -> &'static str {
        "aqi_converter"
    }

    fn execute(&mut self, input: Self::Input) -> EstimateResult<Self::Output> {
        if !input.is_finite() {
            return Err(EstimateError::DegenerateAggregation);
        }
        let converted = Self::convert(input);
        self.logger.record(&format!(
            "{:.1} ug/m3 -> AQI {} ({:?})",
            input, converted.aqi, converted.category
        ));
        Ok(converted)
    }
}
