use crate::prelude::{EstimateResult, EstimatorConfig, ProcessingStage};
use crate::processing::validator::ValidatedPoint;
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};

/// Calibrated PM2.5 with the proximity weight it carries into aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedPoint {
    pub pm25: f64,
    pub weight: f64,
}

/// Converts a raw low-cost sensor value into a calibrated concentration.
pub trait CorrectionStrategy {
    fn name(&self) -> &'static str;
    /// Never returns a negative concentration.
    fn correct(&self, pm25_raw: f64, humidity: f64) -> f64;
}

/// US EPA nationwide correction for PurpleAir CF=1 data.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpaCorrection;

impl CorrectionStrategy for EpaCorrection {
    fn name(&self) -> &'static str {
        "epa"
    }

    fn correct(&self, pm25_raw: f64, humidity: f64) -> f64 {
        (0.534 * pm25_raw - 0.0844 * humidity + 5.604).max(0.0)
    }
}

/// Lane Regional Air Protection Agency correction; ignores humidity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LrapaCorrection;

impl CorrectionStrategy for LrapaCorrection {
    fn name(&self) -> &'static str {
        "lrapa"
    }

    fn correct(&self, pm25_raw: f64, _humidity: f64) -> f64 {
        (0.5 * pm25_raw - 0.66).max(0.0)
    }
}

/// Correction model selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionModel {
    Epa,
    Lrapa,
}

impl CorrectionStrategy for CorrectionModel {
    fn name(&self) -> &'static str {
        match self {
            CorrectionModel::Epa => EpaCorrection.name(),
            CorrectionModel::Lrapa => LrapaCorrection.name(),
        }
    }

    fn correct(&self, pm25_raw: f64, humidity: f64) -> f64 {
        match self {
            CorrectionModel::Epa => EpaCorrection.correct(pm25_raw, humidity),
            CorrectionModel::Lrapa => LrapaCorrection.correct(pm25_raw, humidity),
        }
    }
}

/// Applies a correction strategy to every surviving point.
pub struct PollutantCorrector {
    strategy: Box<dyn CorrectionStrategy>,
    logger: LogManager,
}

impl PollutantCorrector {
    pub fn new(strategy: Box<dyn CorrectionStrategy>) -> Self {
        Self {
            strategy,
            logger: LogManager::new("pollutant_corrector"),
        }
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::new(Box::new(config.correction))
    }

    pub fn correct(&self, point: &ValidatedPoint) -> CorrectedPoint {
        CorrectedPoint {
            pm25: self.strategy.correct(point.pm25_raw, point.humidity),
            weight: point.weight,
        }
    }
}

impl ProcessingStage for PollutantCorrector {
    type Input = Vec<ValidatedPoint>;
    type Output = Vec<CorrectedPoint>;

    fn name(&self) -> &'static str {
        "pollutant_corrector"
    }

    fn execute(&mut self, input: Self::Input) -> EstimateResult<Self::Output> {
        self.logger.detail(&format!(
            "applying {} correction to {} points",
            self.strategy.name(),
            input.len()
        ));
        Ok(input.iter().map(|point| self.correct(point)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epa_intercept_at_zero() {
        assert!((EpaCorrection.correct(0.0, 0.0) - 5.604).abs() < 1e-12);
    }

    #[test]
    fn epa_is_never_negative() {
        for raw in [0.0, 0.5, 1.0, 5.0, 20.0] {
            for humidity in (0..=100).map(f64::from) {
                assert!(EpaCorrection.correct(raw, humidity) >= 0.0);
            }
        }
        assert_eq!(EpaCorrection.correct(0.0, 100.0), 0.0);
    }

    #[test]
    fn lrapa_ignores_humidity_and_floors() {
        assert!((LrapaCorrection.correct(10.0, 90.0) - 4.34).abs() < 1e-12);
        assert_eq!(LrapaCorrection.correct(1.0, 0.0), 0.0);
    }

    #[test]
    fn corrector_uses_configured_model() {
        let point = ValidatedPoint {
            pm25_raw: 10.0,
            weight: 2.5,
            humidity: 50.0,
        };
        let config = EstimatorConfig {
            correction: CorrectionModel::Lrapa,
            ..Default::default()
        };
        let mut corrector = PollutantCorrector::from_config(&config);
        let corrected = corrector.execute(vec![point]).unwrap();
        assert!((corrected[0].pm25 - 4.34).abs() < 1e-12);
        assert_eq!(corrected[0].weight, 2.5);
    }
}
