use crate::prelude::{EstimateError, EstimateResult, ProcessingStage};
use crate::processing::correction::CorrectedPoint;
use crate::telemetry::log::LogManager;

/// Inverse-distance weighted mean of corrected concentrations.
pub struct Aggregator {
    logger: LogManager,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("aggregator"),
        }
    }

    pub fn weighted_mean(points: &[CorrectedPoint]) -> EstimateResult<f64> {
        let (weighted, total) = points.iter().fold((0.0, 0.0), |(sum, weights), p| {
            (sum + p.pm25 * p.weight, weights + p.weight)
        });
        if !(total > 0.0 && total.is_finite()) {
            return Err(EstimateError::DegenerateAggregation);
        }
        Ok(weighted / total)
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for Aggregator {
    type Input = Vec<CorrectedPoint>;
    type Output = f64;

    fn name(&self) -> &'static str {
        "aggregator"
    }

    fn execute(&mut self, input: Self::Input) -> EstimateResult<Self::Output> {
        let estimate = Self::weighted_mean(&input)?;
        self.logger.record(&format!(
            "{} points -> {:.3} ug/m3",
            input.len(),
            estimate
        ));
        Ok(estimate)
    }
}
