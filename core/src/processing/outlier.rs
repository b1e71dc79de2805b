use crate::math::isolation::IsolationForest;
use crate::math::stats::StatsHelper;
use crate::prelude::{EstimateResult, EstimatorConfig, ProcessingStage};
use crate::processing::validator::ValidatedPoint;
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Detector failures. Always recovered by skipping rejection.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OutlierError {
    #[error("need at least {required} values, got {actual}")]
    TooFewSamples { required: usize, actual: usize },
    #[error("contamination {0} outside (0, 0.5]")]
    InvalidContamination(f64),
    #[error("non-finite value at index {0}")]
    NonFiniteValue(usize),
}

/// Finds the indices of anomalous values in a batch.
pub trait OutlierDetector {
    fn detect(
        &mut self,
        values: &[f64],
        contamination: f64,
    ) -> Result<BTreeSet<usize>, OutlierError>;
}

fn check_input(values: &[f64], contamination: f64) -> Result<(), OutlierError> {
    if !(contamination > 0.0 && contamination <= 0.5) {
        return Err(OutlierError::InvalidContamination(contamination));
    }
    if values.len() < 2 {
        return Err(OutlierError::TooFewSamples {
            required: 2,
            actual: values.len(),
        });
    }
    if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
        return Err(OutlierError::NonFiniteValue(idx));
    }
    Ok(())
}

/// Isolation-forest detector. The decision threshold sits at the
/// `contamination` quantile of the score distribution.
pub struct IsolationForestDetector {
    forest: IsolationForest,
}

impl IsolationForestDetector {
    pub fn new(seed: u64) -> Self {
        Self {
            forest: IsolationForest::with_seed(seed),
        }
    }
}

impl OutlierDetector for IsolationForestDetector {
    fn detect(
        &mut self,
        values: &[f64],
        contamination: f64,
    ) -> Result<BTreeSet<usize>, OutlierError> {
        check_input(values, contamination)?;

        // negated so that lower means more anomalous
        let normality: Vec<f64> = self.forest.score(values).iter().map(|s| -s).collect();
        let offset = StatsHelper::percentile(&normality, contamination * 100.0).ok_or(
            OutlierError::TooFewSamples {
                required: 2,
                actual: 0,
            },
        )?;

        Ok(normality
            .iter()
            .enumerate()
            .filter(|(_, &n)| n < offset)
            .map(|(idx, _)| idx)
            .collect())
    }
}

/// Median/MAD detector (Iglewicz and Hoaglin modified z-score).
pub struct ModifiedZScoreDetector {
    threshold: f64,
}

impl ModifiedZScoreDetector {
    pub const DEFAULT_THRESHOLD: f64 = 3.5;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for ModifiedZScoreDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl OutlierDetector for ModifiedZScoreDetector {
    fn detect(
        &mut self,
        values: &[f64],
        contamination: f64,
    ) -> Result<BTreeSet<usize>, OutlierError> {
        check_input(values, contamination)?;

        let median = StatsHelper::median(values).unwrap_or(0.0);
        let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
        let mad = StatsHelper::median(&deviations).unwrap_or(0.0);
        let mean_ad = deviations.iter().sum::<f64>() / deviations.len() as f64;

        let scale = if mad > 0.0 {
            mad / 0.6745
        } else if mean_ad > 0.0 {
            mean_ad * 1.253314
        } else {
            return Ok(BTreeSet::new());
        };

        let mut flagged: Vec<(usize, f64)> = deviations
            .iter()
            .map(|d| d / scale)
            .enumerate()
            .filter(|(_, score)| *score > self.threshold)
            .collect();
        flagged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let cap = (contamination * values.len() as f64).ceil().max(1.0) as usize;
        Ok(flagged.into_iter().take(cap).map(|(idx, _)| idx).collect())
    }
}

/// Outlier detection algorithm selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutlierMethod {
    IsolationForest,
    ModifiedZScore,
}

impl OutlierMethod {
    pub fn detector(self, seed: u64) -> Box<dyn OutlierDetector> {
        match self {
            OutlierMethod::IsolationForest => Box::new(IsolationForestDetector::new(seed)),
            OutlierMethod::ModifiedZScore => Box::new(ModifiedZScoreDetector::default()),
        }
    }
}

/// Drops anomalous raw values from the pooled batch. Never fails: small
/// batches, detector errors and "everything is an outlier" verdicts all
/// leave the batch untouched.
pub struct OutlierRejector {
    detector: Box<dyn OutlierDetector>,
    contamination: f64,
    min_samples: usize,
    logger: LogManager,
}

impl OutlierRejector {
    pub fn new(detector: Box<dyn OutlierDetector>, contamination: f64, min_samples: usize) -> Self {
        Self {
            detector,
            contamination,
            min_samples,
            logger: LogManager::new("outlier_rejector"),
        }
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::new(
            config.outlier_method.detector(config.detector_seed),
            config.contamination,
            config.outlier_min_samples,
        )
    }
}

impl ProcessingStage for OutlierRejector {
    type Input = Vec<ValidatedPoint>;
    type Output = Vec<ValidatedPoint>;

    fn name(&self) -> &'static str {
        "outlier_rejector"
    }

    fn execute(&mut self, input: Self::Input) -> EstimateResult<Self::Output> {
        if input.len() < self.min_samples {
            self.logger.detail(&format!(
                "{} points below minimum of {}, skipping",
                input.len(),
                self.min_samples
            ));
            return Ok(input);
        }

        let values: Vec<f64> = input.iter().map(|p| p.pm25_raw).collect();
        let outliers = match self.detector.detect(&values, self.contamination) {
            Ok(outliers) => outliers,
            Err(err) => {
                self.logger
                    .warn(&format!("detector failed, keeping all points: {}", err));
                return Ok(input);
            }
        };

        if outliers.len() >= input.len() {
            self.logger
                .warn("detector flagged every point, keeping all points");
            return Ok(input);
        }
        if !outliers.is_empty() {
            let dropped: Vec<f64> = outliers.iter().map(|&idx| values[idx]).collect();
            self.logger.record(&format!(
                "dropping {} outlier(s): {:?}",
                outliers.len(),
                dropped
            ));
        }

        Ok(input
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !outliers.contains(idx))
            .map(|(_, point)| point)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_with_spike() -> Vec<f64> {
        let mut values: Vec<f64> = (0..99).map(|i| 10.0 + (i % 10) as f64 * 0.05).collect();
        values.push(1000.0);
        values
    }

    fn points(values: &[f64]) -> Vec<ValidatedPoint> {
        values
            .iter()
            .map(|&pm25_raw| ValidatedPoint {
                pm25_raw,
                weight: 1.0,
                humidity: 50.0,
            })
            .collect()
    }

    #[test]
    fn isolation_forest_flags_only_the_spike() {
        let values = clustered_with_spike();
        let flagged = IsolationForestDetector::new(42)
            .detect(&values, 0.01)
            .unwrap();
        assert_eq!(flagged.into_iter().collect::<Vec<_>>(), vec![99]);
    }

    #[test]
    fn modified_z_score_flags_only_the_spike() {
        let values = clustered_with_spike();
        let flagged = ModifiedZScoreDetector::default()
            .detect(&values, 0.01)
            .unwrap();
        assert_eq!(flagged.into_iter().collect::<Vec<_>>(), vec![99]);
    }

    #[test]
    fn detectors_reject_bad_input() {
        let mut detector = IsolationForestDetector::new(1);
        assert!(matches!(
            detector.detect(&[1.0], 0.01),
            Err(OutlierError::TooFewSamples { .. })
        ));
        assert!(matches!(
            detector.detect(&[1.0, 2.0], 0.9),
            Err(OutlierError::InvalidContamination(_))
        ));
        assert!(matches!(
            detector.detect(&[1.0, f64::NAN], 0.1),
            Err(OutlierError::NonFiniteValue(1))
        ));
    }

    #[test]
    fn rejector_drops_spike_before_correction() {
        let mut rejector = OutlierRejector::from_config(&EstimatorConfig::default());
        let kept = rejector.execute(points(&clustered_with_spike())).unwrap();
        assert_eq!(kept.len(), 99);
        assert!(kept.iter().all(|p| p.pm25_raw < 20.0));
    }

    #[test]
    fn rejector_bypasses_small_batches() {
        let mut rejector = OutlierRejector::from_config(&EstimatorConfig::default());
        let input = points(&[10.0, 11.0, 900.0]);
        assert_eq!(rejector.execute(input.clone()).unwrap(), input);
        assert!(rejector.execute(Vec::new()).unwrap().is_empty());
    }

    struct FlagEverything;

    impl OutlierDetector for FlagEverything {
        fn detect(&mut self, values: &[f64], _: f64) -> Result<BTreeSet<usize>, OutlierError> {
            Ok((0..values.len()).collect())
        }
    }

    struct AlwaysFails;

    impl OutlierDetector for AlwaysFails {
        fn detect(&mut self, values: &[f64], _: f64) -> Result<BTreeSet<usize>, OutlierError> {
            Err(OutlierError::TooFewSamples {
                required: 1000,
                actual: values.len(),
            })
        }
    }

    #[test]
    fn rejector_keeps_batch_when_detector_misbehaves() {
        let input = points(&[1.0, 2.0, 3.0]);

        let mut everything = OutlierRejector::new(Box::new(FlagEverything), 0.01, 0);
        assert_eq!(everything.execute(input.clone()).unwrap(), input);

        let mut failing = OutlierRejector::new(Box::new(AlwaysFails), 0.01, 0);
        assert_eq!(failing.execute(input.clone()).unwrap(), input);
    }
}
