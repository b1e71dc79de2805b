use crate::math::stats::StatsHelper;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

enum IsolationNode {
    Leaf {
        size: usize,
    },
    Split {
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
}

impl IsolationNode {
    fn build(values: &mut [f64], depth: usize, depth_limit: usize, rng: &mut StdRng) -> Self {
        if depth >= depth_limit || values.len() <= 1 {
            return IsolationNode::Leaf { size: values.len() };
        }

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if min >= max {
            return IsolationNode::Leaf { size: values.len() };
        }

        // threshold lies in [min, max) so both sides keep at least one value
        let threshold = rng.gen_range(min..max);
        let mut boundary = 0;
        for idx in 0..values.len() {
            if values[idx] <= threshold {
                values.swap(idx, boundary);
                boundary += 1;
            }
        }
        let (left, right) = values.split_at_mut(boundary);

        IsolationNode::Split {
            threshold,
            left: Box::new(Self::build(left, depth + 1, depth_limit, rng)),
            right: Box::new(Self::build(right, depth + 1, depth_limit, rng)),
        }
    }

    fn path_length(&self, value: f64) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                IsolationNode::Leaf { size } => {
                    return depth + StatsHelper::average_path_length(*size);
                }
                IsolationNode::Split {
                    threshold,
                    left,
                    right,
                } => {
                    depth += 1.0;
                    node = if value <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// One-dimensional isolation forest.
///
/// Values that are separated from the rest in few random splits receive
/// scores close to 1; inliers stay near or below 0.5.
pub struct IsolationForest {
    trees: usize,
    max_samples: usize,
    seed: u64,
}

impl IsolationForest {
    pub const DEFAULT_TREES: usize = 100;
    pub const DEFAULT_MAX_SAMPLES: usize = 256;

    pub fn new(trees: usize, max_samples: usize, seed: u64) -> Self {
        Self {
            trees: trees.max(1),
            max_samples: max_samples.max(2),
            seed,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(Self::DEFAULT_TREES, Self::DEFAULT_MAX_SAMPLES, seed)
    }

    /// Anomaly score for every value. Each call reseeds, so identical input
    /// always produces identical scores.
    pub fn score(&self, values: &[f64]) -> Vec<f64> {
        if values.len() < 2 {
            return vec![0.0; values.len()];
        }

        let sample_size = self.max_samples.min(values.len());
        let depth_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;
        let normaliser = StatsHelper::average_path_length(sample_size);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let forest: Vec<IsolationNode> = (0..self.trees)
            .map(|_| {
                let mut sample: Vec<f64> =
                    rand::seq::index::sample(&mut rng, values.len(), sample_size)
                        .into_iter()
                        .map(|idx| values[idx])
                        .collect();
                IsolationNode::build(&mut sample, 0, depth_limit, &mut rng)
            })
            .collect();

        values
            .iter()
            .map(|&value| {
                let mean_path = forest
                    .iter()
                    .map(|tree| tree.path_length(value))
                    .sum::<f64>()
                    / forest.len() as f64;
                2f64.powf(-mean_path / normaliser)
            })
            .collect()
    }
}
