use std::cmp::Ordering;

/// Euler-Mascheroni constant, used to approximate harmonic numbers.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

pub struct StatsHelper;

impl StatsHelper {
    pub fn median(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    /// Percentile with linear interpolation between closest ranks, `q` in [0, 100].
    pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
    }

    /// Average path length of an unsuccessful binary-search-tree lookup over `n` items.
    pub fn average_path_length(n: usize) -> f64 {
        match n {
            0 | 1 => 0.0,
            2 => 1.0,
            _ => {
                let n = n as f64;
                2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(StatsHelper::median(&[]), None);
        assert_eq!(StatsHelper::median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(StatsHelper::median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(StatsHelper::percentile(&values, 0.0), Some(1.0));
        assert_eq!(StatsHelper::percentile(&values, 100.0), Some(5.0));
        assert_eq!(StatsHelper::percentile(&values, 50.0), Some(3.0));
        assert_eq!(StatsHelper::percentile(&values, 12.5), Some(1.5));
    }

    #[test]
    fn average_path_length_small_cases() {
        assert_eq!(StatsHelper::average_path_length(1), 0.0);
        assert_eq!(StatsHelper::average_path_length(2), 1.0);
        assert!(StatsHelper::average_path_length(256) > 9.0);
    }
}
