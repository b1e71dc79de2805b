use serde::Serialize;
use std::sync::Mutex;

/// Counters describing what one estimation run kept and discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub directory_size: usize,
    pub sensors_selected: usize,
    pub fetch_failures: usize,
    pub readings_rejected: usize,
    pub outliers_dropped: usize,
    pub points_aggregated: usize,
}

pub struct MetricsRecorder {
    inner: Mutex<PipelineStats>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PipelineStats::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut PipelineStats)) {
        if let Ok(mut stats) = self.inner.lock() {
            apply(&mut stats);
        }
    }

    pub fn reset(&self) {
        self.update(|s| *s = PipelineStats::default());
    }

    /// Clears the per-estimate counters, keeping directory and selection sizes.
    pub fn reset_counts(&self) {
        self.update(|s| {
            *s = PipelineStats {
                directory_size: s.directory_size,
                sensors_selected: s.sensors_selected,
                ..Default::default()
            }
        });
    }

    pub fn record_directory(&self, size: usize) {
        self.update(|s| s.directory_size = size);
    }

    pub fn record_selected(&self, count: usize) {
        self.update(|s| s.sensors_selected = count);
    }

    pub fn record_fetch_failure(&self) {
        self.update(|s| s.fetch_failures += 1);
    }

    pub fn record_rejected(&self) {
        self.update(|s| s.readings_rejected += 1);
    }

    pub fn record_outliers(&self, count: usize) {
        self.update(|s| s.outliers_dropped += count);
    }

    pub fn record_aggregated(&self, count: usize) {
        self.update(|s| s.points_aggregated = count);
    }

    pub fn snapshot(&self) -> PipelineStats {
        if let Ok(stats) = self.inner.lock() {
            *stats
        } else {
            PipelineStats::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
