pub mod aggregator;
pub mod aqi;
pub mod correction;
pub mod geo_filter;
pub mod outlier;
pub mod validator;

pub use aggregator::Aggregator;
pub use aqi::{AqiCategory, AqiConverter, AqiIndex};
pub use correction::{CorrectedPoint, CorrectionModel, CorrectionStrategy, PollutantCorrector};
pub use geo_filter::{GeoFilter, SelectedSensor};
pub use outlier::{OutlierDetector, OutlierMethod, OutlierRejector};
pub use validator::{ReadingValidator, ValidatedPoint};
