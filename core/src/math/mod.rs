pub mod geo;
pub mod isolation;
pub mod stats;

pub use geo::GeoHelper;
pub use isolation::IsolationForest;
pub use stats::StatsHelper;
