//! Measurement-aggregation core for community PM2.5 sensor networks.
//!
//! Sensors near a target are selected by great-circle distance, their
//! dual-channel readings are screened, statistically anomalous values
//! are dropped, the rest are humidity-corrected and combined with
//! proximity weights, and the result is mapped onto the EPA AQI scale.

pub mod cache;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod sensor_interface;
pub mod telemetry;

pub use pipeline::{estimate_aqi, AqiEstimate, Pipeline, PrefetchedReadings, ReadingFetcher};
pub use prelude::{
    Coordinate, EstimateError, EstimateResult, EstimatorConfig, FetchError, ProcessingStage,
};
