//! Where sensor data comes from: the PurpleAir HTTP API or a synthetic network.

pub mod purpleair;

pub use purpleair::PurpleAirClient;

use aqicore::processing::SelectedSensor;
use aqicore::sensor_interface::SensorDirectory;
use aqicore::PrefetchedReadings;

pub trait SensorSource {
    fn directory(&self) -> anyhow::Result<SensorDirectory>;

    /// Latest readings for every selected sensor. A failure for one
    /// sensor is recorded against that sensor only.
    fn readings(&self, sensors: &[SelectedSensor]) -> PrefetchedReadings;
}
