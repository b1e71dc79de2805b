use crate::source::SensorSource;
use aqicore::processing::SelectedSensor;
use aqicore::sensor_interface::{SensorDirectory, SensorReading};
use aqicore::{FetchError, PrefetchedReadings};
use anyhow::Context;
use log::{debug, warn};
use std::time::Duration;
use tokio::runtime::{Builder as TokioBuilder, Runtime};
use tokio::task::JoinSet;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the legacy PurpleAir JSON endpoint.
pub struct PurpleAirClient {
    http: reqwest::Client,
    endpoint: String,
    runtime: Runtime,
}

impl PurpleAirClient {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let runtime = TokioBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("creating runtime for sensor retrieval")?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("purple/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            runtime,
        })
    }

    pub fn sensor_url(&self, sensor_id: u64) -> String {
        format!("{}?show={}", self.endpoint, sensor_id)
    }
}

async fn fetch_text(http: &reqwest::Client, url: &str) -> reqwest::Result<String> {
    http.get(url).send().await?.error_for_status()?.text().await
}

async fn fetch_reading(
    http: reqwest::Client,
    url: String,
    id: u64,
) -> Result<SensorReading, FetchError> {
    let text = fetch_text(&http, &url)
        .await
        .map_err(|err| FetchError::Transport {
            id,
            message: err.to_string(),
        })?;
    SensorReading::from_json(&text).map_err(|source| FetchError::Malformed { id, source })
}

impl SensorSource for PurpleAirClient {
    fn directory(&self) -> anyhow::Result<SensorDirectory> {
        debug!("fetching sensor directory from {}", self.endpoint);
        let text = self
            .runtime
            .block_on(fetch_text(&self.http, &self.endpoint))
            .with_context(|| format!("fetching sensor directory from {}", self.endpoint))?;
        let directory = SensorDirectory::from_json(&text)?;
        debug!("loaded {} sensors", directory.len());
        Ok(directory)
    }

    fn readings(&self, sensors: &[SelectedSensor]) -> PrefetchedReadings {
        self.runtime.block_on(async {
            let mut tasks = JoinSet::new();
            for sensor in sensors {
                let http = self.http.clone();
                let url = self.sensor_url(sensor.id);
                let id = sensor.id;
                tasks.spawn(async move { (id, fetch_reading(http, url, id).await) });
            }

            let mut readings = PrefetchedReadings::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((id, reading)) => readings.insert(id, reading),
                    Err(err) => warn!("sensor fetch task aborted: {}", err),
                }
            }
            readings
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqicore::ReadingFetcher;

    #[test]
    fn sensor_url_uses_show_parameter() {
        let client = PurpleAirClient::new("https://example.invalid/json").unwrap();
        assert_eq!(
            client.sensor_url(14633),
            "https://example.invalid/json?show=14633"
        );
    }

    #[test]
    fn unreachable_sensor_becomes_transport_error() {
        let client = PurpleAirClient::new("http://127.0.0.1:9/json").unwrap();
        let mut readings = client.readings(&[SelectedSensor {
            id: 3,
            distance: 1.0,
        }]);
        assert_eq!(readings.len(), 1);
        assert!(matches!(
            readings.fetch(3),
            Err(FetchError::Transport { id: 3, .. })
        ));
    }
}
