use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;

use crate::{
    Config,
    model::{City, ForecastDay},
};

pub mod weatherapi;

pub use weatherapi::WeatherApiProvider;

/// Why a single day could not be fetched.
///
/// Callers going through [`HistoryProvider::fetch`] never see this; it only reaches the log.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server answered with status {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },

    #[error("malformed response body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("response contained no forecastday data")]
    EmptyForecast,

    #[error("response date '{0}' is not yyyy-MM-dd")]
    InvalidDate(String),
}

#[async_trait]
pub trait HistoryProvider: Send + Sync + Debug {
    /// Fetch the summary for `city` on `date`, reporting why it failed.
    async fn fetch_day(&self, city: City, date: NaiveDate) -> Result<ForecastDay, FetchError>;

    /// Fetch the summary for `city` on `date`. Every failure collapses to `None`.
    ///
    /// The reason is only logged at debug level; the screen already shows the failure.
    async fn fetch(&self, city: City, date: NaiveDate) -> Option<ForecastDay> {
        match self.fetch_day(city, date).await {
            Ok(day) => Some(day),
            Err(err) => {
                tracing::debug!(%city, %date, error = %err, "weather fetch failed");
                None
            }
        }
    }
}

/// Construct the weatherapi.com provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<WeatherApiProvider> {
    let api_key = config.require_api_key()?;
    Ok(WeatherApiProvider::new(api_key.to_owned(), &config.base_url))
}
