use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use crate::model::{City, ForecastDay};

use super::{FetchError, HistoryProvider};

/// Client for the weatherapi.com `history.json` endpoint.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String, base_url: &str) -> Self {
        Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), http: Client::new() }
    }

    pub fn history_url(&self) -> String {
        format!("{}/history.json", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    avgtemp_c: f64,
    totalprecip_mm: f64,
    avghumidity: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: String,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaHistoryResponse {
    forecast: WaForecast,
}

impl WaForecastDay {
    fn into_forecast_day(self) -> Result<ForecastDay, FetchError> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|_| FetchError::InvalidDate(self.date.clone()))?;

        Ok(ForecastDay {
            date,
            condition: self.day.condition.text,
            avg_temp_c: self.day.avgtemp_c,
            avg_humidity: self.day.avghumidity,
            total_precip_mm: self.day.totalprecip_mm,
        })
    }
}

#[async_trait]
impl HistoryProvider for WeatherApiProvider {
    async fn fetch_day(&self, city: City, date: NaiveDate) -> Result<ForecastDay, FetchError> {
        let dt = date.format("%Y-%m-%d").to_string();

        tracing::debug!(%city, date = %dt, "requesting history");

        let res = self
            .http
            .get(self.history_url())
            .query(&[("key", self.api_key.as_str()), ("q", city.as_str()), ("dt", dt.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status { status, body: truncate_body(&body) });
        }

        let parsed: WaHistoryResponse = serde_json::from_str(&body)?;

        let day = parsed.forecast.forecastday.into_iter().next().ok_or(FetchError::EmptyForecast)?;

        day.into_forecast_day()
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
