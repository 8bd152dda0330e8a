//! Core library for the `weather-history` viewer.
//!
//! This crate defines:
//! - Configuration (API key, base URL)
//! - The weatherapi.com history client
//! - The sequential seven-day fetch orchestrator
//! - Shared domain models and screen rendering
//!
//! It is used by `weather-history-cli`, but can also be reused by other front ends.

pub mod config;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod view;

pub use config::Config;
pub use model::{City, FetchStatus, ForecastDay, Parameter, Selection, WeatherSnapshot};
pub use orchestrator::{CycleOutcome, FetchOrchestrator, failure_message, last_seven_days};
pub use provider::{FetchError, HistoryProvider, WeatherApiProvider, provider_from_config};
pub use view::{Line, render};
