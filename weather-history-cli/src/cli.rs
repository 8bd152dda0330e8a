use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use weather_history_core::{
    City, Config, FetchOrchestrator, Parameter, Selection, provider_from_config,
};

use crate::interactive;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-history", version, about = "Last seven days of weather for a city")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the weatherapi.com API key (and optionally a custom base URL).
    Configure,

    /// Open the interactive viewer (the default).
    Run {
        /// City to show first, e.g. "Lviv" or "Kharkiv".
        #[arg(long, value_parser = parse_city)]
        city: Option<City>,

        /// Parameter to show first: temperature, humidity or precipitation.
        #[arg(long, value_parser = parse_parameter)]
        parameter: Option<Parameter>,
    },
}

fn parse_city(value: &str) -> Result<City, String> {
    value.parse().map_err(|e: anyhow::Error| e.to_string())
}

fn parse_parameter(value: &str) -> Result<Parameter, String> {
    value.parse().map_err(|e: anyhow::Error| e.to_string())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Some(Command::Configure) => configure(),
            Some(Command::Run { city, parameter }) => {
                let selection = Selection {
                    city: city.unwrap_or_default(),
                    parameter: parameter.unwrap_or_default(),
                };
                run_viewer(selection).await
            }
            None => run_viewer(Selection::default()).await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = Config::load()?;

    let api_key = Password::new("weatherapi.com API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    cfg.set_api_key(api_key.trim().to_string());

    let base_url = Text::new("API base URL:")
        .with_default(&cfg.base_url)
        .prompt()
        .context("Failed to read base URL")?;
    cfg.base_url = base_url.trim().to_string();

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}

async fn run_viewer(selection: Selection) -> anyhow::Result<()> {
    let cfg = Config::load()?.with_env_overrides();
    let provider = provider_from_config(&cfg)?;

    let orchestrator = FetchOrchestrator::new(provider);
    interactive::run(orchestrator, selection).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_opens_viewer() {
        let cli = Cli::try_parse_from(["weather-history"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn run_accepts_city_and_parameter() {
        let cli = Cli::try_parse_from([
            "weather-history",
            "run",
            "--city",
            "odesa",
            "--parameter",
            "humidity",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Run { city, parameter }) => {
                assert_eq!(city, Some(City::Odesa));
                assert_eq!(parameter, Some(Parameter::Humidity));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_rejects_unknown_city() {
        let err = Cli::try_parse_from(["weather-history", "run", "--city", "Paris"]).unwrap_err();
        assert!(err.to_string().contains("Unknown city"));
    }
}
