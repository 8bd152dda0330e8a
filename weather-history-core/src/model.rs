use chrono::NaiveDate;
use std::{collections::BTreeMap, fmt, str::FromStr};

/// One day's aggregated weather summary for a city.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub condition: String,
    pub avg_temp_c: f64,
    pub avg_humidity: f64,
    pub total_precip_mm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum City {
    #[default]
    Lviv,
    Kyiv,
    Donetsk,
    Odesa,
    Rivne,
    Sumy,
    Kharkiv,
}

impl City {
    pub fn as_str(&self) -> &'static str {
        match self {
            City::Lviv => "Lviv",
            City::Kyiv => "Kyiv",
            City::Donetsk => "Donetsk",
            City::Odesa => "Odesa",
            City::Rivne => "Rivne",
            City::Sumy => "Sumy",
            City::Kharkiv => "Kharkiv",
        }
    }

    pub const fn all() -> &'static [City] {
        &[
            City::Lviv,
            City::Kyiv,
            City::Donetsk,
            City::Odesa,
            City::Rivne,
            City::Sumy,
            City::Kharkiv,
        ]
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for City {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        City::all()
            .iter()
            .copied()
            .find(|city| city.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                let names: Vec<&str> = City::all().iter().map(City::as_str).collect();
                anyhow::anyhow!("Unknown city '{value}'. Supported cities: {}.", names.join(", "))
            })
    }
}

/// Which measurement a forecast card shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Parameter {
    #[default]
    Temperature,
    Humidity,
    Precipitation,
}

impl Parameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Temperature => "Temperature",
            Parameter::Humidity => "Humidity",
            Parameter::Precipitation => "Precipitation",
        }
    }

    pub const fn all() -> &'static [Parameter] {
        &[Parameter::Temperature, Parameter::Humidity, Parameter::Precipitation]
    }

    /// Caption shown in front of the value on a forecast card.
    pub fn label(&self) -> &'static str {
        match self {
            Parameter::Temperature => "Avg Temp",
            Parameter::Humidity => "Humidity",
            Parameter::Precipitation => "Precipitation",
        }
    }

    pub fn value_of(&self, day: &ForecastDay) -> f64 {
        match self {
            Parameter::Temperature => day.avg_temp_c,
            Parameter::Humidity => day.avg_humidity,
            Parameter::Precipitation => day.total_precip_mm,
        }
    }

    /// Value with its unit suffix, e.g. `"12.5 °C"`, `"80.0%"`, `"0.4 mm"`.
    ///
    /// Whole numbers keep their `.0`, the way the API reports them.
    pub fn format_value(&self, day: &ForecastDay) -> String {
        let value = self.value_of(day);
        match self {
            Parameter::Temperature => format!("{value:?} °C"),
            Parameter::Humidity => format!("{value:?}%"),
            Parameter::Precipitation => format!("{value:?} mm"),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parameter {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Parameter::all()
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown parameter '{value}'. \
                     Supported parameters: temperature, humidity, precipitation."
                )
            })
    }
}

/// Date-keyed results of one fetch cycle for a single city.
///
/// Keys are the exact dates that were requested, so iteration is ascending by date.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    city: City,
    days: BTreeMap<NaiveDate, ForecastDay>,
}

impl WeatherSnapshot {
    pub fn new(city: City) -> Self {
        Self { city, days: BTreeMap::new() }
    }

    pub fn city(&self) -> City {
        self.city
    }

    /// Insert the forecast for `date`, replacing any previous entry for that date.
    pub fn insert(&mut self, date: NaiveDate, day: ForecastDay) {
        self.days.insert(date, day);
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn iter_sorted(&self) -> impl Iterator<Item = (&NaiveDate, &ForecastDay)> {
        self.days.iter()
    }
}

/// What the user has picked. Owned by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub city: City,
    pub parameter: Parameter,
}

/// Observable state of the current fetch cycle.
///
/// Written only by the orchestrator, so `Loading` and `Error` can never be set at once.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchStatus {
    /// No cycle has been started yet.
    #[default]
    Idle,
    Loading { city: City, cycle: u64, partial: WeatherSnapshot },
    /// At least one request failed. `message` is the most recent failure.
    Error { city: City, cycle: u64, message: String, snapshot: WeatherSnapshot },
    Ready { city: City, cycle: u64, snapshot: WeatherSnapshot },
}

impl FetchStatus {
    /// `true` once a cycle has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchStatus::Error { .. } | FetchStatus::Ready { .. })
    }

    pub fn cycle(&self) -> Option<u64> {
        match self {
            FetchStatus::Idle => None,
            FetchStatus::Loading { cycle, .. }
            | FetchStatus::Error { cycle, .. }
            | FetchStatus::Ready { cycle, .. } => Some(*cycle),
        }
    }
}
