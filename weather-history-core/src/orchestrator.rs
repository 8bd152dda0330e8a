//! Sequential seven-day fetch cycles.
//!
//! Each city selection starts a new cycle with a fresh id. The orchestrator is the only
//! writer of [`FetchStatus`]; every write is checked against the current cycle id under
//! the channel's lock, so a superseded cycle can never publish into a newer one.

use chrono::{Days, Local, NaiveDate};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    model::{City, FetchStatus, WeatherSnapshot},
    provider::HistoryProvider,
};

/// Number of days covered by one cycle, today included.
pub const HISTORY_DAYS: u64 = 7;

/// `today` followed by the six days before it.
pub fn last_seven_days(today: NaiveDate) -> Vec<NaiveDate> {
    (0..HISTORY_DAYS).filter_map(|offset| today.checked_sub_days(Days::new(offset))).collect()
}

pub fn failure_message(city: City, date: NaiveDate) -> String {
    format!("Failed to fetch weather data for {city} on {}", date.format("%Y-%m-%d"))
}

/// Result of a cycle that ran to completion without being superseded.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub cycle: u64,
    pub city: City,
    pub snapshot: WeatherSnapshot,
    /// Most recent failure message, if any request failed.
    pub error: Option<String>,
}

impl CycleOutcome {
    fn into_status(self) -> FetchStatus {
        match self.error {
            Some(message) => FetchStatus::Error {
                city: self.city,
                cycle: self.cycle,
                message,
                snapshot: self.snapshot,
            },
            None => {
                FetchStatus::Ready { city: self.city, cycle: self.cycle, snapshot: self.snapshot }
            }
        }
    }
}

#[derive(Debug)]
pub struct FetchOrchestrator<P> {
    provider: Arc<P>,
    current: Arc<AtomicU64>,
    status: Arc<watch::Sender<FetchStatus>>,
    task: Option<JoinHandle<()>>,
}

impl<P: HistoryProvider + 'static> FetchOrchestrator<P> {
    pub fn new(provider: P) -> Self {
        Self::with_shared(Arc::new(provider))
    }

    pub fn with_shared(provider: Arc<P>) -> Self {
        let (tx, _rx) = watch::channel(FetchStatus::Idle);
        Self { provider, current: Arc::new(AtomicU64::new(0)), status: Arc::new(tx), task: None }
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> FetchStatus {
        self.status.borrow().clone()
    }

    /// Start a background cycle for `city` using the local calendar date.
    pub fn start_cycle(&mut self, city: City) -> u64 {
        self.start_cycle_on(city, Local::now().date_naive())
    }

    /// Supersede any running cycle and fetch the seven days ending at `today` in the background.
    ///
    /// `Loading` is already published when this returns. Must be called inside a tokio runtime.
    pub fn start_cycle_on(&mut self, city: City, today: NaiveDate) -> u64 {
        if let Some(previous) = self.task.take() {
            previous.abort();
        }

        let runner = self.begin(city);
        let cycle = runner.cycle;
        self.task = Some(tokio::spawn(async move {
            runner.run(today).await;
        }));
        cycle
    }

    /// Run a whole cycle for `city` on the current task.
    ///
    /// Returns `None` if another cycle was started before this one finished.
    pub async fn run_cycle(&self, city: City, today: NaiveDate) -> Option<CycleOutcome> {
        self.begin(city).run(today).await
    }

    /// Allocate a new cycle id and reset the status to an empty `Loading`.
    fn begin(&self, city: City) -> CycleRunner<P> {
        let mut cycle = 0;
        self.status.send_modify(|slot| {
            cycle = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            *slot = FetchStatus::Loading { city, cycle, partial: WeatherSnapshot::new(city) };
        });

        tracing::info!(%city, cycle, "starting fetch cycle");

        CycleRunner {
            provider: Arc::clone(&self.provider),
            current: Arc::clone(&self.current),
            status: Arc::clone(&self.status),
            cycle,
            city,
        }
    }
}

impl<P> Drop for FetchOrchestrator<P> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct CycleRunner<P> {
    provider: Arc<P>,
    current: Arc<AtomicU64>,
    status: Arc<watch::Sender<FetchStatus>>,
    cycle: u64,
    city: City,
}

impl<P: HistoryProvider> CycleRunner<P> {
    fn is_superseded(&self) -> bool {
        self.current.load(Ordering::SeqCst) != self.cycle
    }

    /// Write `next` only if this is still the current cycle.
    fn publish(&self, next: FetchStatus) -> bool {
        let mine = self.cycle;
        let current = &self.current;
        self.status.send_if_modified(move |slot| {
            if current.load(Ordering::SeqCst) != mine {
                return false;
            }
            *slot = next;
            true
        })
    }

    async fn run(self, today: NaiveDate) -> Option<CycleOutcome> {
        let city = self.city;
        let mut snapshot = WeatherSnapshot::new(city);
        let mut error = None;

        for date in last_seven_days(today) {
            if self.is_superseded() {
                tracing::debug!(%city, cycle = self.cycle, "dropping superseded fetch cycle");
                return None;
            }

            match self.provider.fetch(city, date).await {
                Some(day) => {
                    tracing::debug!(%city, %date, "fetched day");
                    snapshot.insert(date, day);
                    self.publish(FetchStatus::Loading {
                        city,
                        cycle: self.cycle,
                        partial: snapshot.clone(),
                    });
                }
                None => error = Some(failure_message(city, date)),
            }
        }

        let outcome = CycleOutcome { cycle: self.cycle, city, snapshot, error };

        if !self.publish(outcome.clone().into_status()) {
            tracing::debug!(%city, cycle = self.cycle, "dropping superseded fetch cycle");
            return None;
        }

        tracing::info!(
            %city,
            cycle = self.cycle,
            days = outcome.snapshot.len(),
            failed = outcome.error.is_some(),
            "fetch cycle finished"
        );

        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::ForecastDay, provider::FetchError};
    use async_trait::async_trait;
    use chrono::Datelike;
    use std::{
        collections::HashSet,
        sync::{Mutex, atomic::AtomicUsize},
    };
    use tokio::sync::Notify;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Holds the first request for one city until released.
    #[derive(Debug)]
    struct Gate {
        city: City,
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[derive(Debug, Default)]
    struct ScriptedProvider {
        failing: HashSet<NaiveDate>,
        calls: Mutex<Vec<(City, NaiveDate)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        gate: Mutex<Option<Gate>>,
    }

    impl ScriptedProvider {
        fn failing_on(dates: &[NaiveDate]) -> Self {
            Self { failing: dates.iter().copied().collect(), ..Default::default() }
        }

        fn gated(city: City) -> (Self, Arc<Notify>, Arc<Notify>) {
            let started = Arc::new(Notify::new());
            let release = Arc::new(Notify::new());
            let gate = Gate { city, started: Arc::clone(&started), release: Arc::clone(&release) };
            (Self { gate: Mutex::new(Some(gate)), ..Default::default() }, started, release)
        }

        fn calls(&self) -> Vec<(City, NaiveDate)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HistoryProvider for ScriptedProvider {
        async fn fetch_day(&self, city: City, date: NaiveDate) -> Result<ForecastDay, FetchError> {
            self.calls.lock().unwrap().push((city, date));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let gate = {
                let mut slot = self.gate.lock().unwrap();
                if slot.as_ref().is_some_and(|g| g.city == city) { slot.take() } else { None }
            };
            if let Some(gate) = gate {
                gate.started.notify_one();
                gate.release.notified().await;
            }
            tokio::task::yield_now().await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&date) {
                return Err(FetchError::EmptyForecast);
            }
            Ok(ForecastDay {
                date,
                condition: format!("{city} on {date}"),
                avg_temp_c: f64::from(date.day()),
                avg_humidity: 60.0,
                total_precip_mm: 0.0,
            })
        }
    }

    #[test]
    fn seven_days_descending_from_today() {
        let days = last_seven_days(ymd(2025, 3, 2));

        assert_eq!(days.len(), 7);
        assert_eq!(days[0], ymd(2025, 3, 2));
        assert_eq!(days[1], ymd(2025, 3, 1));
        assert_eq!(days[2], ymd(2025, 2, 28));
        assert_eq!(days[6], ymd(2025, 2, 24));
    }

    #[test]
    fn seven_days_cross_year_boundary() {
        let days = last_seven_days(ymd(2025, 1, 3));
        assert_eq!(days[6], ymd(2024, 12, 28));
    }

    #[test]
    fn failure_message_names_city_and_date() {
        assert_eq!(
            failure_message(City::Odesa, ymd(2025, 5, 9)),
            "Failed to fetch weather data for Odesa on 2025-05-09"
        );
    }

    #[tokio::test]
    async fn all_successes_produce_ready_with_seven_sorted_days() {
        let today = ymd(2025, 5, 11);
        let orch = FetchOrchestrator::new(ScriptedProvider::default());

        let outcome = orch.run_cycle(City::Lviv, today).await.expect("cycle is current");

        assert!(outcome.error.is_none());
        let dates: Vec<NaiveDate> = outcome.snapshot.iter_sorted().map(|(d, _)| *d).collect();
        let mut expected = last_seven_days(today);
        expected.reverse();
        assert_eq!(dates, expected);

        match orch.status() {
            FetchStatus::Ready { city, snapshot, .. } => {
                assert_eq!(city, City::Lviv);
                assert_eq!(snapshot.len(), 7);
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_failure_yields_error_naming_city_and_date() {
        let today = ymd(2025, 5, 11);
        let bad = ymd(2025, 5, 8);
        let orch = FetchOrchestrator::new(ScriptedProvider::failing_on(&[bad]));

        let outcome = orch.run_cycle(City::Rivne, today).await.unwrap();

        assert_eq!(outcome.snapshot.len(), 6);
        assert!(outcome.snapshot.iter_sorted().all(|(date, _)| *date != bad));
        match orch.status() {
            FetchStatus::Error { message, .. } => {
                assert_eq!(message, "Failed to fetch weather data for Rivne on 2025-05-08");
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn latest_failure_wins_and_remaining_requests_still_run() {
        let today = ymd(2025, 5, 11);
        let provider = Arc::new(ScriptedProvider::failing_on(&[ymd(2025, 5, 10), ymd(2025, 5, 6)]));
        let orch = FetchOrchestrator::with_shared(Arc::clone(&provider));

        let outcome = orch.run_cycle(City::Sumy, today).await.unwrap();

        assert_eq!(provider.calls().len(), 7);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Failed to fetch weather data for Sumy on 2025-05-06")
        );
    }

    #[tokio::test]
    async fn requests_are_strictly_sequential() {
        let provider = Arc::new(ScriptedProvider::default());
        let orch = FetchOrchestrator::with_shared(Arc::clone(&provider));

        orch.run_cycle(City::Kyiv, ymd(2025, 5, 11)).await.unwrap();

        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 1);
        let dates: Vec<NaiveDate> = provider.calls().into_iter().map(|(_, d)| d).collect();
        assert_eq!(dates, last_seven_days(ymd(2025, 5, 11)));
    }

    #[tokio::test]
    async fn start_cycle_publishes_empty_loading_before_first_request() {
        let (provider, _started, release) = ScriptedProvider::gated(City::Odesa);
        let mut orch = FetchOrchestrator::new(provider);

        let cycle = orch.start_cycle_on(City::Odesa, ymd(2025, 5, 11));

        match orch.status() {
            FetchStatus::Loading { city, cycle: c, partial } => {
                assert_eq!(city, City::Odesa);
                assert_eq!(c, cycle);
                assert!(partial.is_empty());
            }
            other => panic!("expected Loading, got {other:?}"),
        }

        release.notify_one();
        let mut rx = orch.subscribe();
        let done = rx.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        assert_eq!(done.cycle(), Some(cycle));
    }

    #[tokio::test]
    async fn superseded_cycle_never_publishes() {
        let today = ymd(2025, 5, 11);
        let (provider, started, release) = ScriptedProvider::gated(City::Lviv);
        let orch = FetchOrchestrator::new(provider);

        let stale = orch.run_cycle(City::Lviv, today);
        let fresh = async {
            started.notified().await;
            let outcome = orch.run_cycle(City::Kyiv, today).await;
            release.notify_one();
            outcome
        };
        let (stale, fresh) = tokio::join!(stale, fresh);

        assert!(stale.is_none());
        let fresh = fresh.expect("newest cycle completes");
        assert_eq!(fresh.city, City::Kyiv);

        match orch.status() {
            FetchStatus::Ready { city, snapshot, .. } => {
                assert_eq!(city, City::Kyiv);
                assert_eq!(snapshot.len(), 7);
                assert!(snapshot.iter_sorted().all(|(_, d)| d.condition.starts_with("Kyiv")));
            }
            other => panic!("expected Ready for Kyiv, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn switching_city_mid_cycle_shows_only_new_city() {
        let today = ymd(2025, 5, 11);
        let (provider, started, release) = ScriptedProvider::gated(City::Lviv);
        let mut orch = FetchOrchestrator::new(provider);
        let mut rx = orch.subscribe();

        orch.start_cycle_on(City::Lviv, today);
        started.notified().await;
        let newest = orch.start_cycle_on(City::Kharkiv, today);
        release.notify_one();

        let done = rx.wait_for(|s| s.is_terminal()).await.unwrap().clone();
        assert_eq!(done.cycle(), Some(newest));
        match done {
            FetchStatus::Ready { city, snapshot, .. } => {
                assert_eq!(city, City::Kharkiv);
                assert!(snapshot.iter_sorted().all(|(_, d)| d.condition.starts_with("Kharkiv")));
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }
}
