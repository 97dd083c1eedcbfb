//! Notification request supervisor.
//!
//! The single owner of running drivers. Each outstanding request gets one
//! tokio task that runs a [`PollingDriver`] and delivers its message through
//! a [`NotificationSink`]. A driver that errors or panics is restarted after
//! a delay, up to a bounded number of times, so a half-finished poll never
//! silently disappears. Cancellation is signalled through a `watch` channel
//! and takes effect at the driver's next tick boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::discovery::Coordinates;
use crate::notifier::driver::PollingDriver;
use crate::notifier::sink::NotificationSink;

/// A user's request to be told about appointments near a zip code.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub user_id: u64,
    pub channel_id: u64,
    pub zip_code: String,
    pub coordinates: Coordinates,
}

impl NotificationRequest {
    pub fn key(&self) -> RequestKey {
        RequestKey {
            user_id: self.user_id,
            zip_code: self.zip_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub user_id: u64,
    pub zip_code: String,
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("User {user_id} already has an outstanding notification request (zip code {zip_code})")]
    AlreadyWatching { user_id: u64, zip_code: String },
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Restarts allowed after the first run fails.
    pub max_restarts: u32,
    pub restart_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 4,
            restart_delay: Duration::from_secs(10),
        }
    }
}

/// How a watcher task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Delivered,
    /// Found appointments but the sink rejected the message.
    Undelivered,
    Cancelled,
    /// Restart budget exhausted.
    GaveUp,
}

impl WatchOutcome {
    /// Why the request ended without reaching the user, if it did.
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            Self::Delivered | Self::Cancelled => None,
            Self::Undelivered => Some("found appointments but the notification could not be delivered"),
            Self::GaveUp => Some("gave up watching after repeated failures"),
        }
    }
}

struct Watcher {
    request: NotificationRequest,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<WatchOutcome>,
}

pub struct Supervisor {
    driver: Arc<PollingDriver>,
    sink: Arc<dyn NotificationSink + Send + Sync>,
    config: SupervisorConfig,
    watchers: Mutex<HashMap<RequestKey, Watcher>>,
}

impl Supervisor {
    pub fn new(
        driver: Arc<PollingDriver>,
        sink: Arc<dyn NotificationSink + Send + Sync>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            driver,
            sink,
            config,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Start watching for `request`. A user may only have one outstanding
    /// request at a time.
    pub async fn start(&self, request: NotificationRequest) -> Result<(), SupervisorError> {
        self.reap().await;

        let mut watchers = self.watchers.lock().await;
        if let Some(existing) = watchers.keys().find(|key| key.user_id == request.user_id) {
            return Err(SupervisorError::AlreadyWatching {
                user_id: existing.user_id,
                zip_code: existing.zip_code.clone(),
            });
        }

        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(supervise(
            self.driver.clone(),
            self.sink.clone(),
            self.config.clone(),
            request.clone(),
            receiver,
        ));

        tracing::info!(
            "Watching zip code {} for user {} (channel {})",
            request.zip_code,
            request.user_id,
            request.channel_id
        );

        watchers.insert(
            request.key(),
            Watcher {
                request,
                shutdown,
                handle,
            },
        );

        Ok(())
    }

    /// Stop the request for `user_id` and `zip_code`. Returns `false` if
    /// there was nothing to cancel.
    ///
    /// Once this returns the watcher task is gone: nothing is delivered for
    /// the request and the user may start a new one.
    pub async fn cancel(&self, user_id: u64, zip_code: &str) -> bool {
        let key = RequestKey {
            user_id,
            zip_code: zip_code.to_string(),
        };

        // Held until the task is gone so `start` cannot race a dying watcher.
        let mut watchers = self.watchers.lock().await;
        let Some(watcher) = watchers.remove(&key) else {
            return false;
        };

        let _ = watcher.shutdown.send(true);
        watcher.handle.abort();
        match watcher.handle.await {
            Ok(outcome) => tracing::debug!("Watcher for user {} ended as {:?}", user_id, outcome),
            Err(err) if err.is_cancelled() => {}
            Err(err) => tracing::error!("Watcher for user {} failed while cancelling: {}", user_id, err),
        }

        tracing::info!("Cancelled notification request for user {} zip code {}", user_id, zip_code);
        true
    }

    /// Zip codes `user_id` is still waiting on.
    pub async fn outstanding(&self, user_id: u64) -> Vec<String> {
        self.reap().await;

        let mut zips: Vec<String> = self
            .watchers
            .lock()
            .await
            .values()
            .filter(|watcher| watcher.request.user_id == user_id)
            .map(|watcher| watcher.request.zip_code.clone())
            .collect();
        zips.sort();
        zips
    }

    /// Number of requests still being worked on.
    pub async fn active_count(&self) -> usize {
        self.reap().await;
        self.watchers.lock().await.len()
    }

    /// Drop finished watchers and report how each one ended.
    pub async fn reap(&self) -> Vec<(RequestKey, WatchOutcome)> {
        let finished: Vec<Watcher> = {
            let mut watchers = self.watchers.lock().await;
            let keys: Vec<RequestKey> = watchers
                .iter()
                .filter(|(_, watcher)| watcher.handle.is_finished())
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter().filter_map(|key| watchers.remove(key)).collect()
        };

        let mut outcomes = Vec::with_capacity(finished.len());
        for watcher in finished {
            let key = watcher.request.key();
            let outcome = match watcher.handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!("Watcher task for user {} ended abnormally: {}", key.user_id, err);
                    WatchOutcome::GaveUp
                }
            };
            tracing::debug!(
                "Reaped watcher for user {} zip code {}: {:?}",
                key.user_id,
                key.zip_code,
                outcome
            );
            outcomes.push((key, outcome));
        }
        outcomes
    }

    /// Cancel every outstanding request and wait for the tasks to stop.
    pub async fn shutdown(&self) {
        let watchers: Vec<Watcher> = self.watchers.lock().await.drain().map(|(_, w)| w).collect();
        tracing::info!("Stopping {} notification watcher(s)", watchers.len());

        for watcher in &watchers {
            let _ = watcher.shutdown.send(true);
        }
        for watcher in watchers {
            if let Err(err) = watcher.handle.await {
                tracing::error!(
                    "Watcher for user {} failed during shutdown: {}",
                    watcher.request.user_id,
                    err
                );
            }
        }

        tracing::info!("All notification watchers stopped");
    }
}

/// Body of a watcher task: run the driver, restart it on failure, deliver
/// its message once.
async fn supervise(
    driver: Arc<PollingDriver>,
    sink: Arc<dyn NotificationSink + Send + Sync>,
    config: SupervisorConfig,
    request: NotificationRequest,
    mut shutdown: watch::Receiver<bool>,
) -> WatchOutcome {
    let mut restarts = 0;

    loop {
        // Run on its own task so a panic surfaces as a JoinError.
        let run = {
            let driver = driver.clone();
            let shutdown = shutdown.clone();
            let coordinates = request.coordinates;
            let user_id = request.user_id;
            tokio::spawn(async move { driver.run(coordinates, user_id, shutdown).await })
        };

        match run.await {
            Ok(Ok(Some(_))) if *shutdown.borrow() => {
                tracing::info!(
                    "Request for user {} zip code {} was cancelled, not delivering",
                    request.user_id,
                    request.zip_code
                );
                return WatchOutcome::Cancelled;
            }
            Ok(Ok(Some(message))) => {
                return match sink.deliver(&request, message).await {
                    Ok(()) => {
                        tracing::info!(
                            "Delivered notification to user {} for zip code {}",
                            request.user_id,
                            request.zip_code
                        );
                        WatchOutcome::Delivered
                    }
                    Err(err) => {
                        tracing::error!("{} (user {})", err, request.user_id);
                        WatchOutcome::Undelivered
                    }
                };
            }
            Ok(Ok(None)) => return WatchOutcome::Cancelled,
            Ok(Err(err)) => {
                tracing::error!(
                    "Discovery failed for user {} zip code {}: {}",
                    request.user_id,
                    request.zip_code,
                    err
                );
            }
            Err(err) => {
                tracing::error!(
                    "Driver for user {} zip code {} crashed: {}",
                    request.user_id,
                    request.zip_code,
                    err
                );
            }
        }

        if restarts >= config.max_restarts {
            tracing::error!(
                "Giving up on user {} zip code {} after {} restart(s)",
                request.user_id,
                request.zip_code,
                restarts
            );
            return WatchOutcome::GaveUp;
        }
        restarts += 1;

        tracing::warn!(
            "Restarting driver for user {} ({}/{}) in {}s",
            request.user_id,
            restarts,
            config.max_restarts,
            config.restart_delay.as_secs()
        );

        tokio::select! {
            _ = time::sleep(config.restart_delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return WatchOutcome::Cancelled;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::discovery::mock::{sample_location, slot_on, MockProvider};
    use crate::discovery::provider::{AppointmentProvider, ProviderResult};
    use crate::discovery::{Availability, DiscoveryEngine, Location, Slot};
    use crate::notifier::driver::DEFAULT_WAIT_PERIOD;
    use crate::notifier::sink::{ChannelSink, Delivery};
    use crate::time::FixedClock;
    use tokio::sync::mpsc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
    }

    fn request(user_id: u64, zip_code: &str) -> NotificationRequest {
        NotificationRequest {
            user_id,
            channel_id: 99,
            zip_code: zip_code.to_string(),
            coordinates: Coordinates::new(37.8, -122.2),
        }
    }

    fn with_appointments(provider: MockProvider) -> MockProvider {
        let location = sample_location();
        let slot = slot_on(&location, today(), "10:00:00");
        provider
            .with_locations(vec![location])
            .with_availability(vec![today()])
            .with_slots(vec![slot])
    }

    fn supervisor(
        provider: Arc<dyn AppointmentProvider + Send + Sync>,
        config: SupervisorConfig,
    ) -> (Supervisor, mpsc::UnboundedReceiver<Delivery>) {
        let clock = Arc::new(FixedClock::at(today(), "09:00:00").unwrap());
        let driver = PollingDriver::new(DiscoveryEngine::new(provider), clock, DEFAULT_WAIT_PERIOD);
        let (sink, receiver) = ChannelSink::channel();
        (
            Supervisor::new(Arc::new(driver), Arc::new(sink), config),
            receiver,
        )
    }

    fn quick_restarts(max_restarts: u32) -> SupervisorConfig {
        SupervisorConfig {
            max_restarts,
            restart_delay: Duration::from_secs(1),
        }
    }

    /// Panics on the first location search, then behaves like `inner`.
    struct PanicsOnce {
        panicked: AtomicBool,
        inner: MockProvider,
    }

    #[async_trait]
    impl AppointmentProvider for PanicsOnce {
        async fn get_locations(&self, latitude: f64, longitude: f64) -> ProviderResult<Vec<Location>> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("simulated driver crash");
            }
            self.inner.get_locations(latitude, longitude).await
        }

        async fn get_availability(
            &self,
            location: &Location,
            start_date: NaiveDate,
            end_date: NaiveDate,
        ) -> ProviderResult<Availability> {
            self.inner.get_availability(location, start_date, end_date).await
        }

        async fn get_slots(&self, location: &Location, date: NaiveDate) -> ProviderResult<Vec<Slot>> {
            self.inner.get_slots(location, date).await
        }

        fn provider_name(&self) -> &str {
            "PanicsOnce"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_message_exactly_once() {
        let provider = Arc::new(with_appointments(MockProvider::new()));
        let (supervisor, mut receiver) = supervisor(provider.clone(), SupervisorConfig::default());

        supervisor.start(request(1, "94612")).await.unwrap();

        let delivery = receiver.recv().await.unwrap();
        assert_eq!(delivery.request, request(1, "94612"));
        assert!(delivery.message.starts_with("Hey <@1>"));

        time::sleep(Duration::from_secs(120)).await;
        let outcomes = supervisor.reap().await;
        assert_eq!(outcomes, vec![(request(1, "94612").key(), WatchOutcome::Delivered)]);
        assert!(receiver.try_recv().is_err());
        assert_eq!(provider.location_calls(), 1);
    }

    #[test]
    fn only_undelivered_and_given_up_outcomes_are_failures() {
        assert_eq!(WatchOutcome::Delivered.failure_reason(), None);
        assert_eq!(WatchOutcome::Cancelled.failure_reason(), None);
        assert!(WatchOutcome::Undelivered.failure_reason().is_some());
        assert!(WatchOutcome::GaveUp.failure_reason().unwrap().contains("gave up"));
    }

    #[tokio::test(start_paused = true)]
    async fn reap_reports_delivery_even_if_message_is_read_late() {
        let provider = Arc::new(with_appointments(MockProvider::new()));
        let (supervisor, mut receiver) = supervisor(provider, SupervisorConfig::default());

        supervisor.start(request(1, "94612")).await.unwrap();
        time::sleep(Duration::from_secs(1)).await;

        let outcomes = supervisor.reap().await;
        assert_eq!(outcomes, vec![(request(1, "94612").key(), WatchOutcome::Delivered)]);
        assert_eq!(outcomes[0].1.failure_reason(), None);
        assert!(receiver.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_second_request_from_same_user() {
        let (supervisor, _receiver) =
            supervisor(Arc::new(MockProvider::new()), SupervisorConfig::default());

        supervisor.start(request(1, "94612")).await.unwrap();
        let err = supervisor.start(request(1, "95112")).await.unwrap_err();
        supervisor.start(request(2, "95112")).await.unwrap();

        assert!(matches!(
            err,
            SupervisorError::AlreadyWatching { user_id: 1, ref zip_code } if zip_code == "94612"
        ));
        assert_eq!(supervisor.outstanding(1).await, vec!["94612".to_string()]);
        assert_eq!(supervisor.active_count().await, 2);

        supervisor.shutdown().await;
        assert_eq!(supervisor.active_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_driver_after_transport_failure() {
        let provider = Arc::new(with_appointments(MockProvider::new().with_location_failures(2)));
        let (supervisor, mut receiver) = supervisor(provider.clone(), quick_restarts(4));

        supervisor.start(request(1, "94612")).await.unwrap();

        let delivery = receiver.recv().await.unwrap();
        assert!(delivery.message.contains("1 appointment(s) available"));
        assert_eq!(provider.location_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_driver_after_panic() {
        let provider = Arc::new(PanicsOnce {
            panicked: AtomicBool::new(false),
            inner: with_appointments(MockProvider::new()),
        });
        let (supervisor, mut receiver) = supervisor(provider, quick_restarts(1));

        supervisor.start(request(1, "94612")).await.unwrap();

        assert!(receiver.recv().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_when_restart_budget_is_spent() {
        let provider = Arc::new(MockProvider::new().with_location_failures(10));
        let (supervisor, _receiver) = supervisor(provider.clone(), quick_restarts(2));

        supervisor.start(request(1, "94612")).await.unwrap();
        time::sleep(Duration::from_secs(60)).await;

        let outcomes = supervisor.reap().await;
        assert_eq!(outcomes, vec![(request(1, "94612").key(), WatchOutcome::GaveUp)]);
        assert_eq!(provider.location_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_polling() {
        let provider = Arc::new(MockProvider::new());
        let (supervisor, _receiver) = supervisor(provider.clone(), SupervisorConfig::default());

        supervisor.start(request(1, "94612")).await.unwrap();
        time::sleep(Duration::from_secs(1)).await;

        assert!(supervisor.cancel(1, "94612").await);
        assert!(!supervisor.cancel(1, "94612").await);

        time::sleep(DEFAULT_WAIT_PERIOD * 4).await;
        assert_eq!(provider.location_calls(), 1);
        assert!(supervisor.outstanding(1).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_slow_tick_delivers_nothing() {
        let provider = Arc::new(
            with_appointments(MockProvider::new()).with_search_delay(Duration::from_secs(5)),
        );
        let (supervisor, mut receiver) = supervisor(provider.clone(), SupervisorConfig::default());

        supervisor.start(request(1, "94612")).await.unwrap();
        time::sleep(Duration::from_secs(1)).await;
        assert!(supervisor.cancel(1, "94612").await);

        time::sleep(Duration::from_secs(10)).await;
        assert!(receiver.try_recv().is_err());
        assert_eq!(supervisor.active_count().await, 0);

        supervisor.start(request(1, "95112")).await.unwrap();
        assert_eq!(supervisor.outstanding(1).await, vec!["95112".to_string()]);
        supervisor.shutdown().await;
    }
}
