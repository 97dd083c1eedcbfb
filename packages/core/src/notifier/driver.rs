//! Notification polling driver.
//!
//! Repeatedly runs discovery for one request until something is found,
//! then hands back a single formatted message. Each tick covers today
//! through one week out in Pacific time. Between ticks the driver waits on
//! a timer that can be interrupted by a shutdown signal, so the owner can
//! stop it at any tick boundary.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::sync::watch;
use tokio::time;

use crate::discovery::{Coordinates, DiscoveryEngine, DiscoveryError};
use crate::notifier::message::format_notification;
use crate::time::Clock;

/// Default pause between polls.
pub const DEFAULT_WAIT_PERIOD: Duration = Duration::from_secs(30);

/// How far ahead each poll looks.
pub const SEARCH_WINDOW_DAYS: i64 = 7;

/// Where a driver stands after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Polling,
    /// Terminal: the message to deliver.
    Done(String),
}

pub struct PollingDriver {
    engine: DiscoveryEngine,
    clock: Arc<dyn Clock>,
    wait_period: Duration,
}

impl PollingDriver {
    pub fn new(engine: DiscoveryEngine, clock: Arc<dyn Clock>, wait_period: Duration) -> Self {
        Self {
            engine,
            clock,
            wait_period,
        }
    }

    /// Run one discovery pass for `coordinates` and format a message for
    /// `user_id` if anything was found.
    pub async fn generate_notification(
        &self,
        coordinates: Coordinates,
        user_id: u64,
    ) -> Result<Option<String>, DiscoveryError> {
        let start = self.clock.today();
        let end = start + ChronoDuration::days(SEARCH_WINDOW_DAYS);

        let appointments = self
            .engine
            .get_appointments(coordinates.latitude, coordinates.longitude, start, end)
            .await?;

        if appointments.is_empty() {
            return Ok(None);
        }

        Ok(Some(format_notification(user_id, start, end, &appointments)))
    }

    /// One tick of the state machine.
    pub async fn tick(
        &self,
        coordinates: Coordinates,
        user_id: u64,
    ) -> Result<DriverState, DiscoveryError> {
        match self.generate_notification(coordinates, user_id).await? {
            Some(message) => {
                tracing::info!(
                    "Found appointments for user {} near ({}, {})",
                    user_id,
                    coordinates.latitude,
                    coordinates.longitude
                );
                Ok(DriverState::Done(message))
            }
            None => {
                tracing::info!(
                    "No appointments yet for user {} near ({}, {}), checking again in {}s",
                    user_id,
                    coordinates.latitude,
                    coordinates.longitude,
                    self.wait_period.as_secs()
                );
                Ok(DriverState::Polling)
            }
        }
    }

    /// Poll until appointments are found or `shutdown` fires.
    ///
    /// Returns `Ok(Some(message))` exactly once on success and `Ok(None)`
    /// when cancelled, including a cancel that lands while a tick is running. Discovery errors end the run; restarting is the
    /// caller's decision. A dropped shutdown sender counts as a shutdown.
    pub async fn run(
        &self,
        coordinates: Coordinates,
        user_id: u64,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Option<String>, DiscoveryError> {
        loop {
            if *shutdown.borrow() {
                tracing::debug!("Driver for user {} cancelled before tick", user_id);
                return Ok(None);
            }

            if let DriverState::Done(message) = self.tick(coordinates, user_id).await? {
                if *shutdown.borrow() {
                    tracing::debug!("Driver for user {} cancelled during tick, dropping result", user_id);
                    return Ok(None);
                }
                return Ok(Some(message));
            }

            tokio::select! {
                _ = time::sleep(self.wait_period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Driver for user {} cancelled while waiting", user_id);
                        return Ok(None);
                    }
                }
            }
        }
    }
}
