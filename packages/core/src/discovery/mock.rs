//! Scripted provider for unit tests.
//!
//! Availability and slot answers are queued and handed out one per call,
//! in order, so several identical locations can receive different answers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::discovery::{
    error::ClientError,
    provider::{AppointmentProvider, ProviderResult},
    types::{Availability, Location, Slot},
};
use crate::time::combine_date_and_time;

pub fn sample_location() -> Location {
    Location {
        id: "EXT_ID".to_string(),
        name: "NAME".to_string(),
        address: "DISPLAY_ADDRESS".to_string(),
        booking_type: "TYPE".to_string(),
        vaccine_data: "VACCINE_DATA".to_string(),
        distance_meters: 1609.0,
    }
}

pub fn slot_on(location: &Location, date: NaiveDate, time: &str) -> Slot {
    Slot {
        location_id: location.id.clone(),
        start: combine_date_and_time(date, time).unwrap(),
        duration_seconds: Some(300),
    }
}

#[derive(Default)]
pub struct MockProvider {
    locations: Vec<Location>,
    availability: Mutex<VecDeque<Vec<NaiveDate>>>,
    slots: Mutex<VecDeque<Vec<Slot>>>,
    empty_searches: AtomicUsize,
    failing_searches: AtomicUsize,
    search_delay: Duration,
    location_calls: AtomicUsize,
    availability_calls: AtomicUsize,
    slot_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locations(mut self, locations: Vec<Location>) -> Self {
        self.locations = locations;
        self
    }

    /// Queue the dates returned by the next unanswered availability call.
    pub fn with_availability(self, dates: Vec<NaiveDate>) -> Self {
        self.availability.lock().unwrap().push_back(dates);
        self
    }

    /// Queue the slots returned by the next unanswered slot call.
    pub fn with_slots(self, slots: Vec<Slot>) -> Self {
        self.slots.lock().unwrap().push_back(slots);
        self
    }

    /// The first `n` location searches find nothing.
    pub fn with_empty_searches(self, n: usize) -> Self {
        self.empty_searches.store(n, Ordering::SeqCst);
        self
    }

    /// The first `n` location searches fail with HTTP 503.
    pub fn with_location_failures(self, n: usize) -> Self {
        self.failing_searches.store(n, Ordering::SeqCst);
        self
    }

    /// Every location search takes `delay` before answering.
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    pub fn location_calls(&self) -> usize {
        self.location_calls.load(Ordering::SeqCst)
    }

    pub fn availability_calls(&self) -> usize {
        self.availability_calls.load(Ordering::SeqCst)
    }

    pub fn slot_calls(&self) -> usize {
        self.slot_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.location_calls() + self.availability_calls() + self.slot_calls()
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl AppointmentProvider for MockProvider {
    async fn get_locations(&self, _latitude: f64, _longitude: f64) -> ProviderResult<Vec<Location>> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        if !self.search_delay.is_zero() {
            tokio::time::sleep(self.search_delay).await;
        }

        if Self::take_one(&self.failing_searches) {
            return Err(ClientError::Status {
                url: "mock://locations/search".to_string(),
                status: 503,
                attempts: 1,
            });
        }
        if Self::take_one(&self.empty_searches) {
            return Ok(Vec::new());
        }

        Ok(self.locations.clone())
    }

    async fn get_availability(
        &self,
        location: &Location,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> ProviderResult<Availability> {
        self.availability_calls.fetch_add(1, Ordering::SeqCst);
        let dates = self
            .availability
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();

        Ok(Availability {
            location: location.clone(),
            dates,
        })
    }

    async fn get_slots(&self, _location: &Location, _date: NaiveDate) -> ProviderResult<Vec<Slot>> {
        self.slot_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.slots.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn provider_name(&self) -> &str {
        "Mock"
    }
}
