//! Appointment Data Provider Interface
//!
//! Abstracts the three MyTurn queries the discovery engine fans out over,
//! so the engine can run against the live API or a test double.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::discovery::{
    error::ClientError,
    types::{Availability, Location, Slot},
};

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ClientError>;

#[async_trait]
pub trait AppointmentProvider {
    /// Vaccination locations near the given coordinates, in the API's order.
    async fn get_locations(&self, latitude: f64, longitude: f64) -> ProviderResult<Vec<Location>>;

    /// Dates in `[start_date, end_date]` on which `location` has open slots.
    async fn get_availability(
        &self,
        location: &Location,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ProviderResult<Availability>;

    /// Slots at `location` on `date` that start after the provider's "now".
    async fn get_slots(&self, location: &Location, date: NaiveDate) -> ProviderResult<Vec<Slot>>;

    /// Get the name of this provider for logging/debugging
    fn provider_name(&self) -> &str;
}
