//! Appointment Discovery Engine - fans out location, availability and slot
//! queries and aggregates the results per location

use std::sync::Arc;

use chrono::NaiveDate;

use crate::discovery::{
    error::DiscoveryError,
    provider::AppointmentProvider,
    types::{AppointmentSet, Location},
};

/// Stateless orchestrator over an [`AppointmentProvider`].
///
/// One call to [`get_appointments`](Self::get_appointments) is one discovery
/// pass. Queries run sequentially: locations in search order, dates in
/// calendar order. Transport errors abort the pass and are returned as-is.
#[derive(Clone)]
pub struct DiscoveryEngine {
    provider: Arc<dyn AppointmentProvider + Send + Sync>,
}

impl DiscoveryEngine {
    pub fn new(provider: Arc<dyn AppointmentProvider + Send + Sync>) -> Self {
        Self { provider }
    }

    /// Find future appointments at locations near `(latitude, longitude)`
    /// between `start_date` and `end_date` inclusive.
    ///
    /// Locations without any remaining slot are left out; the rest keep the
    /// order the API returned them in.
    pub async fn get_appointments(
        &self,
        latitude: f64,
        longitude: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<AppointmentSet>, DiscoveryError> {
        if start_date > end_date {
            return Err(DiscoveryError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }

        let locations = self.provider.get_locations(latitude, longitude).await?;
        if locations.is_empty() {
            tracing::info!(
                "No vaccination locations found near ({}, {})",
                latitude,
                longitude
            );
            return Ok(Vec::new());
        }

        tracing::debug!(
            "{} returned {} location(s) near ({}, {})",
            self.provider.provider_name(),
            locations.len(),
            latitude,
            longitude
        );

        let mut appointments = Vec::new();
        for location in locations {
            if let Some(set) = self.collect_location(location, start_date, end_date).await? {
                appointments.push(set);
            }
        }

        tracing::info!(
            "Found appointments at {} location(s) near ({}, {}) for {}..={}",
            appointments.len(),
            latitude,
            longitude,
            start_date,
            end_date
        );

        Ok(appointments)
    }

    /// Gather every remaining slot for one location, or `None` if it has none.
    async fn collect_location(
        &self,
        location: Location,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Option<AppointmentSet>, DiscoveryError> {
        let availability = self
            .provider
            .get_availability(&location, start_date, end_date)
            .await?;

        if availability.dates.is_empty() {
            tracing::debug!("No available dates at {}", location.name);
            return Ok(None);
        }

        let mut slots = Vec::new();
        for date in &availability.dates {
            let day = self.provider.get_slots(&location, *date).await?;
            tracing::debug!("{} slot(s) at {} on {}", day.len(), location.name, date);
            slots.extend(day);
        }

        if slots.is_empty() {
            tracing::debug!(
                "{} listed {} available date(s) but no future slots",
                location.name,
                availability.dates.len()
            );
            return Ok(None);
        }

        Ok(Some(AppointmentSet::new(location, slots)))
    }
}
