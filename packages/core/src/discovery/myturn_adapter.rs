//! MyTurn Appointment Provider Adapter
//!
//! Adapts the MyTurnClient to implement the AppointmentProvider trait:
//! holds the eligibility token obtained at startup, converts wire records
//! into domain types, and degrades malformed bodies to empty results.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::discovery::{
    provider::{AppointmentProvider, ProviderResult},
    types::{retain_future, Availability, Location, Slot},
};
use crate::services::myturn::{
    AvailabilityRequest, LatLng, LocationRecord, LocationSearchRequest, MyTurnClient,
    SlotsRequest, DOSE_NUMBER,
};
use crate::time::{combine_date_and_time, format_date, parse_date, Clock};

/// Adapter that implements AppointmentProvider for MyTurnClient
pub struct MyTurnProvider {
    client: MyTurnClient,
    vaccine_data: String,
    clock: Arc<dyn Clock>,
}

impl MyTurnProvider {
    /// Run the eligibility handshake and build a provider around its token.
    ///
    /// Fails with [`ClientError::Ineligible`](crate::discovery::ClientError::Ineligible)
    /// when the API rejects the default questionnaire; callers should treat
    /// that as fatal.
    pub async fn connect(client: MyTurnClient, clock: Arc<dyn Clock>) -> ProviderResult<Self> {
        let vaccine_data = client.check_eligibility().await?;
        tracing::info!("Eligibility handshake with {} succeeded", client.base_url());

        Ok(Self::with_vaccine_data(client, vaccine_data, clock))
    }

    /// Build a provider from an already-known eligibility token.
    pub fn with_vaccine_data(
        client: MyTurnClient,
        vaccine_data: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            vaccine_data: vaccine_data.into(),
            clock,
        }
    }

    pub fn vaccine_data(&self) -> &str {
        &self.vaccine_data
    }

    fn convert_location(record: LocationRecord) -> Location {
        Location {
            id: record.ext_id,
            name: record.name,
            address: record.display_address,
            booking_type: record.booking_type,
            vaccine_data: record.vaccine_data,
            distance_meters: record.distance_in_meters,
        }
    }
}

#[async_trait]
impl AppointmentProvider for MyTurnProvider {
    async fn get_locations(&self, latitude: f64, longitude: f64) -> ProviderResult<Vec<Location>> {
        let request = LocationSearchRequest {
            location: LatLng {
                lat: latitude,
                lng: longitude,
            },
            from_date: format_date(self.clock.today()),
            vaccine_data: &self.vaccine_data,
        };

        let Some(response) = self.client.search_locations(&request).await? else {
            return Ok(Vec::new());
        };

        Ok(response
            .locations
            .into_iter()
            .map(Self::convert_location)
            .collect())
    }

    async fn get_availability(
        &self,
        location: &Location,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ProviderResult<Availability> {
        let request = AvailabilityRequest {
            start_date: format_date(start_date),
            end_date: format_date(end_date),
            vaccine_data: &location.vaccine_data,
            dose_number: DOSE_NUMBER,
        };

        let Some(response) = self
            .client
            .location_availability(&location.id, &request)
            .await?
        else {
            return Ok(Availability::empty(location.clone()));
        };

        let mut dates = Vec::new();
        let open = response
            .availability
            .into_iter()
            .filter(|record| record.available == Some(true));
        for record in open {
            match parse_date(&record.date) {
                Some(date) if date >= start_date && date <= end_date => dates.push(date),
                Some(date) => {
                    tracing::warn!(
                        "Ignoring date {} outside {}..={} for location {}",
                        date,
                        start_date,
                        end_date,
                        location.id
                    );
                }
                None => {
                    tracing::warn!(
                        "Ignoring unparseable availability date '{}' for location {}",
                        record.date,
                        location.id
                    );
                }
            }
        }
        dates.sort_unstable();
        dates.dedup();

        Ok(Availability {
            location: location.clone(),
            dates,
        })
    }

    async fn get_slots(&self, location: &Location, date: NaiveDate) -> ProviderResult<Vec<Slot>> {
        let request = SlotsRequest {
            vaccine_data: &location.vaccine_data,
        };

        let Some(response) = self
            .client
            .location_slots(&location.id, &format_date(date), &request)
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut slots = Vec::with_capacity(response.slots.len());
        for record in response.slots {
            match combine_date_and_time(date, &record.local_start_time) {
                Some(start) => slots.push(Slot {
                    location_id: location.id.clone(),
                    start,
                    duration_seconds: record.duration_seconds,
                }),
                None => {
                    tracing::warn!(
                        "Skipping slot with unusable start time '{}' at location {} on {}",
                        record.local_start_time,
                        location.id,
                        date
                    );
                }
            }
        }

        Ok(retain_future(slots, &self.clock.now()))
    }

    fn provider_name(&self) -> &str {
        "MyTurn"
    }
}
