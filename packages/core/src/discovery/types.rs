//! Core data types for appointment discovery

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use std::fmt;

/// Meters to statute miles, as rounded by the MyTurn site.
const MILES_PER_METER: f64 = 0.000621;

/// A point on the map, as resolved from a zip code or given directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A vaccination venue returned by a location search.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub address: String,
    pub booking_type: String,
    /// Opaque eligibility context echoed back on availability and slot queries.
    pub vaccine_data: String,
    pub distance_meters: f64,
}

impl Location {
    pub fn distance_miles(&self) -> f64 {
        self.distance_meters * MILES_PER_METER
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2} mile(s) away", self.name, self.distance_miles())
    }
}

/// Dates inside a query window on which a location reports open slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    pub location: Location,
    pub dates: Vec<NaiveDate>,
}

impl Availability {
    pub fn empty(location: Location) -> Self {
        Self {
            location,
            dates: Vec::new(),
        }
    }
}

/// A single bookable appointment.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub location_id: String,
    pub start: DateTime<Tz>,
    /// Not every slot entry reports a length.
    pub duration_seconds: Option<u32>,
}

/// All future slots found for one location across the availability window,
/// ordered by date and then by the API's order within a date.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentSet {
    pub location: Location,
    pub slots: Vec<Slot>,
}

impl AppointmentSet {
    pub fn new(location: Location, slots: Vec<Slot>) -> Self {
        debug_assert!(slots.iter().all(|slot| slot.location_id == location.id));
        Self { location, slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Keep only slots that start strictly after `now`.
pub fn retain_future(slots: Vec<Slot>, now: &DateTime<Tz>) -> Vec<Slot> {
    slots.into_iter().filter(|slot| slot.start > *now).collect()
}
