//! Human-readable summaries of discovery results.

use chrono::NaiveDate;

use crate::discovery::{AppointmentSet, Location};

pub const BOOKING_URL: &str = "https://myturn.ca.gov";

/// Locale-neutral short date, e.g. `02/01/25`.
const SHORT_DATE_FORMAT: &str = "%m/%d/%y";

fn appointment_lines(appointments: &[AppointmentSet]) -> String {
    appointments
        .iter()
        .map(|set| {
            format!(
                "  * {} - {} appointment(s) available\n",
                set.location,
                set.len()
            )
        })
        .collect()
}

fn window(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "from {} to {}",
        start.format(SHORT_DATE_FORMAT),
        end.format(SHORT_DATE_FORMAT)
    )
}

/// Message sent to a user whose notification request was fulfilled.
pub fn format_notification(
    user_id: u64,
    start: NaiveDate,
    end: NaiveDate,
    appointments: &[AppointmentSet],
) -> String {
    format!(
        "Hey <@{}>, I found available openings at these locations {}, go to {} to make an appointment!\n{}",
        user_id,
        window(start, end),
        BOOKING_URL,
        appointment_lines(appointments)
    )
}

/// Reply to an on-demand appointment lookup.
pub fn format_appointments(start: NaiveDate, end: NaiveDate, appointments: &[AppointmentSet]) -> String {
    if appointments.is_empty() {
        return "Sorry, I didn't find any vaccination appointments in your area".to_string();
    }

    format!(
        "Found available openings at these locations {}, go to {} to make an appointment!\n{}",
        window(start, end),
        BOOKING_URL,
        appointment_lines(appointments)
    )
}

/// Reply to a location lookup.
pub fn format_locations(locations: &[Location]) -> String {
    if locations.is_empty() {
        return "Sorry, I didn't find any vaccination locations in your area".to_string();
    }

    let mut message = "Found these vaccination locations near you:\n".to_string();
    for location in locations {
        message.push_str(&format!("  * {}\n", location));
    }
    message
}
