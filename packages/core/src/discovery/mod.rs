//! Appointment Discovery Module
//!
//! Queries the MyTurn API for nearby vaccination locations, their open
//! dates and the time slots on those dates, and aggregates the result into
//! one [`AppointmentSet`] per location that still has future slots.

pub mod engine;
pub mod error;
pub mod myturn_adapter;
pub mod provider;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use engine::DiscoveryEngine;
pub use error::{ClientError, DiscoveryError};
pub use myturn_adapter::MyTurnProvider;
pub use provider::AppointmentProvider;
pub use types::*;
