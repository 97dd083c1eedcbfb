//! Error types for appointment discovery

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while talking to the MyTurn API.
///
/// Undecodable response bodies on the query endpoints never surface here;
/// they are logged and turned into empty results by the provider.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status} after {attempts} attempt(s)")]
    Status {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("Undecodable response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Eligibility check returned eligible = false; the default questionnaire no longer matches the API")]
    Ineligible,

    #[error("Invalid client configuration: {message}")]
    Config { message: String },
}

impl ClientError {
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// `true` for failures that mean the startup payload or settings are wrong.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Ineligible | Self::Config { .. })
    }
}

/// Errors from a discovery pass.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Start date {start} must not be after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Client(#[from] ClientError),
}
