use std::error::Error;
use std::fmt;

use crate::discovery::{ClientError, DiscoveryError};
use crate::geo::ZipError;

/// Unified application error.
///
/// Tells the binary how a failure should be reported: configuration
/// problems abort at startup, network problems are worth retrying later,
/// validation problems are the caller's mistake.
#[derive(Debug)]
pub enum AppError {
    Config(String),
    Network(String),
    Validation(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "Config error: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Validation(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl Error for AppError {}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        if err.is_fatal() {
            AppError::Config(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<DiscoveryError> for AppError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::InvalidDateRange { .. } => AppError::Validation(err.to_string()),
            DiscoveryError::Client(inner) => inner.into(),
        }
    }
}

impl From<ZipError> for AppError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Load(_) => AppError::Config(err.to_string()),
            _ => AppError::Validation(err.to_string()),
        }
    }
}
