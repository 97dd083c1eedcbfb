//! Notification delivery: the polling driver, the supervisor that owns one
//! driver per outstanding request, and message formatting.

pub mod driver;
pub mod message;
pub mod sink;
pub mod supervisor;

pub use driver::{DriverState, PollingDriver};
pub use sink::{ChannelSink, Delivery, NotificationSink, SinkError};
pub use supervisor::{NotificationRequest, RequestKey, Supervisor, SupervisorConfig, SupervisorError, WatchOutcome};
