// Library root: exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod discovery;
pub mod error;
pub mod geo;
pub mod notifier;
pub mod services;
pub mod time;

// These modules are only needed by the binary.
pub mod cli;
pub mod config;
pub mod logging;
