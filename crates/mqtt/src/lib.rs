pub mod config;
pub mod fetch;

pub use config::ConnectionConfig;
pub use fetch::{fetch_one_message, DEFAULT_FETCH_TIMEOUT};
pub use sensorpeek_core::{FetchError, FetchResult};
