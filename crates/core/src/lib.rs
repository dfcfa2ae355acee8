pub mod layout;
pub mod payload;
pub mod result;
pub mod topics;

pub use layout::{display_value, metric_rows, Metric, MAX_METRICS_PER_ROW};
pub use payload::decode_payload;
pub use result::{FetchError, FetchResult};
pub use topics::*;
