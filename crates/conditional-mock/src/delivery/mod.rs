//! Per-request options and the delivery of mocked responses.

pub mod options;
pub mod pipeline;
pub mod sink;
pub mod stats;

pub use options::{Delay, HeadersHook, Hook, RequestOptions, StatsHook};
pub use pipeline::deliver;
pub use sink::Sink;
pub use stats::TransferStats;
