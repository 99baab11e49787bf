//! Valid-times handling: timestamp format, axis resolution and polling.

pub mod axis;
pub mod format;
pub mod poller;

pub use axis::{parse_valid_times, resolve_valid_times, Frame, SharedAxis, TimeAxis};
pub use format::{format_timestamp, parse_timestamp};
pub use poller::{poll_once, query_valid_times, AxisListener, ValidTimesPoller};
