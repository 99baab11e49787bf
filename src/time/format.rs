use crate::core::constants::TIMESTAMP_FORMAT;
use crate::{LoopError, Result};
use chrono::NaiveDateTime;

/// Parses a server timestamp (`yyyy-MM-ddTHH:mm:ss`, UTC). A trailing `Z`
/// is accepted.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
        .map_err(|e| LoopError::invalid_response(format!("bad timestamp {:?}: {}", value, e)))
}

pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}
