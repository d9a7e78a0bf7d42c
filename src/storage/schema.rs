// src/storage/schema.rs
//! Column layouts shared with downstream analysis

use crate::config::constants::storage::TIME_COLUMN;
use crate::protocol::channel_label;

/// Per-press features computed by the offline analysis stage, in column order
pub const FEATURE_COLUMNS: [&str; 7] = [
    "Press_Duration",
    "Max_Depth",
    "Max_Velocity",
    "Max_Acceleration",
    "Area",
    "Time_to_Peak",
    "Release_Time",
];

/// Recording header: `Time_us,K1,..,Kn`
pub fn recording_header(channel_count: usize) -> Vec<String> {
    std::iter::once(TIME_COLUMN.to_string())
        .chain((0..channel_count).map(channel_label))
        .collect()
}
