// src/storage/mod.rs
//! Recording sinks and their on-disk layout

pub mod directory;
pub mod recording;
pub mod schema;

pub use directory::{AttemptSlot, FsSessionDirectory, SessionDirectory};
pub use recording::{metadata_path_for, RecordingSession, SessionMetadata, SessionSummary};
pub use schema::{recording_header, FEATURE_COLUMNS};
