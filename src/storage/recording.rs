// src/storage/recording.rs
//! One recording run: a header-tagged CSV of raw telemetry fields plus a
//! JSON sidecar describing it

use crate::config::constants::storage::METADATA_SUFFIX;
use crate::error::{AcqError, AcqResult};
use crate::protocol::Telemetry;
use crate::storage::directory::AttemptSlot;
use crate::storage::schema::recording_header;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Contents of the `attempt_<n>.meta.json` sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub user: u32,
    pub attempt: u32,
    pub channel_count: usize,
    pub columns: Vec<String>,
    pub samples_written: u64,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub first_timestamp_us: Option<u64>,
    pub last_timestamp_us: Option<u64>,
}

/// What a closed session produced
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub path: PathBuf,
    /// `None` if the sidecar could not be written
    pub metadata_path: Option<PathBuf>,
    pub metadata: SessionMetadata,
}

pub struct RecordingSession {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    metadata: SessionMetadata,
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("path", &self.path)
            .field("samples_written", &self.metadata.samples_written)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

/// Sidecar path for a recording file: `attempt_3.csv` -> `attempt_3.meta.json`
pub fn metadata_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", stem, METADATA_SUFFIX))
}

impl RecordingSession {
    /// Create the file for `slot` and write the header.
    ///
    /// Never overwrites: an existing file at the slot's path is an error.
    pub fn create(slot: &AttemptSlot, channel_count: usize) -> AcqResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&slot.path)
            .map_err(|e| AcqError::storage(&slot.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        let columns = recording_header(channel_count);
        writer
            .write_record(&columns)
            .and_then(|_| writer.flush().map_err(csv::Error::from))
            .map_err(|e| AcqError::storage(&slot.path, e))?;

        info!(path = %slot.path.display(), user = slot.user, attempt = slot.attempt, "recording opened");

        Ok(Self {
            path: slot.path.clone(),
            writer: Some(writer),
            metadata: SessionMetadata {
                user: slot.user,
                attempt: slot.attempt,
                channel_count,
                columns,
                samples_written: 0,
                started_at: Utc::now(),
                stopped_at: None,
                first_timestamp_us: None,
                last_timestamp_us: None,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples_written(&self) -> u64 {
        self.metadata.samples_written
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Append one telemetry line's fields exactly as received
    pub fn append(&mut self, telemetry: &Telemetry) -> AcqResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| AcqError::storage(&self.path, "session already closed"))?;

        if telemetry.channel_count() != self.metadata.channel_count {
            debug!(
                expected = self.metadata.channel_count,
                got = telemetry.channel_count(),
                "telemetry width differs from header"
            );
        }

        writer
            .write_record(telemetry.fields())
            .map_err(|e| AcqError::storage(&self.path, e))?;

        self.metadata.samples_written += 1;
        self.metadata.first_timestamp_us.get_or_insert(telemetry.timestamp_us);
        self.metadata.last_timestamp_us = Some(telemetry.timestamp_us);
        Ok(())
    }

    pub fn flush(&mut self) -> AcqResult<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush().map_err(|e| AcqError::storage(&self.path, e)),
            None => Ok(()),
        }
    }

    /// Flush and close the file, then write the sidecar
    pub fn close(mut self) -> AcqResult<SessionSummary> {
        if let Some(writer) = self.writer.take() {
            let file = writer
                .into_inner()
                .map_err(|e| AcqError::storage(&self.path, e.error()))?;
            file.sync_all().map_err(|e| AcqError::storage(&self.path, e))?;
        }
        self.metadata.stopped_at = Some(Utc::now());

        let metadata_path = match self.write_sidecar() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "could not write session metadata");
                None
            }
        };

        info!(
            path = %self.path.display(),
            samples = self.metadata.samples_written,
            "recording closed"
        );

        Ok(SessionSummary {
            path: self.path.clone(),
            metadata_path,
            metadata: self.metadata.clone(),
        })
    }

    fn write_sidecar(&self) -> AcqResult<PathBuf> {
        let path = metadata_path_for(&self.path);
        let json = serde_json::to_string_pretty(&self.metadata).map_err(|e| AcqError::storage(&path, e))?;
        std::fs::write(&path, json).map_err(|e| AcqError::storage(&path, e))?;
        Ok(path)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!(path = %self.path.display(), error = %e, "flush on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{classify, Message};
    use tempfile::TempDir;

    fn telemetry(line: &str) -> Telemetry {
        match classify(line) {
            Message::Telemetry(t) => t,
            other => panic!("not telemetry: {:?}", other),
        }
    }

    fn slot(dir: &TempDir) -> AttemptSlot {
        AttemptSlot {
            user: 1,
            attempt: 1,
            path: dir.path().join("attempt_1.csv"),
        }
    }

    #[test]
    fn test_header_and_raw_fields_written_in_order() {
        let dir = TempDir::new().unwrap();
        let mut session = RecordingSession::create(&slot(&dir), 3).unwrap();

        session.append(&telemetry("1000,0.1000,0.2000,0.3000")).unwrap();
        session.append(&telemetry("6000,0.1500,0.2500,0.3500")).unwrap();
        let summary = session.close().unwrap();

        let contents = std::fs::read_to_string(&summary.path).unwrap();
        assert_eq!(
            contents,
            "Time_us,K1,K2,K3\n1000,0.1000,0.2000,0.3000\n6000,0.1500,0.2500,0.3500\n"
        );
        assert_eq!(summary.metadata.samples_written, 2);
        assert_eq!(summary.metadata.first_timestamp_us, Some(1000));
        assert_eq!(summary.metadata.last_timestamp_us, Some(6000));
    }

    #[test]
    fn test_sidecar_written_on_close() {
        let dir = TempDir::new().unwrap();
        let session = RecordingSession::create(&slot(&dir), 2).unwrap();
        let summary = session.close().unwrap();

        let meta_path = summary.metadata_path.unwrap();
        assert_eq!(meta_path, dir.path().join("attempt_1.meta.json"));
        let meta: SessionMetadata = serde_json::from_str(&std::fs::read_to_string(meta_path).unwrap()).unwrap();
        assert_eq!(meta.columns, ["Time_us", "K1", "K2"]);
        assert_eq!(meta.samples_written, 0);
        assert!(meta.stopped_at.is_some());
    }

    #[test]
    fn test_existing_file_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("attempt_1.csv"), "keep me").unwrap();

        let err = RecordingSession::create(&slot(&dir), 3).unwrap_err();
        assert!(matches!(err, AcqError::Storage { .. }));
        assert_eq!(std::fs::read_to_string(dir.path().join("attempt_1.csv")).unwrap(), "keep me");
    }

    #[test]
    fn test_mismatched_width_is_still_recorded() {
        let dir = TempDir::new().unwrap();
        let mut session = RecordingSession::create(&slot(&dir), 3).unwrap();
        session.append(&telemetry("5,0.5000")).unwrap();
        let summary = session.close().unwrap();

        let contents = std::fs::read_to_string(summary.path).unwrap();
        assert_eq!(contents.lines().last(), Some("5,0.5000"));
    }

    #[test]
    fn test_drop_flushes_buffered_rows() {
        let dir = TempDir::new().unwrap();
        let path = slot(&dir).path;
        {
            let mut session = RecordingSession::create(&slot(&dir), 1).unwrap();
            session.append(&telemetry("7,1.0000")).unwrap();
        }
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Time_us,K1\n7,1.0000\n");
    }

    #[test]
    fn test_metadata_path_for() {
        assert_eq!(
            metadata_path_for(Path::new("/data/user_1/attempt_3.csv")),
            PathBuf::from("/data/user_1/attempt_3.meta.json")
        );
    }
}
