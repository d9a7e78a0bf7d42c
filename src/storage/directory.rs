// src/storage/directory.rs
//! Where recordings go: one directory per user, one numbered file per attempt

use crate::config::constants::storage::{ATTEMPT_FILE_PREFIX, RECORDING_EXTENSION, USER_DIR_PREFIX};
use crate::error::{AcqError, AcqResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A file location reserved for one recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptSlot {
    pub user: u32,
    pub attempt: u32,
    pub path: PathBuf,
}

/// Allocates recording files for a user
pub trait SessionDirectory: Send + Sync {
    fn open_attempt(&self, user: u32) -> AcqResult<AttemptSlot>;
}

/// Filesystem layout `root/user_<id>/attempt_<n>.csv`
#[derive(Debug, Clone)]
pub struct FsSessionDirectory {
    root: PathBuf,
}

impl FsSessionDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_dir(&self, user: u32) -> PathBuf {
        self.root.join(format!("{}{}", USER_DIR_PREFIX, user))
    }

    /// Known user ids in ascending order. Creates `user_1` when there are none.
    pub fn list_users(&self) -> AcqResult<Vec<u32>> {
        let mut users = self.scan_users()?;
        if users.is_empty() {
            self.ensure_dir(&self.user_dir(1))?;
            users.push(1);
        }
        Ok(users)
    }

    /// Create the next user directory (highest id + 1) and return its id
    pub fn create_user(&self) -> AcqResult<u32> {
        let next = self.scan_users()?.last().copied().unwrap_or(0) + 1;
        self.ensure_dir(&self.user_dir(next))?;
        info!(user = next, "user created");
        Ok(next)
    }

    /// Number of recordings already stored for `user`
    pub fn count_attempts(&self, user: u32) -> AcqResult<usize> {
        let dir = self.user_dir(user);
        if !dir.exists() {
            return Ok(0);
        }
        let entries = fs::read_dir(&dir).map_err(|e| AcqError::storage(&dir, e))?;
        Ok(entries
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.path().extension().and_then(|e| e.to_str()) == Some(RECORDING_EXTENSION)
            })
            .count())
    }

    fn scan_users(&self) -> AcqResult<Vec<u32>> {
        self.ensure_dir(&self.root)?;
        let entries = fs::read_dir(&self.root).map_err(|e| AcqError::storage(&self.root, e))?;
        let mut users: Vec<u32> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix(USER_DIR_PREFIX))
                    .and_then(|id| id.parse::<u32>().ok())
            })
            .collect();
        users.sort_unstable();
        Ok(users)
    }

    fn ensure_dir(&self, dir: &Path) -> AcqResult<()> {
        fs::create_dir_all(dir).map_err(|e| AcqError::storage(dir, e))
    }
}

impl SessionDirectory for FsSessionDirectory {
    fn open_attempt(&self, user: u32) -> AcqResult<AttemptSlot> {
        let dir = self.user_dir(user);
        self.ensure_dir(&dir)?;

        // After deletions the count can collide with an existing name
        let mut attempt = self.count_attempts(user)? as u32 + 1;
        let mut path = dir.join(attempt_file_name(attempt));
        while path.exists() {
            attempt += 1;
            path = dir.join(attempt_file_name(attempt));
        }

        debug!(user, attempt, path = %path.display(), "attempt slot allocated");
        Ok(AttemptSlot { user, attempt, path })
    }
}

fn attempt_file_name(attempt: u32) -> String {
    format!("{}{}.{}", ATTEMPT_FILE_PREFIX, attempt, RECORDING_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_users_creates_first_user() {
        let tmp = TempDir::new().unwrap();
        let dir = FsSessionDirectory::new(tmp.path().join("data"));

        assert_eq!(dir.list_users().unwrap(), vec![1]);
        assert!(tmp.path().join("data/user_1").is_dir());
    }

    #[test]
    fn test_create_user_takes_next_id() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("user_1")).unwrap();
        fs::create_dir_all(tmp.path().join("user_4")).unwrap();
        fs::create_dir_all(tmp.path().join("notes")).unwrap();
        let dir = FsSessionDirectory::new(tmp.path());

        assert_eq!(dir.create_user().unwrap(), 5);
        assert_eq!(dir.list_users().unwrap(), vec![1, 4, 5]);
    }

    #[test]
    fn test_attempt_numbers_follow_csv_count() {
        let tmp = TempDir::new().unwrap();
        let dir = FsSessionDirectory::new(tmp.path());

        let first = dir.open_attempt(2).unwrap();
        assert_eq!(first.attempt, 1);
        assert_eq!(first.path, tmp.path().join("user_2/attempt_1.csv"));

        fs::write(&first.path, "Time_us,K1\n").unwrap();
        fs::write(tmp.path().join("user_2/attempt_1.meta.json"), "{}").unwrap();
        assert_eq!(dir.open_attempt(2).unwrap().attempt, 2);
    }

    #[test]
    fn test_attempt_skips_existing_name() {
        let tmp = TempDir::new().unwrap();
        let dir = FsSessionDirectory::new(tmp.path());
        fs::create_dir_all(dir.user_dir(1)).unwrap();
        // One csv on disk, but it is named as the second attempt
        fs::write(dir.user_dir(1).join("attempt_2.csv"), "").unwrap();

        assert_eq!(dir.open_attempt(1).unwrap().attempt, 3);
    }
}
