//! # Snapshot Persistence
//!
//! Saves a root's `SavedState` to `<state_dir>/<name>.json` so navigation
//! survives the process. A snapshot is read once: [`take_snapshot`] deletes
//! the file after loading it, mirroring how a state keeper consumes saved
//! entries.
//!
//! All writes use atomic rename (write `.tmp`, then `rename()`) for crash safety.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::essentials::SavedState;
use crate::router::PersistenceSink;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SnapshotMeta {
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub entry_count: usize,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub state: SavedState,
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Keeps file names to `[A-Za-z0-9_-]`; router keys may contain anything.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

pub fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", file_stem(name)))
}

pub fn save_snapshot(dir: &Path, name: &str, state: &SavedState) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let snapshot = Snapshot {
        meta: SnapshotMeta {
            name: name.to_string(),
            saved_at: Utc::now(),
            entry_count: state.len(),
        },
        state: state.clone(),
    };
    let path = snapshot_path(dir, name);
    atomic_write_json(&path, &snapshot)?;
    debug!("Snapshot '{}' written to {}", name, path.display());
    Ok(path)
}

/// Loads a snapshot without consuming it. `Ok(None)` if there is none.
pub fn load_snapshot(dir: &Path, name: &str) -> io::Result<Option<Snapshot>> {
    let path = snapshot_path(dir, name);
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(&path)?;
    let snapshot =
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(snapshot))
}

/// Loads and deletes a snapshot. A corrupt file is discarded with a warning
/// rather than failing startup.
pub fn take_snapshot(dir: &Path, name: &str) -> io::Result<Option<SavedState>> {
    let snapshot = match load_snapshot(dir, name) {
        Ok(snapshot) => snapshot,
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            warn!("Discarding corrupt snapshot '{}': {}", name, e);
            discard_snapshot(dir, name)?;
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let Some(snapshot) = snapshot else {
        return Ok(None);
    };
    discard_snapshot(dir, name)?;
    info!(
        "Restored snapshot '{}' ({} entries, saved {})",
        name,
        snapshot.meta.entry_count,
        snapshot.meta.saved_at.to_rfc3339()
    );
    Ok(Some(snapshot.state))
}

pub fn discard_snapshot(dir: &Path, name: &str) -> io::Result<()> {
    let path = snapshot_path(dir, name);
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// A [`PersistenceSink`] that writes every published router state to its
/// own snapshot file, named after the router key.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PersistenceSink for FileSink {
    fn persist(&self, key: &str, state: &SavedState) {
        if let Err(e) = save_snapshot(&self.dir, key, state) {
            warn!("Failed to persist '{}': {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("wayfinder-test-{}", uuid::Uuid::new_v4()))
    }

    fn sample_state() -> SavedState {
        let mut state = SavedState::new();
        state.insert("stack", serde_json::json!({ "configurations": ["List"] }));
        state
    }

    #[test]
    fn test_save_then_take_consumes_the_snapshot() {
        let dir = temp_dir();
        save_snapshot(&dir, "root", &sample_state()).unwrap();

        let restored = take_snapshot(&dir, "root").unwrap();
        assert_eq!(restored, Some(sample_state()));
        assert!(take_snapshot(&dir, "root").unwrap().is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_keeps_the_file_and_reports_meta() {
        let dir = temp_dir();
        save_snapshot(&dir, "root", &sample_state()).unwrap();

        let snapshot = load_snapshot(&dir, "root").unwrap().unwrap();
        assert_eq!(snapshot.meta.name, "root");
        assert_eq!(snapshot.meta.entry_count, 1);
        assert!(snapshot_path(&dir, "root").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let dir = temp_dir();
        assert!(take_snapshot(&dir, "nothing").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_discarded() {
        let dir = temp_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(snapshot_path(&dir, "root"), "{ not json").unwrap();

        assert!(take_snapshot(&dir, "root").unwrap().is_none());
        assert!(!snapshot_path(&dir, "root").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = temp_dir();
        save_snapshot(&dir, "root", &sample_state()).unwrap();

        assert!(!dir.join("root.tmp").exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_router_keys_become_safe_file_names() {
        let path = snapshot_path(Path::new("/state"), "app/stack \"x\"");
        assert_eq!(path, PathBuf::from("/state/app_stack__x_.json"));
    }

    #[test]
    fn test_file_sink_writes_one_file_per_key() {
        let dir = temp_dir();
        let sink = FileSink::new(&dir);

        sink.persist("stack", &sample_state());

        let snapshot = load_snapshot(sink.dir(), "stack").unwrap().unwrap();
        assert_eq!(snapshot.state, sample_state());
        fs::remove_dir_all(&dir).unwrap();
    }
}
