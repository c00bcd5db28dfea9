//! JSON file snapshot backend
//!
//! Implements atomic whole-file writes and schema versioning. Files written by
//! older tooling as a bare `{"<block>": "<timestamp>"}` object are accepted on
//! load and upgraded to the versioned document on the next write.

use super::{CheckpointMap, SnapshotBackend, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current checkpoint file schema version
const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Serialize)]
struct StoreDocumentRef<'a> {
    schema_version: &'a str,
    updated_at: i64,
    timestamps: &'a BTreeMap<u64, String>,
}

#[derive(Deserialize)]
struct StoreDocument {
    schema_version: String,
    #[allow(dead_code)]
    updated_at: i64,
    timestamps: BTreeMap<String, String>,
}

/// Snapshot backend persisting the map as a JSON document
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Backend writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// Decode checkpoint file contents, versioned or legacy
fn decode_document(contents: &str) -> StoreResult<CheckpointMap> {
    let value: serde_json::Value = serde_json::from_str(contents).map_err(|e| {
        warn!(error = %e, "Failed to parse checkpoint file");
        StoreError::DecodeError(e.to_string())
    })?;

    let Some(object) = value.as_object() else {
        return Err(StoreError::DecodeError(
            "expected a JSON object at the top level".to_string(),
        ));
    };

    let raw_entries = if object.contains_key("schema_version") {
        let document: StoreDocument = serde_json::from_value(value)
            .map_err(|e| StoreError::DecodeError(e.to_string()))?;
        if document.schema_version != SCHEMA_VERSION {
            warn!(
                found_version = %document.schema_version,
                expected_version = SCHEMA_VERSION,
                "Checkpoint schema version mismatch"
            );
            return Err(StoreError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: document.schema_version,
            });
        }
        document.timestamps
    } else {
        let legacy: BTreeMap<String, String> = serde_json::from_value(value)
            .map_err(|e| StoreError::DecodeError(e.to_string()))?;
        info!(
            records = legacy.len(),
            target_version = SCHEMA_VERSION,
            "Found unversioned checkpoint file, it will be upgraded on the next write"
        );
        legacy
    };

    raw_entries
        .into_iter()
        .map(|(key, timestamp)| {
            key.parse::<u64>()
                .map(|index| (index, timestamp))
                .map_err(|_| StoreError::DecodeError(format!("invalid block index key: {key:?}")))
        })
        .collect::<StoreResult<BTreeMap<u64, String>>>()
        .map(CheckpointMap::from_entries)
}

fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

impl SnapshotBackend for JsonFileBackend {
    fn read_snapshot(&mut self) -> StoreResult<Option<CheckpointMap>> {
        debug!(path = %self.path.display(), "Loading checkpoint file");

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::IoError(e.to_string())),
        };

        decode_document(&contents).map(Some)
    }

    /// Write the snapshot atomically: temp file in the same directory,
    /// fsync, rename over the target, then fsync the directory.
    fn write_snapshot(&mut self, map: &CheckpointMap) -> StoreResult<()> {
        let parent_dir = self.parent_dir().to_path_buf();
        std::fs::create_dir_all(&parent_dir).map_err(|e| StoreError::IoError(e.to_string()))?;

        let document = StoreDocumentRef {
            schema_version: SCHEMA_VERSION,
            updated_at: chrono::Utc::now().timestamp_millis(),
            timestamps: map.entries(),
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&parent_dir)
            .map_err(|e| StoreError::IoError(format!("Failed to create temp file: {e}")))?;
        temp_file
            .write_all(&json)
            .map_err(|e| StoreError::IoError(format!("Failed to write to temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| StoreError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| StoreError::IoError(format!("Failed to sync temp file: {e}")))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| StoreError::IoError(format!("Failed to persist temp file: {e}")))?;

        // Directory fsync makes the rename itself durable
        if let Err(e) = sync_dir(&parent_dir) {
            warn!(
                dir = %parent_dir.display(),
                error = %e,
                "Failed to sync checkpoint directory, the last rename may not survive a crash"
            );
        }

        debug!(
            path = %self.path.display(),
            records = map.len(),
            bytes = json.len(),
            "Checkpoint file written"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
