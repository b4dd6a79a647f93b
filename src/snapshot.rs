//! Snapshot persistence and notification collaborators.
//!
//! The pipeline hands a finished [`Snapshot`] to a [`SnapshotSink`] and
//! notices to a [`Notifier`]; both are narrow seams so deployments can swap
//! in image rendering or real mail delivery without touching the core. The
//! shipped implementations write a JSON snapshot and log notices.

use crate::base::error::WatchError;
use crate::report::record::Record;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// Normalized, sorted result of one successful run.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    #[serde(rename = "className")]
    pub groups: Vec<String>,
    #[serde(rename = "formData")]
    pub records: Vec<Record>,
    #[serde(rename = "lastModified")]
    pub taken_at: i64,
}

pub trait SnapshotSink: Send + Sync {
    fn write(&self, snapshot: &Snapshot) -> Result<(), WatchError>;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, subject: &str, body: &str) -> Result<(), WatchError>;
}

/// Writes the snapshot as one JSON document, truncating any previous one.
pub struct JsonSnapshotWriter {
    path: PathBuf,
}

impl JsonSnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotSink for JsonSnapshotWriter {
    fn write(&self, snapshot: &Snapshot) -> Result<(), WatchError> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
        Ok(())
    }
}

/// Notifier that records notices in the operator log only.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), WatchError> {
        info!(subject, body, "notice");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, group: &str) -> Record {
        Record::new([
            "2026-08-08".into(),
            "0".into(),
            String::new(),
            id.into(),
            format!("name-{id}"),
            "College".into(),
            "2023".into(),
            group.into(),
            String::new(),
        ])
    }

    #[test]
    fn test_json_writer_emits_expected_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let writer = JsonSnapshotWriter::new(&path);

        let snapshot = Snapshot {
            groups: vec!["10".into()],
            records: vec![record("s01", "10")],
            taken_at: 1_765_000_000,
        };
        writer.write(&snapshot).unwrap();

        let value: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["className"], serde_json::json!(["10"]));
        assert_eq!(
            value["formData"],
            serde_json::json!([["s01", "name-s01", "College", "2023", "10"]])
        );
        assert_eq!(value["lastModified"], serde_json::json!(1_765_000_000));
    }

    #[test]
    fn test_json_writer_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let writer = JsonSnapshotWriter::new(&path);

        for taken_at in [1, 2] {
            writer
                .write(&Snapshot {
                    groups: vec![],
                    records: vec![],
                    taken_at,
                })
                .unwrap();
        }
        let value: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["lastModified"], serde_json::json!(2));
    }
}
