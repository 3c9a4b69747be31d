//! Durable checkpoints of the paper collection.
//!
//! One checkpoint file per conference, overwritten in place via a temp file
//! and rename so a crash mid-write never corrupts the previous snapshot.
//! Resumability is derived from the data itself: a reloaded collection simply
//! re-enters the pipeline and papers that already carry an abstract fall out
//! of every tier's working set.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConferenceSpec;
use crate::paper::PaperRecord;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("checkpoint i/o at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("checkpoint at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub conference: String,
    pub full_name: String,
    pub years: Vec<u16>,
    pub total_papers: usize,
    pub saved_at: String,
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointEnvelope {
    pub metadata: CheckpointMetadata,
    pub papers: Vec<PaperRecord>,
}

pub struct RecoveryStore {
    dir: PathBuf,
}

impl RecoveryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn checkpoint_path(&self, conference_key: &str) -> PathBuf {
        self.dir.join(format!("{conference_key}_papers.json"))
    }

    /// Persist the full collection, replacing the previous checkpoint.
    pub fn checkpoint(
        &self,
        spec: &ConferenceSpec,
        papers: &[PaperRecord],
    ) -> Result<(), RecoveryError> {
        let envelope = CheckpointEnvelope {
            metadata: CheckpointMetadata {
                conference: spec.name.to_string(),
                full_name: spec.full_name.to_string(),
                years: spec.years.clone(),
                total_papers: papers.len(),
                saved_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                source: "dblp".to_string(),
            },
            papers: papers.to_vec(),
        };

        let path = self.checkpoint_path(spec.key);
        let json = serde_json::to_string_pretty(&envelope).map_err(|source| {
            RecoveryError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;

        let tmp = path.with_extension("json.tmp");
        write_file(&tmp, json.as_bytes())?;
        fs::rename(&tmp, &path).map_err(|source| RecoveryError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), papers = papers.len(), "checkpoint written");
        Ok(())
    }

    /// Load the prior checkpoint, or `None` when no run has been saved yet.
    pub fn load(&self, conference_key: &str) -> Result<Option<Vec<PaperRecord>>, RecoveryError> {
        let path = self.checkpoint_path(conference_key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RecoveryError::Io { path, source }),
        };
        let envelope: CheckpointEnvelope =
            serde_json::from_slice(&bytes).map_err(|source| RecoveryError::Corrupt {
                path: path.clone(),
                source,
            })?;
        info!(
            path = %path.display(),
            papers = envelope.papers.len(),
            saved_at = %envelope.metadata.saved_at,
            "loaded checkpoint"
        );
        Ok(Some(envelope.papers))
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), RecoveryError> {
    fs::write(path, bytes).map_err(|source| RecoveryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::AbstractSource;
    use crate::sources::EnrichmentResult;

    fn spec() -> ConferenceSpec {
        ConferenceSpec {
            key: "kdd",
            name: "KDD",
            full_name: "ACM SIGKDD Conference on Knowledge Discovery and Data Mining",
            dblp_venue: "kdd",
            dblp_page_prefix: "kdd",
            years: vec![2020, 2021],
            multi_part_years: &[],
            openreview_venue: None,
            proceedings_abstracts: false,
        }
    }

    #[test]
    fn checkpoint_round_trips_the_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecoveryStore::new(dir.path());

        let mut papers = vec![
            PaperRecord::new("First Paper", 2020),
            PaperRecord::new("Second Paper", 2021),
        ];
        papers[0].doi = Some("10.1145/1".to_string());
        papers[1].apply_enrichment(
            AbstractSource::Openalex,
            &EnrichmentResult {
                abstract_text: Some("Text.".to_string()),
                citation_count: Some(3),
                source_id: Some("W1".to_string()),
            },
        );

        store.checkpoint(&spec(), &papers).unwrap();
        let loaded = store.load("kdd").unwrap().unwrap();
        assert_eq!(loaded, papers);
    }

    #[test]
    fn checkpoint_overwrites_rather_than_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecoveryStore::new(dir.path());

        store
            .checkpoint(&spec(), &[PaperRecord::new("Old", 2020)])
            .unwrap();
        store
            .checkpoint(&spec(), &[PaperRecord::new("New", 2020)])
            .unwrap();

        let loaded = store.load("kdd").unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "New");
    }

    #[test]
    fn missing_checkpoint_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecoveryStore::new(dir.path());
        assert!(store.load("kdd").unwrap().is_none());
    }

    #[test]
    fn corrupt_checkpoint_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecoveryStore::new(dir.path());
        fs::write(store.checkpoint_path("kdd"), b"{not json").unwrap();
        assert!(matches!(
            store.load("kdd"),
            Err(RecoveryError::Corrupt { .. })
        ));
    }
}
