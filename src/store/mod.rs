use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub mod cache;
pub mod cleanup;

use crate::Result;

/// Quality tag for transcripts translated by the remote provider.
pub const QUALITY_REMOTE: u8 = 75;
/// Quality tag for transcripts translated by the local model.
pub const QUALITY_LOCAL: u8 = 85;
/// Minimum quality for a transcript to be eligible as training data.
pub const TRAINING_QUALITY_GATE: u8 = 50;

/// A completed pipeline run persisted as future training data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub url: String,
    pub title: String,
    pub transcript: String,
    pub translation: String,
    pub source_lang: String,
    pub target_lang: String,
    pub created_at: DateTime<Utc>,
    pub quality: u8,
    pub used_for_training: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_date: Option<DateTime<Utc>>,
}

/// Append-only transcript persistence: an index list plus one JSON file per
/// transcript id. The per-id files are authoritative when the two disagree
/// (the index may lag behind a crashed write).
pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: &Path) -> Result<Self> {
        fs_err::create_dir_all(dir).context("Failed to create transcript store directory")?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join("transcripts.json")
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", crate::utils::sanitize_filename(id)))
    }

    /// Insert or overwrite by id. Last write wins on concurrent submissions
    /// of the same video.
    pub fn upsert(&self, transcript: &Transcript) -> Result<()> {
        let entry = serde_json::to_string_pretty(transcript)?;
        fs_err::write(self.entry_path(&transcript.id), entry)
            .context("Failed to write transcript file")?;

        let mut index = self.read_index();
        index.retain(|t| t.id != transcript.id);
        index.push(transcript.clone());
        self.write_index(&index)?;

        tracing::info!("Persisted transcript {} ({})", transcript.id, transcript.url);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Transcript> {
        let path = self.entry_path(id);
        let content = fs_err::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// All transcripts, merging the index with the per-id files. On id
    /// conflicts the per-id file version wins.
    pub fn list(&self) -> Result<Vec<Transcript>> {
        let mut merged: HashMap<String, Transcript> = self
            .read_index()
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        for entry in fs_err::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path == self.index_path()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            let Ok(content) = fs_err::read_to_string(&path) else {
                continue;
            };
            if let Ok(transcript) = serde_json::from_str::<Transcript>(&content) {
                merged.insert(transcript.id.clone(), transcript);
            }
        }

        let mut all: Vec<Transcript> = merged.into_values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }

    /// Transcripts eligible for model training: not yet used and at or above
    /// the quality gate.
    pub fn untrained_above(&self, quality_gate: u8) -> Result<Vec<Transcript>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|t| !t.used_for_training && t.quality >= quality_gate)
            .collect())
    }

    /// Flag transcripts as consumed by a training run.
    pub fn mark_trained(&self, ids: &[String]) -> Result<()> {
        let now = Utc::now();
        for id in ids {
            if let Some(mut transcript) = self.get(id) {
                transcript.used_for_training = true;
                transcript.training_date = Some(now);
                self.upsert(&transcript)?;
            }
        }
        Ok(())
    }

    fn read_index(&self) -> Vec<Transcript> {
        let Ok(content) = fs_err::read_to_string(self.index_path()) else {
            return Vec::new();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    fn write_index(&self, index: &[Transcript]) -> Result<()> {
        let content = serde_json::to_string_pretty(index)?;
        fs_err::write(self.index_path(), content).context("Failed to write transcript index")?;
        Ok(())
    }
}

/// Quality tag for a translation provider (opaque gate values, preserved
/// from the conventions the store was built around).
pub fn quality_for_provider(provider: crate::translate::ProviderKind) -> u8 {
    match provider {
        crate::translate::ProviderKind::Local => QUALITY_LOCAL,
        crate::translate::ProviderKind::Remote => QUALITY_REMOTE,
        // Placeholder text must never become training data.
        crate::translate::ProviderKind::Placeholder => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, quality: u8) -> Transcript {
        Transcript {
            id: id.to_string(),
            url: format!("https://youtube.com/watch?v={}", id),
            title: "A test video".to_string(),
            transcript: "hello world".to_string(),
            translation: "שלום עולם".to_string(),
            source_lang: "en".to_string(),
            target_lang: "he".to_string(),
            created_at: Utc::now(),
            quality,
            used_for_training: false,
            training_date: None,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();

        store.upsert(&sample("vid1", QUALITY_REMOTE)).unwrap();
        let loaded = store.get("vid1").unwrap();
        assert_eq!(loaded.quality, QUALITY_REMOTE);
        assert_eq!(loaded.translation, "שלום עולם");
    }

    #[test]
    fn test_upsert_overwrites_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();

        store.upsert(&sample("vid1", QUALITY_REMOTE)).unwrap();
        store.upsert(&sample("vid1", QUALITY_LOCAL)).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].quality, QUALITY_LOCAL);
    }

    #[test]
    fn test_per_id_file_wins_over_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();
        store.upsert(&sample("vid1", QUALITY_REMOTE)).unwrap();

        // Simulate a divergent per-id file left by another writer.
        let mut newer = sample("vid1", QUALITY_LOCAL);
        newer.title = "Rewritten".to_string();
        fs_err::write(
            dir.path().join("vid1.json"),
            serde_json::to_string(&newer).unwrap(),
        )
        .unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Rewritten");
        assert_eq!(all[0].quality, QUALITY_LOCAL);
    }

    #[test]
    fn test_training_selection_and_marking() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();

        store.upsert(&sample("good", 85)).unwrap();
        store.upsert(&sample("poor", 30)).unwrap();
        let mut trained = sample("done", 90);
        trained.used_for_training = true;
        store.upsert(&trained).unwrap();

        let eligible = store.untrained_above(TRAINING_QUALITY_GATE).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, "good");

        store.mark_trained(&["good".to_string()]).unwrap();
        assert!(store.untrained_above(TRAINING_QUALITY_GATE).unwrap().is_empty());
        assert!(store.get("good").unwrap().training_date.is_some());
    }

    #[test]
    fn test_provider_quality_tags() {
        use crate::translate::ProviderKind;
        assert_eq!(quality_for_provider(ProviderKind::Remote), 75);
        assert_eq!(quality_for_provider(ProviderKind::Local), 85);
        assert!(quality_for_provider(ProviderKind::Placeholder) < TRAINING_QUALITY_GATE);
    }
}
