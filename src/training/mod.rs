use serde::Serialize;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::config::Config;
use crate::store::TranscriptStore;
use crate::Result;

/// One source/target pair in the training-data export.
#[derive(Debug, Serialize)]
struct TrainingPair<'a> {
    source_text: &'a str,
    target_text: &'a str,
    source_language: &'a str,
    target_language: &'a str,
}

/// Kick off a model-improvement run when enough new transcripts have
/// accumulated above the quality gate.
///
/// The trainer runs detached; the pipeline response never waits on it.
/// Every failure here is logged and swallowed - training is opportunistic.
pub async fn maybe_trigger_training(store: Arc<TranscriptStore>, config: &Config) {
    if !config.training.enabled {
        return;
    }
    let Some(trainer_script) = config.tools.trainer_script.clone() else {
        return;
    };

    let eligible = match store.untrained_above(config.training.quality_gate) {
        Ok(eligible) => eligible,
        Err(e) => {
            tracing::warn!("Training selection failed: {:#}", e);
            return;
        }
    };

    if eligible.len() < config.training.min_examples {
        tracing::debug!(
            "Training deferred: {} eligible transcripts, need {}",
            eligible.len(),
            config.training.min_examples
        );
        return;
    }

    tracing::info!(
        "Triggering model improvement with {} transcripts",
        eligible.len()
    );

    let data_path = match write_training_data(&eligible, config).await {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("Failed to write training data: {:#}", e);
            return;
        }
    };

    let spawn_result = Command::new(&config.tools.python_path)
        .arg(&trainer_script)
        .arg(&data_path)
        .arg(&config.tools.model_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match spawn_result {
        Ok(_child) => {
            let ids: Vec<String> = eligible.iter().map(|t| t.id.clone()).collect();
            if let Err(e) = store.mark_trained(&ids) {
                tracing::warn!("Failed to mark transcripts as trained: {:#}", e);
            }
        }
        Err(e) => {
            tracing::warn!("Failed to spawn trainer: {:#}", e);
        }
    }
}

async fn write_training_data(
    transcripts: &[crate::store::Transcript],
    config: &Config,
) -> Result<std::path::PathBuf> {
    let pairs: Vec<TrainingPair> = transcripts
        .iter()
        .map(|t| TrainingPair {
            source_text: &t.transcript,
            target_text: &t.translation,
            source_language: &t.source_lang,
            target_language: &t.target_lang,
        })
        .collect();

    let dir = config.work_dir();
    fs_err::create_dir_all(&dir)?;
    let path = dir.join(format!(
        "training_data_{}.json",
        chrono::Utc::now().timestamp()
    ));
    fs_err::write(&path, serde_json::to_string_pretty(&pairs)?)?;

    Ok(path)
}
