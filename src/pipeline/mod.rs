use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::AudioDownloader;
use crate::config::Config;
use crate::progress::{ProgressSnapshot, ProgressStore};
use crate::resolver::{self, Platform};
use crate::store::cache::ResultCache;
use crate::store::{self, TranscriptStore};
use crate::text::{KeywordDetector, LanguageDetector};
use crate::training;
use crate::transcribe::Transcriber;
use crate::translate::{ProgressScale, TranslationRequest, TranslationStage};
use crate::Result;

/// Slice of the overall progress the translation stage occupies.
const TRANSLATION_SCALE: ProgressScale = ProgressScale { base: 70, span: 25 };

/// One pipeline run, identified for progress polling and cleanup.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub url: String,
    pub platform: Platform,
    pub target_lang: String,
    pub request_id: String,
}

impl PipelineRequest {
    /// Build a request, inferring the platform from the URL and minting a
    /// request id when the client did not send one.
    pub fn new(
        url: &str,
        platform_hint: Option<&str>,
        target_lang: &str,
        request_id: Option<String>,
    ) -> Self {
        let platform = match platform_hint {
            Some(hint) if !hint.trim().is_empty() => Platform::from_hint(hint),
            _ => Platform::detect(url),
        };

        Self {
            url: url.to_string(),
            platform,
            target_lang: target_lang.to_string(),
            request_id: request_id.unwrap_or_else(resolver::new_request_id),
        }
    }
}

/// Final product of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub request_id: String,
    pub video_id: String,
    pub url: String,
    pub title: String,
    pub transcript: String,
    pub translation: String,
    pub detected_language: String,
    pub target_language: String,
    pub audio_path: Option<PathBuf>,
    pub is_fallback_transcript: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The full URL-to-translation pipeline.
///
/// Every stage converts its own failures into a degraded-but-usable
/// result; only invalid input produces `success = false`. State shared
/// between requests (progress, result cache, transcript store) is keyed
/// per request, so concurrent runs do not interleave writes.
pub struct Pipeline {
    config: Config,
    downloader: AudioDownloader,
    transcriber: Transcriber,
    translation: TranslationStage,
    detector: Box<dyn LanguageDetector>,
    progress: Arc<dyn ProgressStore>,
    result_cache: Arc<ResultCache>,
    transcripts: Arc<TranscriptStore>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        progress: Arc<dyn ProgressStore>,
        result_cache: Arc<ResultCache>,
        transcripts: Arc<TranscriptStore>,
    ) -> Result<Self> {
        let downloader = AudioDownloader::new(&config.tools);
        let transcriber = Transcriber::new(&config.tools);
        let translation = TranslationStage::new(&config, progress.clone());

        Ok(Self {
            config,
            downloader,
            transcriber,
            translation,
            detector: Box::new(KeywordDetector::new()),
            progress,
            result_cache,
            transcripts,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_components(
        config: Config,
        downloader: AudioDownloader,
        transcriber: Transcriber,
        translation: TranslationStage,
        detector: Box<dyn LanguageDetector>,
        progress: Arc<dyn ProgressStore>,
        result_cache: Arc<ResultCache>,
        transcripts: Arc<TranscriptStore>,
    ) -> Self {
        Self {
            config,
            downloader,
            transcriber,
            translation,
            detector,
            progress,
            result_cache,
            transcripts,
        }
    }

    /// Run the pipeline to completion. Never returns an error; the result
    /// object carries any stage failures.
    pub async fn run(&self, request: PipelineRequest) -> PipelineResult {
        if let Err(e) = crate::utils::validate_and_normalize_url(&request.url) {
            return self.invalid_input(&request, &format!("{:#}", e));
        }

        // A fresh cached result short-circuits everything, including the
        // external tools.
        if let Some(mut cached) = self.result_cache.get(&request.url, &request.target_lang) {
            tracing::info!("Result cache hit for {}", request.url);
            cached.request_id = request.request_id.clone();
            self.report(&request, 100, "complete (cached)", None);
            return cached;
        }

        let video_id = resolver::resolve_video_id(&request.url, request.platform);
        self.report(&request, 5, "resolving video", Some(&video_id));

        let work_dir = self.config.work_dir();
        if let Err(e) = fs_err::create_dir_all(&work_dir) {
            // Without a work dir nothing downstream can run; degrade to the
            // fallback transcript path immediately.
            tracing::error!("Cannot create work dir {}: {}", work_dir.display(), e);
            return self
                .degraded_without_audio(&request, &video_id, None, &format!("work dir: {}", e))
                .await;
        }

        let title = self.probe_title(&request.url).await.unwrap_or_else(|| video_id.clone());

        self.report(&request, 10, "downloading audio", Some(&video_id));
        let download = self.downloader.download(&request.url, &video_id, &work_dir).await;

        if !download.success {
            let error = download
                .error
                .clone()
                .unwrap_or_else(|| "download failed".to_string());
            return self
                .degraded_without_audio(&request, &video_id, Some(download.audio_path), &error)
                .await;
        }

        self.report(&request, 40, "transcribing", Some(&video_id));
        let transcription = self.transcriber.transcribe(&download.audio_path).await;

        if !transcription.success {
            // Transcript-less but the audio survives for playback.
            let result = PipelineResult {
                success: true,
                request_id: request.request_id.clone(),
                video_id: video_id.clone(),
                url: request.url.clone(),
                title,
                transcript: String::new(),
                translation: String::new(),
                detected_language: String::new(),
                target_language: request.target_lang.clone(),
                audio_path: Some(download.audio_path),
                is_fallback_transcript: false,
                error: transcription
                    .error
                    .map(|e| crate::ScribeError::TranscriptionFailed(e).to_string()),
            };
            self.report(&request, 100, "complete (no transcript)", Some(&video_id));
            return result;
        }

        let detected_language = transcription
            .language
            .clone()
            .unwrap_or_else(|| self.detector.detect(&transcription.transcript));

        self.report(&request, 70, "translating", Some(&video_id));
        let translated = self
            .translation
            .translate(
                &TranslationRequest {
                    text: transcription.transcript.clone(),
                    source_lang: detected_language.clone(),
                    target_lang: request.target_lang.clone(),
                    request_id: request.request_id.clone(),
                },
                TRANSLATION_SCALE,
            )
            .await;

        self.report(&request, 95, "saving results", Some(&video_id));
        let result = PipelineResult {
            success: true,
            request_id: request.request_id.clone(),
            video_id: video_id.clone(),
            url: request.url.clone(),
            title: title.clone(),
            transcript: transcription.transcript.clone(),
            translation: translated.translation.clone(),
            detected_language: detected_language.clone(),
            target_language: request.target_lang.clone(),
            audio_path: Some(download.audio_path.clone()),
            is_fallback_transcript: transcription.is_fallback,
            error: None,
        };

        self.result_cache
            .insert(&request.url, &request.target_lang, result.clone());
        self.persist_transcript(&result, translated.provider);
        training::maybe_trigger_training(self.transcripts.clone(), &self.config).await;

        if !self.config.storage.keep_audio {
            let report = store::cleanup::cleanup_request(&work_dir, &video_id);
            tracing::debug!(
                "Post-run cleanup removed {} files",
                report.deleted_files
            );
        }

        self.report(&request, 100, "complete", Some(&video_id));
        result
    }

    /// Pipeline continuation when no audio could be fetched: the fallback
    /// transcript is translated best-effort so the caller still gets a
    /// fully-formed result, with the expected audio path reported.
    async fn degraded_without_audio(
        &self,
        request: &PipelineRequest,
        video_id: &str,
        expected_audio: Option<PathBuf>,
        detail: &str,
    ) -> PipelineResult {
        let error = crate::ScribeError::AudioDownloadFailed(detail.to_string()).to_string();
        tracing::warn!(
            "Continuing without audio for {} ({}): {}",
            request.url,
            video_id,
            error
        );

        let transcript = crate::transcribe::FALLBACK_TRANSCRIPT.to_string();
        self.report(request, 70, "translating", Some(video_id));
        let translated = self
            .translation
            .translate(
                &TranslationRequest {
                    text: transcript.clone(),
                    source_lang: "en".to_string(),
                    target_lang: request.target_lang.clone(),
                    request_id: request.request_id.clone(),
                },
                TRANSLATION_SCALE,
            )
            .await;

        let result = PipelineResult {
            success: true,
            request_id: request.request_id.clone(),
            video_id: video_id.to_string(),
            url: request.url.clone(),
            title: video_id.to_string(),
            transcript,
            translation: translated.translation,
            detected_language: "en".to_string(),
            target_language: request.target_lang.clone(),
            audio_path: expected_audio,
            is_fallback_transcript: true,
            error: Some(error.to_string()),
        };

        self.report(request, 100, "complete (no audio)", Some(video_id));
        result
    }

    fn invalid_input(&self, request: &PipelineRequest, detail: &str) -> PipelineResult {
        let error = crate::ScribeError::InvalidRequest(detail.to_string()).to_string();
        let mut snapshot = ProgressSnapshot::new(100, "failed");
        snapshot.error = Some(error.clone());
        self.progress.update(&request.request_id, snapshot);

        PipelineResult {
            success: false,
            request_id: request.request_id.clone(),
            video_id: String::new(),
            url: request.url.clone(),
            title: String::new(),
            transcript: String::new(),
            translation: String::new(),
            detected_language: String::new(),
            target_language: request.target_lang.clone(),
            audio_path: None,
            is_fallback_transcript: false,
            error: Some(error.to_string()),
        }
    }

    /// Ask yt-dlp for the video title. Best effort; the id stands in when
    /// metadata is unavailable.
    async fn probe_title(&self, url: &str) -> Option<String> {
        use std::process::Stdio;
        use tokio::process::Command;

        let child = Command::new(&self.config.tools.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", "--no-check-certificate", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .ok()?;

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            child.wait_with_output(),
        )
        .await
        .ok()?
        .ok()?;

        if !output.status.success() {
            return None;
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;
        info["title"].as_str().map(|s| s.to_string())
    }

    fn persist_transcript(&self, result: &PipelineResult, provider: crate::translate::ProviderKind) {
        if result.transcript.is_empty() {
            return;
        }

        let transcript = store::Transcript {
            id: result.video_id.clone(),
            url: result.url.clone(),
            title: result.title.clone(),
            transcript: result.transcript.clone(),
            translation: result.translation.clone(),
            source_lang: result.detected_language.clone(),
            target_lang: result.target_language.clone(),
            created_at: chrono::Utc::now(),
            quality: store::quality_for_provider(provider),
            used_for_training: false,
            training_date: None,
        };

        // Persistence failures never fail the user-facing response.
        if let Err(e) = self.transcripts.upsert(&transcript) {
            tracing::warn!("Failed to persist transcript {}: {:#}", transcript.id, e);
        }
    }

    fn report(&self, request: &PipelineRequest, percent: u8, step: &str, video_id: Option<&str>) {
        let mut snapshot = ProgressSnapshot::new(percent, step);
        snapshot.url = Some(request.url.clone());
        snapshot.video_id = video_id.map(|id| id.to_string());
        self.progress.update(&request.request_id, snapshot);
    }
}
