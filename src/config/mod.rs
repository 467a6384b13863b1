use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// External tool invocation settings
    pub tools: ToolsConfig,

    /// Translation provider settings
    pub translation: TranslationConfig,

    /// Filesystem layout
    pub storage: StorageConfig,

    /// In-memory resource cache bounds
    pub cache: CacheConfig,

    /// Local-model improvement settings
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the API server binds to
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// yt-dlp executable
    pub yt_dlp_path: String,

    /// Python interpreter used for the helper scripts
    pub python_path: String,

    /// whisper CLI executable
    pub whisper_path: String,

    /// whisper model name passed to the CLI
    pub whisper_model: String,

    /// Fallback downloader script (optional)
    pub downloader_script: Option<PathBuf>,

    /// Structured transcriber script (optional; the whisper CLI is always
    /// available as the second strategy)
    pub transcriber_script: Option<PathBuf>,

    /// Local translation model script (optional; remote-only without it)
    pub translator_script: Option<PathBuf>,

    /// Model improvement script (optional; training disabled without it)
    pub trainer_script: Option<PathBuf>,

    /// Directory holding the local model weights
    pub model_dir: PathBuf,

    /// Seconds before a download attempt is killed
    pub download_timeout_secs: u64,

    /// Seconds before a transcription attempt is killed
    pub transcribe_timeout_secs: u64,

    /// Seconds before a local-model translation is killed
    pub translate_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Official-interface web translation endpoint
    pub primary_endpoint: String,

    /// Unofficial fallback endpoint
    pub fallback_endpoint: String,

    /// Maximum characters per translation request
    pub chunk_size: usize,

    /// Pause between chunk requests, to stay under informal rate limits
    pub inter_chunk_delay_ms: u64,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,

    /// Target language when the client does not specify one
    pub default_target_lang: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Working directory for downloaded media (None = system temp)
    pub work_dir: Option<PathBuf>,

    /// Directory for persisted transcripts
    pub transcript_dir: PathBuf,

    /// Keep audio files after the pipeline completes
    pub keep_audio: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Resource cache bound in bytes
    pub resource_max_size_bytes: usize,

    /// Resource cache entry TTL in hours
    pub resource_ttl_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Trigger model improvement after new transcripts accumulate
    pub enabled: bool,

    /// Minimum transcript quality to enter the training set
    pub quality_gate: u8,

    /// Minimum number of eligible transcripts before a run is triggered
    pub min_examples: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: "127.0.0.1:3000".to_string(),
            },
            tools: ToolsConfig {
                yt_dlp_path: "yt-dlp".to_string(),
                python_path: "python3".to_string(),
                whisper_path: "whisper".to_string(),
                whisper_model: "base".to_string(),
                downloader_script: None,
                transcriber_script: None,
                translator_script: None,
                trainer_script: None,
                model_dir: PathBuf::from("models/nllb"),
                download_timeout_secs: 300,
                transcribe_timeout_secs: 600,
                translate_timeout_secs: 600,
            },
            translation: TranslationConfig {
                primary_endpoint: "https://translate.googleapis.com/translate_a/single"
                    .to_string(),
                fallback_endpoint: "https://clients5.google.com/translate_a/t".to_string(),
                chunk_size: 5000,
                inter_chunk_delay_ms: 300,
                request_timeout_secs: 30,
                default_target_lang: "he".to_string(),
            },
            storage: StorageConfig {
                work_dir: None,
                transcript_dir: PathBuf::from("data/transcripts"),
                keep_audio: true,
            },
            cache: CacheConfig {
                resource_max_size_bytes: 50 * 1024 * 1024,
                resource_ttl_hours: 24,
            },
            training: TrainingConfig {
                enabled: false,
                quality_gate: crate::store::TRAINING_QUALITY_GATE,
                min_examples: 5,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("videoscribe").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.translation.chunk_size == 0 {
            anyhow::bail!("translation.chunk_size must be at least 1");
        }

        if self.tools.download_timeout_secs == 0 || self.tools.transcribe_timeout_secs == 0 {
            anyhow::bail!("tool timeouts must be non-zero");
        }

        if self.training.enabled && self.tools.trainer_script.is_none() {
            anyhow::bail!("training.enabled requires tools.trainer_script");
        }

        Ok(())
    }

    /// Resolve the media working directory, defaulting to the system temp.
    pub fn work_dir(&self) -> PathBuf {
        self.storage
            .work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("videoscribe"))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Bind Address: {}", self.server.bind_addr);
        println!("  yt-dlp: {}", self.tools.yt_dlp_path);
        println!("  Whisper: {} (model {})", self.tools.whisper_path, self.tools.whisper_model);
        println!(
            "  Local model script: {}",
            self.tools
                .translator_script
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(remote translation only)".to_string())
        );
        println!("  Work Dir: {}", self.work_dir().display());
        println!("  Transcript Dir: {}", self.storage.transcript_dir.display());
        println!("  Keep Audio: {}", self.storage.keep_audio);
        println!("  Default Target Language: {}", self.translation.default_target_lang);
        println!("  Training Enabled: {}", self.training.enabled);
    }
}
