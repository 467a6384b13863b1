use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Platforms the pipeline knows how to derive stable identifiers for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Facebook,
    TikTok,
    Instagram,
    Vimeo,
    Other,
}

impl Platform {
    /// Parse a platform hint as sent by clients ("youtube", "tiktok", ...)
    pub fn from_hint(hint: &str) -> Self {
        match hint.to_lowercase().as_str() {
            "youtube" => Platform::YouTube,
            "facebook" => Platform::Facebook,
            "tiktok" => Platform::TikTok,
            "instagram" => Platform::Instagram,
            "vimeo" => Platform::Vimeo,
            _ => Platform::Other,
        }
    }

    /// Infer the platform from the URL itself when no hint is given
    pub fn detect(url: &str) -> Self {
        let url_lower = url.to_lowercase();

        if url_lower.contains("youtube.com/") || url_lower.contains("youtu.be/") {
            Platform::YouTube
        } else if url_lower.contains("facebook.com/") || url_lower.contains("fb.watch/") {
            Platform::Facebook
        } else if url_lower.contains("tiktok.com/") {
            Platform::TikTok
        } else if url_lower.contains("instagram.com/") {
            Platform::Instagram
        } else if url_lower.contains("vimeo.com/") {
            Platform::Vimeo
        } else {
            Platform::Other
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Facebook => "Facebook",
            Platform::TikTok => "TikTok",
            Platform::Instagram => "Instagram",
            Platform::Vimeo => "Vimeo",
            Platform::Other => "Other",
        }
    }
}

static YOUTUBE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})(?:[?&/]|$)").unwrap());
static FACEBOOK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:/videos/|v=)(\d+)").unwrap());
static TIKTOK_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/video/(\d+)").unwrap());
static INSTAGRAM_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:p|reel|tv)/([0-9A-Za-z_-]+)").unwrap());
static VIMEO_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"vimeo\.com/(\d+)").unwrap());

/// Derive a stable, non-empty identifier for a video URL.
///
/// Platform-specific pattern extraction first; unmatched "other" URLs fall
/// back to an encoded form of the URL itself, and everything else falls
/// back to a timestamped id. The timestamped path is not collision-proof,
/// which is acceptable for its use as a last-resort key.
pub fn resolve_video_id(url: &str, platform: Platform) -> String {
    let url = url.trim();
    if url.is_empty() {
        return timestamp_id();
    }

    let pattern = match platform {
        Platform::YouTube => &*YOUTUBE_ID,
        Platform::Facebook => &*FACEBOOK_ID,
        Platform::TikTok => &*TIKTOK_ID,
        Platform::Instagram => &*INSTAGRAM_ID,
        Platform::Vimeo => &*VIMEO_ID,
        Platform::Other => {
            return encoded_url_id(url);
        }
    };

    if let Some(caps) = pattern.captures(url) {
        if let Some(id) = caps.get(1) {
            return id.as_str().to_string();
        }
    }

    tracing::debug!("No {} id pattern matched for {}", platform.name(), url);
    timestamp_id()
}

/// URL-keyed fallback id for unrecognized platforms: deterministic for the
/// same URL, short enough to be a filename.
fn encoded_url_id(url: &str) -> String {
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(url.as_bytes());
    let truncated: String = encoded.chars().take(16).collect();
    format!("v-{}", truncated)
}

fn timestamp_id() -> String {
    let suffix = &uuid::Uuid::new_v4().to_string()[..4];
    format!("v-{}-{}", chrono::Utc::now().timestamp_millis(), suffix)
}

/// Mint a request id carrying its creation time, so stale progress entries
/// can be swept without a separate bookkeeping table.
pub fn new_request_id() -> String {
    format!(
        "req-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        &uuid::Uuid::new_v4().to_string()[..8]
    )
}

/// Recover the creation time embedded in a request id, if it has one.
pub fn request_timestamp_millis(request_id: &str) -> Option<i64> {
    request_id
        .strip_prefix("req-")
        .and_then(|rest| rest.split('-').next())
        .and_then(|millis| millis.parse::<i64>().ok())
}
