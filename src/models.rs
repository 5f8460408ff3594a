use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// === Raw yt-dlp Models ===

/// The subset of `yt-dlp --dump-json` output we read. Every field is optional
/// because extractors for different sites fill in different things.
#[derive(Deserialize, Debug, Default)]
pub struct RawVideoInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnails: Option<Vec<RawThumbnail>>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub formats: Option<Vec<RawFormat>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RawThumbnail {
    #[serde(default)]
    pub url: Option<String>,
}

/// A single entry of the `formats` array.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub format_note: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
}

// === Normalized Models ===

/// The site a URL belongs to, derived from the URL alone.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Instagram,
    Facebook,
    Youtube,
    Twitter,
    Unknown,
}

impl Platform {
    /// Substring match in fixed priority order; the first hit wins.
    pub fn from_url(url: &str) -> Self {
        if url.contains("tiktok.com") {
            Platform::Tiktok
        } else if url.contains("instagram.com") {
            Platform::Instagram
        } else if url.contains("facebook.com") || url.contains("fb.watch") {
            Platform::Facebook
        } else if url.contains("youtube.com") || url.contains("youtu.be") {
            Platform::Youtube
        } else if url.contains("twitter.com") || url.contains("x.com") {
            Platform::Twitter
        } else {
            Platform::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Youtube => "youtube",
            Platform::Twitter => "twitter",
            Platform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized result of one metadata fetch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    /// Display string, e.g. "1:02:05".
    pub duration: String,
    pub author: String,
    pub platform: Platform,
    /// Ranked best first. Never empty.
    pub formats: Vec<VideoFormat>,
    pub original_url: String,
}

/// One entry of the presentable format menu.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoFormat {
    /// Token passed back to yt-dlp's `-f`, or "best".
    pub format_id: String,
    pub quality: String,
    pub ext: String,
    pub filesize: Option<u64>,
}

impl VideoFormat {
    pub const BEST_ID: &'static str = "best";

    /// Substituted when no format survives filtering.
    pub fn best() -> Self {
        Self {
            format_id: Self::BEST_ID.to_string(),
            quality: "Best".to_string(),
            ext: "mp4".to_string(),
            filesize: None,
        }
    }
}

// === Download & Session Models ===

/// What the caller asks the session to download.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// Video id or full URL, passed through to yt-dlp unchanged.
    pub target: String,
    pub format_id: String,
    pub destination: PathBuf,
}

/// A snapshot of an in-flight download. String fields hold "N/A" when the
/// line they came from did not carry them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub percent: f64,
    pub speed: String,
    pub eta: String,
    pub downloaded: String,
    pub total: String,
}

impl DownloadProgress {
    pub const NOT_AVAILABLE: &'static str = "N/A";

    /// The event emitted once when yt-dlp exits successfully.
    pub fn completed() -> Self {
        Self {
            percent: 100.0,
            speed: "0 B/s".to_string(),
            eta: "0:00".to_string(),
            downloaded: "Done".to_string(),
            total: "Done".to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

/// Externally observable lifecycle of a [`crate::session::DownloadSession`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running)
    }
}

/// How a download run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed,
    Cancelled,
}

/// Result of a successful `yt-dlp -U`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateReport {
    /// Combined stdout and stderr of the updater.
    pub message: String,
}
