use crate::error::{Error, Result};
use crate::formats::select_formats;
use crate::locator::BinaryLocation;
use crate::models::{Platform, RawVideoInfo, VideoInfo};
use std::process::{Output, Stdio};
use std::time::Duration;

/// Runs `yt-dlp --dump-json` for `url` and normalizes the result.
///
/// `timeout` is optional; without one the call waits as long as yt-dlp does.
pub async fn fetch_video_info(
    binary: &BinaryLocation,
    url: &str,
    timeout: Option<Duration>,
) -> Result<VideoInfo> {
    if url.trim().is_empty() {
        return Err(Error::InvalidUrl);
    }
    tracing::info!("Fetching video info for URL: {}", url);

    let mut cmd = binary.command();
    cmd.arg("--dump-json")
        .arg("--no-download")
        .arg("--no-playlist")
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|source| Error::ExecutableNotFound {
        binary: binary.to_string(),
        source,
    })?;

    let output: Output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            // the child is dropped with the future and killed
            .map_err(|_| Error::Timeout(limit.as_secs()))??,
        None => child.wait_with_output().await?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::error!("yt-dlp failed: {}", stderr);
        let message = if stderr.is_empty() {
            "could not fetch video information".to_string()
        } else {
            stderr
        };
        return Err(Error::InvocationFailed(message));
    }

    let raw: RawVideoInfo = serde_json::from_slice(&output.stdout)?;
    let info = normalize(raw, url);
    tracing::info!(
        "Fetched '{}' ({}, {} formats)",
        info.title,
        info.platform,
        info.formats.len()
    );
    Ok(info)
}

/// Maps the raw document onto [`VideoInfo`], filling defaults for anything
/// the extractor left out. The platform comes from `url` only.
pub fn normalize(raw: RawVideoInfo, url: &str) -> VideoInfo {
    let thumbnail = non_empty(raw.thumbnail)
        .or_else(|| {
            raw.thumbnails
                .unwrap_or_default()
                .into_iter()
                .next()
                .and_then(|t| non_empty(t.url))
        })
        .unwrap_or_default();
    let author = non_empty(raw.uploader)
        .or_else(|| non_empty(raw.channel))
        .unwrap_or_else(|| "Unknown".to_string());

    VideoInfo {
        id: raw.id.unwrap_or_default(),
        title: non_empty(raw.title).unwrap_or_else(|| "Untitled".to_string()),
        thumbnail,
        duration: format_duration(raw.duration),
        author,
        platform: Platform::from_url(url),
        formats: select_formats(raw.formats.as_deref().unwrap_or_default()),
        original_url: url.to_string(),
    }
}

/// `H:MM:SS` when the duration reaches an hour, `M:SS` otherwise.
/// Missing, zero, negative or non-finite input renders as `0:00`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s.floor() as u64,
        _ => return "0:00".to_string(),
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
