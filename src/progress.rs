use crate::models::DownloadProgress;
use once_cell::sync::Lazy;
use regex::Regex;

static PERCENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?P<percent>\d+\.?\d*)%").unwrap());

static SPEED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<speed>\d+\.?\d*\s*[KMG]?i?B/s)").unwrap());

static ETA_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"ETA\s+(?P<eta>\d+:\d+)").unwrap());

static SIZE_PAIR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<downloaded>\d+\.?\d*[KMG]?i?B)\s*/\s*(?P<total>\d+\.?\d*[KMG]?i?B)").unwrap()
});

/// Turns one line of downloader output into a progress event.
///
/// Implementations must return `None` for any line they do not recognize as
/// progress; the session drops those lines silently.
pub trait ProgressParser: Send + Sync {
    fn parse_line(&self, line: &str) -> Option<DownloadProgress>;
}

/// Parser for yt-dlp's `--progress --newline` output, e.g.
/// `[download]  43.2% of 120.50MiB at 3.21MiB/s ETA 00:45`.
///
/// A line needs a percent token to count; every other field is looked up on
/// its own and reported as "N/A" when absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct YtDlpProgressParser;

impl ProgressParser for YtDlpProgressParser {
    fn parse_line(&self, line: &str) -> Option<DownloadProgress> {
        let percent: f64 = PERCENT_REGEX
            .captures(line)?
            .name("percent")?
            .as_str()
            .parse()
            .ok()?;

        let capture = |regex: &Regex, name: &str| {
            regex
                .captures(line)
                .and_then(|caps| caps.name(name).map(|m| m.as_str().to_string()))
                .unwrap_or_else(|| DownloadProgress::NOT_AVAILABLE.to_string())
        };

        let (downloaded, total) = match SIZE_PAIR_REGEX.captures(line) {
            Some(caps) => (caps["downloaded"].to_string(), caps["total"].to_string()),
            None => (
                DownloadProgress::NOT_AVAILABLE.to_string(),
                DownloadProgress::NOT_AVAILABLE.to_string(),
            ),
        };

        Some(DownloadProgress {
            percent,
            speed: capture(&SPEED_REGEX, "speed"),
            eta: capture(&ETA_REGEX, "eta"),
            downloaded,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<DownloadProgress> {
        YtDlpProgressParser.parse_line(line)
    }

    #[test]
    fn parses_typical_progress_line() {
        let event = parse("  43.2% of 120.50MiB at 3.21MiB/s ETA 00:45").unwrap();
        assert_eq!(event.percent, 43.2);
        assert_eq!(event.speed, "3.21MiB/s");
        assert_eq!(event.eta, "00:45");
        assert_eq!(event.downloaded, "N/A");
        assert_eq!(event.total, "N/A");
    }

    #[test]
    fn parses_download_prefixed_line() {
        let event = parse("[download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)").unwrap();
        assert_eq!(event.percent, 6.2);
        assert_eq!(event.speed, "420.30KiB/s");
        assert_eq!(event.eta, "12:32");
    }

    #[test]
    fn extracts_size_pair() {
        let event = parse("[download]  50.0% 10.00MiB / 20.00MiB at 1.00MiB/s ETA 0:10").unwrap();
        assert_eq!(event.downloaded, "10.00MiB");
        assert_eq!(event.total, "20.00MiB");
        assert_eq!(event.speed, "1.00MiB/s");
        assert_eq!(event.eta, "0:10");
    }

    #[test]
    fn missing_fields_are_not_available() {
        let event = parse("[download] 100% of 5.00MiB").unwrap();
        assert_eq!(event.percent, 100.0);
        assert_eq!(event.speed, "N/A");
        assert_eq!(event.eta, "N/A");
        assert_eq!(event.downloaded, "N/A");
    }

    #[test]
    fn unknown_eta_is_not_available() {
        let event = parse("[download]  1.0% of 5.00MiB at 1.00KiB/s ETA Unknown").unwrap();
        assert_eq!(event.eta, "N/A");
    }

    #[test]
    fn ignores_lines_without_percent() {
        assert!(parse("[youtube] dQw4w9WgXcQ: Downloading webpage").is_none());
        assert!(parse("WARNING: falling back to generic extractor").is_none());
        assert!(parse("[Merger] Merging formats into \"video.mp4\"").is_none());
        assert!(parse("").is_none());
    }
}
