use std::io;
use thiserror::Error;

// Every failure the core can report. Cancellation is not in here: a cancelled
// download resolves to `DownloadOutcome::Cancelled` instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("URL cannot be empty")]
    InvalidUrl,

    /// The metadata query could not be spawned at all.
    #[error("downloader not found ({binary}): {source}")]
    ExecutableNotFound {
        binary: String,
        #[source]
        source: io::Error,
    },

    /// yt-dlp ran and exited non-zero. Carries its stderr.
    #[error("yt-dlp error: {0}")]
    InvocationFailed(String),

    #[error("could not parse video information: {0}")]
    MetadataParseFailed(#[from] serde_json::Error),

    #[error("yt-dlp did not finish within {0}s")]
    Timeout(u64),

    #[error("a download is already running")]
    SessionBusy,

    #[error("could not run downloader: {source}")]
    DownloaderUnavailable {
        #[source]
        source: io::Error,
    },

    #[error("download failed ({})", describe_exit(.code))]
    DownloadFailed { code: Option<i32> },

    #[error("update failed: {0}")]
    UpdateFailed(String),

    #[error("could not run updater: {source}")]
    UpdaterUnavailable {
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
