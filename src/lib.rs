//! Orchestration core for fetching video metadata and downloading media with
//! an external yt-dlp executable.
//!
//! [`Clipfetch`] is the entry point. It finds the executable
//! ([`locator`]), queries and normalizes metadata ([`metadata`],
//! [`formats`]), runs one download at a time with ordered progress events
//! ([`session`], [`progress`]) and runs yt-dlp's self-update ([`updater`]).

pub mod client;
pub mod config;
pub mod error;
pub mod formats;
pub mod locator;
pub mod metadata;
pub mod models;
pub mod progress;
pub mod session;
pub mod updater;

#[cfg(all(test, unix))]
mod test_support;

pub use client::Clipfetch;
pub use error::{Error, Result};
pub use locator::{BinaryLocation, PackagingContext};
pub use models::{
    DownloadOutcome, DownloadProgress, DownloadRequest, Platform, SessionState, UpdateReport,
    VideoFormat, VideoInfo,
};
pub use progress::{ProgressParser, YtDlpProgressParser};
pub use session::{DownloadHandle, DownloadSession, ProgressReceiver};
