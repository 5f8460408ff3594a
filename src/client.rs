use crate::error::Result;
use crate::locator::{locate, BinaryLocation, PackagingContext};
use crate::metadata::fetch_video_info;
use crate::models::{DownloadRequest, SessionState, UpdateReport, VideoInfo};
use crate::session::{DownloadHandle, DownloadSession};
use crate::updater::update_binary;
use std::time::Duration;

/// The operations a front end needs: fetch info, download, cancel, update.
///
/// The yt-dlp location is resolved again on every call so that a binary that
/// appears (or is replaced by an update) while we run is used straight away.
#[derive(Clone)]
pub struct Clipfetch {
    context: PackagingContext,
    session: DownloadSession,
    metadata_timeout: Option<Duration>,
}

impl Clipfetch {
    pub fn new(context: PackagingContext) -> Self {
        Self::with_session(context, DownloadSession::new())
    }

    pub fn with_session(context: PackagingContext, session: DownloadSession) -> Self {
        Self {
            context,
            session,
            metadata_timeout: None,
        }
    }

    pub fn metadata_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    pub fn locate(&self) -> BinaryLocation {
        locate(&self.context)
    }

    pub async fn fetch_video_info(&self, url: &str) -> Result<VideoInfo> {
        fetch_video_info(&self.locate(), url, self.metadata_timeout).await
    }

    pub fn start_download(&self, request: &DownloadRequest) -> Result<DownloadHandle> {
        self.session.start(&self.locate(), request)
    }

    pub fn cancel_download(&self) -> bool {
        self.session.cancel()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub async fn update_downloader_binary(&self) -> Result<UpdateReport> {
        if self.session.state().is_running() {
            tracing::warn!("Updating yt-dlp while a download is running");
        }
        update_binary(&self.locate()).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::locator::binary_file_name;
    use crate::models::{DownloadOutcome, Platform};
    use crate::test_support::fake_downloader;
    use std::fs;

    fn context_for(binary: &BinaryLocation) -> PackagingContext {
        let BinaryLocation::Bundled(path) = binary else {
            panic!("fake downloader is always bundled");
        };
        PackagingContext {
            packaged: true,
            resources_dir: path.parent().map(|p| p.to_path_buf()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fetch_info_end_to_end() {
        let (_dir, binary) = fake_downloader(
            r#"cat <<'EOF'
{"id": "7", "title": "Dance", "duration": 3725, "uploader": "someone",
 "formats": [{"format_id": "h264_540", "vcodec": "h264", "ext": "mp4", "height": 540}]}
EOF"#,
        );
        let client = Clipfetch::new(context_for(&binary));

        let info = client
            .fetch_video_info("https://www.tiktok.com/@someone/video/7")
            .await
            .unwrap();
        assert_eq!(info.platform, Platform::Tiktok);
        assert_eq!(info.duration, "1:02:05");
        assert_eq!(info.formats[0].quality, "540p");

        let info = client.fetch_video_info("https://example.org/v/7").await.unwrap();
        assert_eq!(info.platform, Platform::Unknown);
    }

    #[tokio::test]
    async fn picks_up_replaced_binary_without_restart() {
        let (dir, binary) = fake_downloader("echo old; exit 1");
        let client = Clipfetch::new(context_for(&binary));
        assert!(client.update_downloader_binary().await.is_err());

        let path = dir.path().join(binary_file_name());
        fs::write(&path, "#!/bin/sh\necho new\n").unwrap();
        let report = client.update_downloader_binary().await.unwrap();
        assert_eq!(report.message.trim(), "new");
    }

    #[tokio::test]
    async fn download_and_cancel_through_facade() {
        let (_dir, binary) = fake_downloader("exec sleep 30");
        let client = Clipfetch::new(context_for(&binary));
        let request = DownloadRequest {
            target: "abc".to_string(),
            format_id: "best".to_string(),
            destination: std::env::temp_dir(),
        };

        let handle = client.start_download(&request).unwrap();
        assert!(matches!(client.start_download(&request), Err(Error::SessionBusy)));
        assert!(client.cancel_download());
        assert_eq!(handle.wait().await.unwrap(), DownloadOutcome::Cancelled);
        assert!(!client.cancel_download());
    }
}
