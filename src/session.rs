use crate::error::{Error, Result};
use crate::locator::BinaryLocation;
use crate::models::{DownloadOutcome, DownloadProgress, DownloadRequest, SessionState, VideoFormat};
use crate::progress::{ProgressParser, YtDlpProgressParser};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::SplitStream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Format selector used when the caller picks the "best" entry.
const BEST_SELECTOR: &str = "best[ext=mp4]/best";
/// How long a cancelled child gets to exit on SIGTERM before it is killed.
const KILL_GRACE: Duration = Duration::from_secs(10);
const STDERR_TAIL_LINES: usize = 20;
pub const DEFAULT_PROGRESS_BUFFER: usize = 32;

#[derive(Default)]
struct SessionInner {
    state: SessionState,
    /// Bumped on every successful spawn so late settlements from an older run
    /// cannot overwrite a newer one.
    generation: u64,
    /// Present exactly while `state` is `Running`.
    active: Option<ActiveRun>,
}

struct ActiveRun {
    cancel: CancellationToken,
}

/// Owns at most one running yt-dlp download.
///
/// Cloning gives another handle to the same session. A second `start` while a
/// run is `Running` is rejected with [`Error::SessionBusy`]; after `cancel`
/// the session accepts a new run immediately, even if the old child has not
/// exited yet.
#[derive(Clone)]
pub struct DownloadSession {
    inner: Arc<Mutex<SessionInner>>,
    parser: Arc<dyn ProgressParser>,
    buffer: usize,
}

impl Default for DownloadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadSession {
    pub fn new() -> Self {
        Self::with_parser(Arc::new(YtDlpProgressParser), DEFAULT_PROGRESS_BUFFER)
    }

    /// `buffer` is the capacity of the progress channel; the stdout reader
    /// blocks once it is full.
    pub fn with_parser(parser: Arc<dyn ProgressParser>, buffer: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner::default())),
            parser,
            buffer: buffer.max(1),
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Spawns yt-dlp for `request` and returns a handle to its progress and
    /// outcome. Must be called from within a tokio runtime.
    pub fn start(&self, binary: &BinaryLocation, request: &DownloadRequest) -> Result<DownloadHandle> {
        let mut inner = self.lock();
        if inner.state.is_running() {
            tracing::warn!("Rejecting download of {}: session busy", request.target);
            return Err(Error::SessionBusy);
        }

        let mut cmd = binary.command();
        cmd.args(download_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                tracing::error!("Failed to start {}: {}", binary, source);
                inner.state = SessionState::Failed;
                return Err(Error::DownloaderUnavailable { source });
            }
        };
        tracing::info!(
            "Started download of {} (format {}) into {}",
            request.target,
            request.format_id,
            request.destination.display()
        );

        inner.generation += 1;
        let cancel = CancellationToken::new();
        inner.state = SessionState::Running;
        inner.active = Some(ActiveRun {
            cancel: cancel.clone(),
        });
        let run = Run {
            inner: self.inner.clone(),
            generation: inner.generation,
            parser: self.parser.clone(),
            cancel: cancel.clone(),
        };
        drop(inner);

        let (tx, rx) = mpsc::channel(self.buffer);
        let task = tokio::spawn(run.drive(child, tx));
        Ok(DownloadHandle {
            progress: ProgressReceiver { rx, cancel },
            task,
        })
    }

    /// Requests cancellation of the running download and releases it at once.
    /// Returns false (and does nothing) when nothing is running.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        match inner.active.take() {
            Some(run) => {
                run.cancel.cancel();
                inner.state = SessionState::Cancelling;
                tracing::info!("Download cancelled");
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The argument vector for one download.
pub fn download_args(request: &DownloadRequest) -> Vec<OsString> {
    let selector = if request.format_id == VideoFormat::BEST_ID {
        BEST_SELECTOR
    } else {
        request.format_id.as_str()
    };
    let template = request.destination.join("%(title)s.%(ext)s");

    let mut args: Vec<OsString> = Vec::with_capacity(12);
    for arg in ["-f", selector, "--merge-output-format", "mp4", "--no-playlist", "-o"] {
        args.push(arg.into());
    }
    args.push(template.into_os_string());
    args.push("--progress".into());
    args.push("--newline".into());
    args.push(request.target.as_str().into());
    args
}

/// A started download: its progress events and its eventual outcome.
pub struct DownloadHandle {
    pub progress: ProgressReceiver,
    task: JoinHandle<Result<DownloadOutcome>>,
}

impl DownloadHandle {
    /// Waits for the run to settle. A cancelled run resolves to
    /// `Ok(DownloadOutcome::Cancelled)` without waiting for the child.
    ///
    /// Undelivered progress events are discarded.
    pub async fn wait(self) -> Result<DownloadOutcome> {
        let DownloadHandle { progress, task } = self;
        // with the receiver gone the reader stops waiting for channel space
        drop(progress);
        match task.await {
            Ok(result) => result,
            Err(e) => Err(Error::Io(io::Error::new(io::ErrorKind::Other, e))),
        }
    }

    /// Feeds every progress event to `on_progress`, in order, then waits for
    /// the outcome.
    pub async fn run<F>(mut self, mut on_progress: F) -> Result<DownloadOutcome>
    where
        F: FnMut(DownloadProgress),
    {
        while let Some(event) = self.progress.recv().await {
            on_progress(event);
        }
        self.wait().await
    }
}

/// Ordered progress events of one run. Yields nothing more once the run has
/// been cancelled, including events that were already queued.
pub struct ProgressReceiver {
    rx: mpsc::Receiver<DownloadProgress>,
    cancel: CancellationToken,
}

impl ProgressReceiver {
    pub async fn recv(&mut self) -> Option<DownloadProgress> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }
}

/// Everything the background task needs to drive one child to completion.
struct Run {
    inner: Arc<Mutex<SessionInner>>,
    generation: u64,
    parser: Arc<dyn ProgressParser>,
    cancel: CancellationToken,
}

enum Step {
    Line(Option<io::Result<Vec<u8>>>),
    Cancelled,
}

impl Run {
    async fn drive(self, mut child: Child, tx: mpsc::Sender<DownloadProgress>) -> Result<DownloadOutcome> {
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(collect_stderr(stderr)));

        if let Some(stdout) = child.stdout.take() {
            // raw lines: yt-dlp echoes file names that need not be UTF-8
            let mut lines = SplitStream::new(BufReader::new(stdout).split(b'\n'));
            loop {
                let step = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Step::Cancelled,
                    line = lines.next() => Step::Line(line),
                };
                let line = match step {
                    Step::Cancelled => return Ok(self.abandon(child)),
                    Step::Line(Some(Ok(bytes))) => decode_line(&bytes),
                    Step::Line(Some(Err(e))) => {
                        tracing::warn!("Failed to read yt-dlp output: {}", e);
                        break;
                    }
                    Step::Line(None) => break,
                };
                let Some(event) = self.parser.parse_line(&line) else {
                    continue;
                };
                // one event in flight at a time keeps the stream ordered
                let delivered = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    sent = tx.send(event) => Some(sent.is_ok()),
                };
                match delivered {
                    None => return Ok(self.abandon(child)),
                    Some(false) => tracing::trace!("Progress receiver dropped"),
                    Some(true) => {}
                }
            }
        }

        let status = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = status else {
            return Ok(self.abandon(child));
        };
        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        match status {
            Ok(status) if status.success() => {
                if !self.settle(SessionState::Completed) {
                    return Ok(DownloadOutcome::Cancelled);
                }
                let _ = tx.send(DownloadProgress::completed()).await;
                tracing::info!("Download completed");
                Ok(DownloadOutcome::Completed)
            }
            Ok(status) => {
                if !self.settle(SessionState::Failed) {
                    return Ok(DownloadOutcome::Cancelled);
                }
                tracing::error!("Download failed ({}): {}", status, stderr_tail.trim());
                Err(Error::DownloadFailed { code: status.code() })
            }
            Err(e) => {
                if !self.settle(SessionState::Failed) {
                    return Ok(DownloadOutcome::Cancelled);
                }
                tracing::error!("Failed to wait for yt-dlp: {}", e);
                Err(Error::Io(e))
            }
        }
    }

    /// Moves this run to a terminal state. Returns false when the run was
    /// cancelled (or superseded) in the meantime, in which case the outcome
    /// must not be reported.
    fn settle(&self, outcome: SessionState) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.generation != self.generation {
            return false;
        }
        match inner.state {
            SessionState::Running => {
                inner.state = outcome;
                inner.active = None;
                true
            }
            SessionState::Cancelling => {
                inner.state = SessionState::Cancelled;
                false
            }
            _ => false,
        }
    }

    /// Signals the child and leaves reaping to a background task.
    fn abandon(self, mut child: Child) -> DownloadOutcome {
        terminate(&mut child);
        tokio::spawn(async move {
            match tokio::time::timeout(KILL_GRACE, child.wait()).await {
                Ok(status) => tracing::debug!("Cancelled yt-dlp exited: {:?}", status),
                Err(_) => {
                    tracing::warn!("yt-dlp ignored SIGTERM for {:?}, killing", KILL_GRACE);
                    let _ = child.kill().await;
                }
            }
            self.settle(SessionState::Cancelled);
        });
        DownloadOutcome::Cancelled
    }
}

/// SIGTERM on Unix so yt-dlp can clean up its part files; a hard kill
/// elsewhere.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: pid is our own child and has not been reaped yet
            if unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } == 0 {
                return;
            }
        }
    }
    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to kill yt-dlp: {}", e);
    }
}

/// Logs stderr as it arrives and keeps the last few lines for the failure
/// message.
async fn collect_stderr(stderr: ChildStderr) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(stderr).split(b'\n');
    loop {
        let line = match lines.next_segment().await {
            Ok(Some(bytes)) => decode_line(&bytes),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read yt-dlp stderr: {}", e);
                break;
            }
        };
        tracing::debug!("yt-dlp stderr: {}", line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}

/// Lossy UTF-8 decoding of one output line, without a trailing `\r`.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
