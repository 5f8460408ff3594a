use crate::error::{Error, Result};
use crate::locator::BinaryLocation;
use crate::models::UpdateReport;
use std::process::Stdio;

/// Runs `yt-dlp -U` and returns everything it printed.
///
/// yt-dlp replaces its own file while updating, so running this during a
/// download may fail or race on platforms that lock running executables.
/// Nothing here prevents that.
pub async fn update_binary(binary: &BinaryLocation) -> Result<UpdateReport> {
    tracing::info!("Updating yt-dlp at: {}", binary);

    let output = binary
        .command()
        .arg("-U")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| Error::UpdaterUnavailable { source })?;

    let mut message = String::from_utf8_lossy(&output.stdout).into_owned();
    message.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        tracing::info!("yt-dlp update finished: {}", message.trim());
        Ok(UpdateReport { message })
    } else {
        tracing::error!("yt-dlp update failed: {}", message.trim());
        Err(Error::UpdateFailed(message))
    }
}
