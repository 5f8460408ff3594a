//! Stand-in yt-dlp executables for process-level tests.

use crate::locator::{binary_file_name, BinaryLocation};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

/// Writes `body` as an executable `/bin/sh` script named like yt-dlp into a
/// fresh temp dir. Keep the `TempDir` alive for as long as the binary is used.
pub fn fake_downloader(body: &str) -> (TempDir, BinaryLocation) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(binary_file_name());
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    (dir, BinaryLocation::Bundled(path))
}
