use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const BINARY_NAME: &str = "yt-dlp";

/// Where this process was deployed from. Used to build the list of places a
/// bundled yt-dlp may live.
#[derive(Debug, Clone, Default)]
pub struct PackagingContext {
    /// True for an installed build, false while developing. Only logged; the
    /// candidate order is the same either way.
    pub packaged: bool,
    /// The platform's packaged-resources directory, if any.
    pub resources_dir: Option<PathBuf>,
    /// Directory holding our own executable.
    pub module_dir: Option<PathBuf>,
    /// Additional directories from the user's config, tried last.
    pub extra_dirs: Vec<PathBuf>,
}

impl PackagingContext {
    /// Context for the running executable: `module_dir` is the directory of
    /// `current_exe`.
    pub fn current() -> Self {
        let module_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            module_dir,
            ..Default::default()
        }
    }

    /// Candidate paths in the order they are tried.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let bin = binary_file_name();
        let mut candidates = Vec::new();
        if let Some(resources) = &self.resources_dir {
            candidates.push(resources.join(bin));
        }
        if let Some(module_dir) = &self.module_dir {
            candidates.push(module_dir.join(bin));
        }
        if let Some(resources) = &self.resources_dir {
            candidates.push(resources.join("app").join("bin").join(bin));
            candidates.push(resources.join("app.unpacked").join("bin").join(bin));
        }
        candidates.extend(self.extra_dirs.iter().map(|dir| dir.join(bin)));
        candidates
    }
}

/// `yt-dlp.exe` on Windows, `yt-dlp` everywhere else.
pub fn binary_file_name() -> &'static str {
    if cfg!(windows) {
        "yt-dlp.exe"
    } else {
        BINARY_NAME
    }
}

/// The executable every invocation should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryLocation {
    /// A bundled copy found on disk.
    Bundled(PathBuf),
    /// Bare name, resolved through `PATH` when spawned.
    Search(String),
}

impl BinaryLocation {
    pub fn program(&self) -> &OsStr {
        match self {
            BinaryLocation::Bundled(path) => path.as_os_str(),
            BinaryLocation::Search(name) => OsStr::new(name),
        }
    }

    /// A fresh command for this executable.
    pub fn command(&self) -> Command {
        Command::new(self.program())
    }
}

impl fmt::Display for BinaryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryLocation::Bundled(path) => write!(f, "{}", path.display()),
            BinaryLocation::Search(name) => f.write_str(name),
        }
    }
}

/// Walks the candidate list and returns the first existing file, falling back
/// to the bare name. Never fails and never caches: a binary that shows up
/// later is found on the next call.
pub fn locate(context: &PackagingContext) -> BinaryLocation {
    for candidate in context.candidates() {
        if candidate.is_file() {
            tracing::debug!("Found yt-dlp at: {}", candidate.display());
            return BinaryLocation::Bundled(candidate);
        }
        tracing::debug!("No yt-dlp at: {}", candidate.display());
    }
    tracing::debug!(
        "No bundled yt-dlp (packaged: {}), using PATH lookup",
        context.packaged
    );
    BinaryLocation::Search(binary_file_name().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn falls_back_to_bare_name() {
        let dir = tempfile::tempdir().unwrap();
        let context = PackagingContext {
            packaged: true,
            resources_dir: Some(dir.path().to_path_buf()),
            module_dir: None,
            extra_dirs: vec![],
        };
        assert_eq!(
            locate(&context),
            BinaryLocation::Search(binary_file_name().to_string())
        );
    }

    #[test]
    fn resources_dir_wins_when_packaged() {
        let resources = tempfile::tempdir().unwrap();
        let module = tempfile::tempdir().unwrap();
        let in_resources = resources.path().join(binary_file_name());
        touch(&in_resources);
        touch(&module.path().join(binary_file_name()));

        let context = PackagingContext {
            packaged: true,
            resources_dir: Some(resources.path().to_path_buf()),
            module_dir: Some(module.path().to_path_buf()),
            extra_dirs: vec![],
        };
        assert_eq!(locate(&context), BinaryLocation::Bundled(in_resources));
    }

    #[test]
    fn packaged_flag_does_not_change_order() {
        let resources = tempfile::tempdir().unwrap();
        let module = tempfile::tempdir().unwrap();
        let bundled = resources.path().join(binary_file_name());
        touch(&bundled);
        touch(&module.path().join(binary_file_name()));

        for packaged in [false, true] {
            let context = PackagingContext {
                packaged,
                resources_dir: Some(resources.path().to_path_buf()),
                module_dir: Some(module.path().to_path_buf()),
                extra_dirs: vec![],
            };
            assert_eq!(locate(&context), BinaryLocation::Bundled(bundled.clone()));
            assert_eq!(
                context.candidates()[1],
                module.path().join(binary_file_name())
            );
        }
    }

    #[test]
    fn finds_unpacked_archive_copy() {
        let resources = tempfile::tempdir().unwrap();
        let unpacked = resources
            .path()
            .join("app.unpacked")
            .join("bin")
            .join(binary_file_name());
        touch(&unpacked);

        let context = PackagingContext {
            packaged: true,
            resources_dir: Some(resources.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(locate(&context), BinaryLocation::Bundled(unpacked));
    }

    #[test]
    fn picks_up_binary_that_appears_later() {
        let extra = tempfile::tempdir().unwrap();
        let context = PackagingContext {
            extra_dirs: vec![extra.path().to_path_buf()],
            ..Default::default()
        };
        assert!(matches!(locate(&context), BinaryLocation::Search(_)));

        let path = extra.path().join(binary_file_name());
        touch(&path);
        assert_eq!(locate(&context), BinaryLocation::Bundled(path));
    }
}
