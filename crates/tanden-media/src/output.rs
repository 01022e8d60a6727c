//! Output directory naming and claiming.
//!
//! Each run writes into a fresh `<basename>_<YYYYMMDD_HHMMSS>` directory under
//! the downloads root. The directory is created non-recursively so two runs
//! that land on the same name in the same second cannot share it; the loser
//! retries with `_1`, `_2`, ... appended.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Suffix for the dimmed overlay output.
pub const PROCESSED_SUFFIX: &str = "_processed.mp4";

/// Suffix for the skeleton-only output.
pub const SKELETON_SUFFIX: &str = "_skeletonOnly.mp4";

/// Give up after this many suffixed attempts.
const MAX_CLAIM_ATTEMPTS: u32 = 1000;

/// Paths of one run's output directory and its two videos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub dir: PathBuf,
    pub processed_path: PathBuf,
    pub skeleton_path: PathBuf,
}

impl OutputLayout {
    /// Claim a fresh output directory for `input` using the current local time.
    pub fn claim(root: &Path, input: &Path) -> MediaResult<Self> {
        Self::claim_at(root, input, Local::now())
    }

    /// Claim a fresh output directory for `input` stamped with `now`.
    ///
    /// Creates `root` if it does not exist yet.
    pub fn claim_at(root: &Path, input: &Path, now: DateTime<Local>) -> MediaResult<Self> {
        let base = base_name(input)?;
        std::fs::create_dir_all(root)?;

        let stem = dir_name(&base, now);
        for attempt in 0..MAX_CLAIM_ATTEMPTS {
            let name = if attempt == 0 {
                stem.clone()
            } else {
                format!("{stem}_{attempt}")
            };
            let dir = root.join(&name);

            match std::fs::create_dir(&dir) {
                Ok(()) => {
                    debug!(dir = %dir.display(), "Claimed output directory");
                    return Ok(Self::in_dir(dir, &base));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(MediaError::Io(e)),
            }
        }

        Err(MediaError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("No free output directory for {stem} under {}", root.display()),
        )))
    }

    fn in_dir(dir: PathBuf, base: &str) -> Self {
        Self {
            processed_path: dir.join(format!("{base}{PROCESSED_SUFFIX}")),
            skeleton_path: dir.join(format!("{base}{SKELETON_SUFFIX}")),
            dir,
        }
    }
}

/// Input file name without its extension.
pub fn base_name(input: &Path) -> MediaResult<String> {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MediaError::InvalidVideo(format!("No file name in {}", input.display())))
}

/// `<base>_<YYYYMMDD_HHMMSS>`.
pub fn dir_name(base: &str, now: DateTime<Local>) -> String {
    format!("{}_{}", base, now.format("%Y%m%d_%H%M%S"))
}
