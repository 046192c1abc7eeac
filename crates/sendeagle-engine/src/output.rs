use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use sendeagle_contracts::naming::date_subfolder;

/// Host folder type reported back with every saved image.
pub const OUTPUT_TYPE: &str = "output";

/// Date-partitioned directory for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub subfolder: String,
    pub dir: PathBuf,
}

impl OutputTarget {
    /// Resolves `<root>/<YYYY-MM-DD>` for `now` and creates it if missing.
    pub fn prepare(root: &Path, now: &DateTime<FixedOffset>) -> Result<Self> {
        let subfolder = date_subfolder(now);
        let dir = root.join(&subfolder);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output folder {}", dir.display()))?;
        Ok(Self { subfolder, dir })
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

/// Writes `bytes` to a file that must not exist yet.
pub fn write_new_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
