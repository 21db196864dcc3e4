//! The manifest: a newline-delimited list of live SSTable filenames.
//!
//! Creation order is significant — the last line is the newest table and
//! wins ties on the read path. The manifest is the ground truth at
//! startup; table files it does not mention are ignored.

use anyhow::Result;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Handle to the manifest file. Cheap to construct; every operation
/// opens, works, and closes.
pub struct Manifest {
    path: PathBuf,
}

impl Manifest {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Reads the table list in creation order.
    ///
    /// A missing manifest means a fresh engine: the list is empty. Blank
    /// lines are skipped.
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Appends one filename as a new last line, durably.
    pub fn append(&self, filename: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", filename)?;
        file.sync_all()?;
        Ok(())
    }

    /// Rewrites the full list, atomically.
    ///
    /// Writes a temp file, fsyncs it, renames it over the manifest, then
    /// fsyncs the directory, so a crash leaves either the old list or the
    /// new one — never a partial file.
    pub fn replace(&self, filenames: &[String]) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            for filename in filenames {
                writeln!(file, "{}", filename)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        if let Some(dir) = self.path.parent() {
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }
}

/// Derives the next L0 table number from manifest entries: one greater
/// than the largest number carried by any `L0_00{n}.sst` entry, starting
/// at 1 for a fresh engine. Entries without an L0 number (the compaction
/// output) contribute nothing.
pub fn next_table_number(entries: &[String]) -> u32 {
    entries
        .iter()
        .filter_map(|name| {
            name.strip_prefix("L0_00")?
                .strip_suffix(".sst")?
                .parse::<u32>()
                .ok()
        })
        .max()
        .unwrap_or(0)
        + 1
}
