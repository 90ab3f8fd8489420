use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Source tag recorded in front of every media id, yt-dlp convention.
pub const SOURCE_TAG: &str = "tiktok";

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The ledger exists but cannot be read. Fatal: without it the
    /// duplicate check cannot be trusted.
    #[error("could not read archive file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A record could not be appended. The download itself succeeded,
    /// so the caller logs and carries on.
    #[error("could not append to archive file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Check whether a media id was already recorded.
/// A missing ledger file means nothing was downloaded yet.
pub fn contains(path: &Path, media_id: &str) -> Result<bool, ArchiveError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(ArchiveError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let records: HashSet<&str> = text.lines().map(|line| line.trim()).collect();
    Ok(records.contains(format!("{} {}", SOURCE_TAG, media_id).as_str()))
}

/// Append one record for a finished download.
pub fn append(path: &Path, media_id: &str) -> Result<(), ArchiveError> {
    let write = |path: &Path| -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{} {}", SOURCE_TAG, media_id)
    };
    write(path).map_err(|e| ArchiveError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}
