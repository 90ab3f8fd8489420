use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;

/// Only bodies at least this large get a progress bar.
const PROGRESS_THRESHOLD: u64 = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request for {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
    /// The destination itself cannot be created. Unlike the transport
    /// variants this means the environment is broken, not the item.
    #[error("could not create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stream to {} interrupted: {source}", path.display())]
    Stream {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    /// True for failures no later media item can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DownloadError::Create { .. })
    }
}

/// Stream `url` into `dest`, creating parent directories as needed.
/// The caller is responsible for handing in a collision-free path; an
/// interrupted stream removes the partial file before reporting, so no
/// partial artifact survives a failure.
pub fn fetch(client: &Client, url: &str, dest: &Path) -> Result<(), DownloadError> {
    let mut response = client.get(url).send().map_err(|e| DownloadError::Network {
        url: url.to_string(),
        source: e,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status,
        });
    }

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| DownloadError::Create {
                path: dest.to_path_buf(),
                source: e,
            })?;
        }
    }
    let file = File::create(dest).map_err(|e| DownloadError::Create {
        path: dest.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    let bar = response
        .content_length()
        .filter(|len| *len >= PROGRESS_THRESHOLD)
        .map(|len| {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            bar
        });

    let copied = match &bar {
        Some(bar) => io::copy(&mut bar.wrap_read(&mut response), &mut writer),
        None => io::copy(&mut response, &mut writer),
    };
    let flushed = copied.and_then(|_| writer.flush());

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if let Err(e) = flushed {
        drop(writer);
        fs::remove_file(dest).ok();
        return Err(DownloadError::Stream {
            path: dest.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}

/// Set the file's modification time to the media's creation time.
/// Skipped for unset timestamps; failure is logged and swallowed, a
/// wrong mtime is not worth losing the download over.
pub fn restore_mtime(path: &Path, timestamp: Option<i64>) {
    let Some(secs) = timestamp.filter(|t| *t != 0) else {
        return;
    };
    let mtime = FileTime::from_unix_time(secs, 0);
    if let Err(e) = filetime::set_file_mtime(path, mtime) {
        tracing::warn!(
            "could not restore modification time of {}: {}",
            path.display(),
            e
        );
    }
}
