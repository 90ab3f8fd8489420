use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use chrono::DateTime;

use crate::template::TemplateFields;

/// Rewrite the container tags of a finished video with ffmpeg. The tags
/// are written into a `-temp` sibling with the streams copied, and the
/// original is only replaced once ffmpeg has succeeded.
pub fn tag_video(ffmpeg: &Path, file: &Path, fields: &TemplateFields) -> Result<()> {
    let temp = temp_sibling(file);

    let mut metadata = vec![
        ("comment", fields.url.clone()),
        ("purl", fields.url.clone()),
        ("description", fields.description.clone()),
        ("synopsis", fields.description.clone()),
        ("artist", fields.author_name.clone()),
        ("country", fields.country_code.clone()),
    ];
    if let Some(date) = format_timestamp(fields.mod_time, "%Y%m%d") {
        metadata.push(("date", date));
    }

    let mut cmd = Command::new(ffmpeg);
    cmd.arg("-i")
        .arg(file)
        .args(["-movflags", "use_metadata_tags", "-map_metadata", "0"]);
    for (key, value) in &metadata {
        cmd.arg("-metadata").arg(format!("{}={}", key, value));
    }
    cmd.args(["-c", "copy", "-y"]).arg(&temp);

    let status = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("could not run ffmpeg at {}", ffmpeg.display()))?;

    if !status.success() {
        fs::remove_file(&temp).ok();
        bail!("ffmpeg exited with {} while tagging {}", status, file.display());
    }

    fs::remove_file(file)?;
    fs::rename(&temp, file)?;
    Ok(())
}

/// Embed EXIF tags into a finished photo with exiftool.
/// `-overwrite_original` makes exiftool replace the file atomically, so
/// a failed run leaves the downloaded photo as it was.
pub fn tag_photo(exiftool: &Path, file: &Path, fields: &TemplateFields) -> Result<()> {
    let mut cmd = Command::new(exiftool);
    cmd.arg("-overwrite_original")
        .arg(format!("-ImageDescription={}", fields.description))
        .arg(format!("-Artist={}", fields.author_name))
        .arg(format!("-UserComment={}", fields.url));
    if let Some(datetime) = format_timestamp(fields.mod_time, "%Y:%m:%d %H:%M:%S") {
        cmd.arg(format!("-DateTimeOriginal={}", datetime));
        cmd.arg(format!("-CreateDate={}", datetime));
    }
    cmd.arg(file);

    let status = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("could not run exiftool at {}", exiftool.display()))?;

    if !status.success() {
        bail!(
            "exiftool exited with {} while tagging {}",
            status,
            file.display()
        );
    }
    Ok(())
}

fn temp_sibling(file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("download");
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    file.with_file_name(format!("{}-temp{}", stem, ext))
}

/// UTC-render an epoch timestamp; 0 and absent both mean "no date".
fn format_timestamp(timestamp: Option<i64>, format: &str) -> Option<String> {
    let secs = timestamp.filter(|t| *t != 0)?;
    DateTime::from_timestamp(secs, 0).map(|dt| dt.format(format).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_sibling() {
        assert_eq!(
            temp_sibling(Path::new("/tmp/clip.mp4")),
            Path::new("/tmp/clip-temp.mp4")
        );
        assert_eq!(temp_sibling(Path::new("clip")), Path::new("clip-temp"));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(Some(1_600_000_000), "%Y%m%d").as_deref(),
            Some("20200913")
        );
        assert_eq!(
            format_timestamp(Some(1_600_000_000), "%Y:%m:%d %H:%M:%S").as_deref(),
            Some("2020:09:13 12:26:40")
        );
        assert!(format_timestamp(Some(0), "%Y%m%d").is_none());
        assert!(format_timestamp(None, "%Y%m%d").is_none());
    }
}
