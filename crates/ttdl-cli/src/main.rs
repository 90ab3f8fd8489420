use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ttdl_core::{DownloadOptions, Outcome, Pipeline};

#[derive(Parser)]
#[command(
    name = "ttdl-rs-cli",
    version,
    about = "Download TikTok videos and photo galleries"
)]
struct Cli {
    /// TikTok video or photo URLs to download
    urls: Vec<String>,

    /// Text file containing URLs to download, one per line
    #[arg(long)]
    list_file: Option<PathBuf>,

    /// Archive file recording downloaded media ids, compatible with yt-dlp
    #[arg(long)]
    archive_file: Option<PathBuf>,

    /// Output name template. Available placeholders: %description%,
    /// %author_id%, %author_name%, %media_height%, %media_width%,
    /// %media_id%, %mod_time%, %country_code%, %url%
    #[arg(long)]
    output_name: String,

    /// How much stuff is logged
    #[arg(long, default_value = "warning", value_parser = ["debug", "info", "warning", "error"])]
    log_level: String,

    /// Path to the ffmpeg binary. By default taken from PATH.
    #[arg(long)]
    ffmpeg_path: Option<PathBuf>,

    /// Path to the exiftool binary. By default taken from PATH.
    #[arg(long)]
    exiftool_path: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // "warning" is the argparse spelling; tracing calls it "warn"
    let level = match cli.log_level.as_str() {
        "warning" => "warn",
        other => other,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .init();

    if cli.urls.is_empty() && cli.list_file.is_none() {
        bail!("no URL or list file was provided");
    }

    if let Some(archive_file) = &cli.archive_file {
        if archive_file.is_dir() {
            bail!("archive filepath is a directory: {}", archive_file.display());
        }
    }

    let mut url_list = Vec::new();
    if let Some(list_file) = &cli.list_file {
        if list_file.is_dir() {
            bail!("list filepath is a directory: {}", list_file.display());
        }
        let text = fs::read_to_string(list_file)
            .with_context(|| format!("could not read list file {}", list_file.display()))?;
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() {
                url_list.push(line.to_string());
            }
        }
    }
    url_list.extend(cli.urls.iter().map(|url| url.trim().to_string()));

    let options = DownloadOptions {
        output_name: cli.output_name,
        archive_file: cli.archive_file,
        ffmpeg_path: cli
            .ffmpeg_path
            .or_else(|| which::which("ffmpeg").ok()),
        exiftool_path: cli
            .exiftool_path
            .or_else(|| which::which("exiftool").ok()),
    };

    let pipeline = Pipeline::new(options)?;

    for url in &url_list {
        match pipeline.process(url)? {
            Outcome::AlreadyDownloaded(id) => println!("Already downloaded: {}", id),
            Outcome::Success(id) => println!("Download successful: {}", id),
            Outcome::Failed(Some(id)) => tracing::error!("Failed to download: {}", id),
            Outcome::Failed(None) => tracing::warn!("Skipping: {}", url),
        }
    }

    println!("\nAll done!");
    Ok(())
}
