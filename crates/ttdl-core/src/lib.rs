pub mod api;
pub mod archive;
pub mod download;
pub mod media;
pub mod parse;
pub mod tag;
pub mod template;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::blocking::Client;

use crate::media::MediaDescriptor;
use crate::parse::MediaKind;
use crate::template::{TemplateFields, FIELD_MEDIA_HEIGHT, FIELD_MEDIA_WIDTH};

pub use crate::api::{ResolveError, Resolver};
pub use crate::archive::ArchiveError;
pub use crate::download::DownloadError;

/// Everything one run needs to know.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Output name template with %placeholders%
    pub output_name: String,
    /// yt-dlp compatible archive ledger; None disables the duplicate check
    pub archive_file: Option<PathBuf>,
    /// ffmpeg binary for video tagging; None skips it
    pub ffmpeg_path: Option<PathBuf>,
    /// exiftool binary for photo tagging; None skips it
    pub exiftool_path: Option<PathBuf>,
}

/// Terminal outcome of one input URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Resolved, downloaded and recorded
    Success(String),
    /// The archive ledger already lists this id
    AlreadyDownloaded(String),
    /// None: the URL itself was unparseable. Some: resolution or
    /// download failed for this id.
    Failed(Option<String>),
}

/// Sequences parse, archive check, resolution, download, tagging and
/// recording for each input URL.
pub struct Pipeline {
    options: DownloadOptions,
    client: Client,
    resolver: Resolver,
}

impl Pipeline {
    pub fn new(options: DownloadOptions) -> Result<Self> {
        let client = api::http_client().context("could not build HTTP client")?;
        let resolver = Resolver::new(client.clone());
        Ok(Self {
            options,
            client,
            resolver,
        })
    }

    /// Swap the resolver, endpoint order included.
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Run one URL through the pipeline.
    ///
    /// Per-item problems come back as `Outcome::Failed` and leave the
    /// rest of the run untouched. `Err` is reserved for conditions that
    /// invalidate the whole run: an unreadable archive ledger or a
    /// destination that cannot be created.
    pub fn process(&self, url: &str) -> Result<Outcome> {
        let Some(reference) = parse::parse(url) else {
            return Ok(Outcome::Failed(None));
        };
        let canonical =
            parse::canonicalize(url).unwrap_or_else(|| url.trim().to_string());

        if let Some(archive_path) = &self.options.archive_file {
            if archive::contains(archive_path, &reference.id)? {
                return Ok(Outcome::AlreadyDownloaded(reference.id));
            }
        }

        let post = match self.resolver.resolve(&reference.id) {
            Ok(post) => post,
            Err(e) => {
                tracing::error!("{}", e);
                return Ok(Outcome::Failed(Some(reference.id)));
            }
        };

        let descriptor = MediaDescriptor::from_post(post, canonical);
        let mut fields = TemplateFields::from_descriptor(&descriptor);

        let downloaded = match reference.kind {
            MediaKind::Video => self.download_video(&descriptor, &fields)?,
            MediaKind::Photo => self.download_gallery(&descriptor, &mut fields)?,
        };
        if !downloaded {
            return Ok(Outcome::Failed(Some(reference.id)));
        }

        if let Some(archive_path) = &self.options.archive_file {
            if let Err(e) = archive::append(archive_path, &reference.id) {
                tracing::error!("{} was downloaded but not recorded: {}", reference.id, e);
            }
        }

        Ok(Outcome::Success(reference.id))
    }

    /// Try the video mirrors in order until one of them lands on disk.
    fn download_video(&self, descriptor: &MediaDescriptor, fields: &TemplateFields) -> Result<bool> {
        let mirrors = descriptor
            .video
            .as_ref()
            .map(|v| v.urls.as_slice())
            .unwrap_or_default();
        if mirrors.is_empty() {
            tracing::error!("no video URLs found for {}", descriptor.id);
            return Ok(false);
        }

        let name = template::force_mp4(template::render(&self.options.output_name, fields, &[]));
        let dest = template::unique_path(Path::new(&name));

        for mirror in mirrors {
            match download::fetch(&self.client, mirror, &dest) {
                Ok(()) => {
                    if let Some(ffmpeg) = &self.options.ffmpeg_path {
                        if let Err(e) = tag::tag_video(ffmpeg, &dest, fields) {
                            tracing::error!("error adding tags to {}: {:#}", dest.display(), e);
                        }
                    }
                    download::restore_mtime(&dest, fields.mod_time);
                    return Ok(true);
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => tracing::warn!("{}", e),
            }
        }

        Ok(false)
    }

    /// Download every gallery image, each from its own mirror list in
    /// reverse order. The whole gallery must land for the item to count
    /// as downloaded; finished images stay on disk either way.
    fn download_gallery(
        &self,
        descriptor: &MediaDescriptor,
        fields: &mut TemplateFields,
    ) -> Result<bool> {
        let images = &descriptor.images;
        if images.is_empty() {
            tracing::error!("no image URLs found for {}", descriptor.id);
            return Ok(false);
        }

        let templ = template::force_jpg(&self.options.output_name);

        let mut targets: Vec<PathBuf> = Vec::with_capacity(images.len());
        if images.len() == 1 {
            fields.set_image_size(&images[0]);
            let name = template::render(&templ, fields, &[]);
            targets.push(template::unique_path(Path::new(&name)));
        } else {
            // Dimensions vary per image, so they are left in the shared
            // base name and substituted after the index suffix is known.
            let base = template::render(&templ, fields, &[FIELD_MEDIA_HEIGHT, FIELD_MEDIA_WIDTH]);
            let (stem, ext) = template::split_extension(&base);
            let width = template::index_width(images.len());

            for (i, image) in images.iter().enumerate() {
                fields.set_image_size(image);
                let stem = template::render(&stem, fields, &[]);
                let name = format!("{}_{:0width$}{}", stem, i + 1, ext, width = width);
                targets.push(template::unique_path(Path::new(&name)));
            }
        }

        let mut all_ok = true;
        for (image, dest) in images.iter().zip(targets.iter()) {
            fields.set_image_size(image);

            let mut ok = false;
            for mirror in image.urls.iter().rev() {
                match download::fetch(&self.client, mirror, dest) {
                    Ok(()) => {
                        if let Some(exiftool) = &self.options.exiftool_path {
                            if let Err(e) = tag::tag_photo(exiftool, dest, fields) {
                                tracing::error!(
                                    "error adding tags to {}: {:#}",
                                    dest.display(),
                                    e
                                );
                            }
                        }
                        download::restore_mtime(dest, fields.mod_time);
                        ok = true;
                        break;
                    }
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => tracing::warn!("{}", e),
                }
            }
            all_ok &= ok;
        }

        Ok(all_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::fs;
    use tempfile::tempdir;

    fn pipeline(server: &mockito::Server, options: DownloadOptions) -> Pipeline {
        let endpoints = vec![format!("{}/feed?aweme_id={{}}", server.url())];
        let resolver = Resolver::new(api::http_client().unwrap()).with_endpoints(endpoints);
        Pipeline::new(options).unwrap().with_resolver(resolver)
    }

    fn options(output_name: String, archive: Option<PathBuf>) -> DownloadOptions {
        DownloadOptions {
            output_name,
            archive_file: archive,
            ffmpeg_path: None,
            exiftool_path: None,
        }
    }

    fn video_feed(server: &mockito::Server, id: &str) -> String {
        serde_json::json!({
            "aweme_list": [{
                "aweme_id": id,
                "desc": "caption",
                "create_time": 1_600_000_000,
                "author": {"uid": "42", "unique_id": "author"},
                "region": "US",
                "video": {"play_addr": {
                    "url_list": [format!("{}/video.mp4", server.url())],
                    "width": 576,
                    "height": 1024
                }}
            }]
        })
        .to_string()
    }

    fn gallery_feed(server: &mockito::Server, id: &str, count: usize) -> String {
        let images: Vec<serde_json::Value> = (1..=count)
            .map(|i| {
                serde_json::json!({
                    "owner_watermark_image": {
                        // mirrors are tried in reverse order, so the
                        // preferred copy sits at the end of the list
                        "url_list": [
                            format!("{}/low/{}.jpg", server.url(), i),
                            format!("{}/img/{}.jpg", server.url(), i)
                        ],
                        "width": 1080,
                        "height": 1920 + i as u64
                    }
                })
            })
            .collect();
        serde_json::json!({
            "aweme_list": [{
                "aweme_id": id,
                "desc": "caption",
                "create_time": 1_600_000_000,
                "author": {"uid": "42", "unique_id": "author"},
                "region": "US",
                "image_post_info": {"images": images}
            }]
        })
        .to_string()
    }

    #[test]
    fn test_video_end_to_end() {
        let mut server = mockito::Server::new();
        let feed = video_feed(&server, "123");
        server
            .mock("GET", "/feed")
            .match_query(Matcher::Any)
            .with_body(feed)
            .create();
        server
            .mock("GET", "/video.mp4")
            .with_body(b"video bytes")
            .create();

        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("archive.txt");
        let template = format!("{}/%media_id%", dir.path().display());
        let p = pipeline(&server, options(template, Some(archive_path.clone())));

        let outcome = p.process("https://www.tiktok.com/@user/video/123").unwrap();
        assert_eq!(outcome, Outcome::Success("123".to_string()));

        let dest = dir.path().join("123.mp4");
        assert_eq!(fs::read(&dest).unwrap(), b"video bytes");
        assert_eq!(fs::read_to_string(&archive_path).unwrap(), "tiktok 123\n");
    }

    #[test]
    fn test_archived_id_is_skipped() {
        let mut server = mockito::Server::new();
        let feed = server
            .mock("GET", "/feed")
            .match_query(Matcher::Any)
            .expect(0)
            .create();

        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("archive.txt");
        fs::write(&archive_path, "tiktok 123\n").unwrap();

        let template = format!("{}/%media_id%", dir.path().display());
        let p = pipeline(&server, options(template, Some(archive_path)));

        let outcome = p.process("https://www.tiktok.com/@user/video/123").unwrap();
        assert_eq!(outcome, Outcome::AlreadyDownloaded("123".to_string()));
        assert!(!dir.path().join("123.mp4").exists());
        feed.assert();
    }

    #[test]
    fn test_gallery_end_to_end() {
        let mut server = mockito::Server::new();
        let feed = gallery_feed(&server, "123", 3);
        server
            .mock("GET", "/feed")
            .match_query(Matcher::Any)
            .with_body(feed)
            .create();
        for i in 1..=3 {
            server
                .mock("GET", format!("/img/{}.jpg", i).as_str())
                .with_body(format!("image {}", i))
                .create();
        }

        let dir = tempdir().unwrap();
        let template = format!("{}/%author_name%", dir.path().display());
        let p = pipeline(&server, options(template, None));

        let outcome = p.process("https://www.tiktok.com/@user/photo/123").unwrap();
        assert_eq!(outcome, Outcome::Success("123".to_string()));

        for i in 1..=3 {
            let dest = dir.path().join(format!("author_{:02}.jpg", i));
            assert_eq!(fs::read_to_string(&dest).unwrap(), format!("image {}", i));
        }
    }

    #[test]
    fn test_gallery_substitutes_per_image_dimensions() {
        let mut server = mockito::Server::new();
        let feed = gallery_feed(&server, "123", 2);
        server
            .mock("GET", "/feed")
            .match_query(Matcher::Any)
            .with_body(feed)
            .create();
        for i in 1..=2 {
            server
                .mock("GET", format!("/img/{}.jpg", i).as_str())
                .with_body(b"x")
                .create();
        }

        let dir = tempdir().unwrap();
        let template = format!("{}/%media_height%", dir.path().display());
        let p = pipeline(&server, options(template, None));

        let outcome = p.process("https://www.tiktok.com/@user/photo/123").unwrap();
        assert_eq!(outcome, Outcome::Success("123".to_string()));

        assert!(dir.path().join("1921_01.jpg").exists());
        assert!(dir.path().join("1922_02.jpg").exists());
    }

    #[test]
    fn test_single_photo_has_no_index_suffix() {
        let mut server = mockito::Server::new();
        let feed = gallery_feed(&server, "123", 1);
        server
            .mock("GET", "/feed")
            .match_query(Matcher::Any)
            .with_body(feed)
            .create();
        server.mock("GET", "/img/1.jpg").with_body(b"x").create();

        let dir = tempdir().unwrap();
        let template = format!("{}/%author_name%", dir.path().display());
        let p = pipeline(&server, options(template, None));

        let outcome = p.process("https://www.tiktok.com/@user/photo/123").unwrap();
        assert_eq!(outcome, Outcome::Success("123".to_string()));
        assert!(dir.path().join("author.jpg").exists());
    }

    #[test]
    fn test_unparseable_url_fails_without_id() {
        let server = mockito::Server::new();
        let dir = tempdir().unwrap();
        let template = format!("{}/%media_id%", dir.path().display());
        let p = pipeline(&server, options(template, None));

        let outcome = p.process("not-a-url").unwrap();
        assert_eq!(outcome, Outcome::Failed(None));
    }

    #[test]
    fn test_unresolvable_media_fails_with_id() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/feed")
            .match_query(Matcher::Any)
            .with_status(404)
            .create();

        let dir = tempdir().unwrap();
        let template = format!("{}/%media_id%", dir.path().display());
        let p = pipeline(&server, options(template, None));

        let outcome = p.process("https://www.tiktok.com/@user/video/123").unwrap();
        assert_eq!(outcome, Outcome::Failed(Some("123".to_string())));
    }

    #[test]
    fn test_existing_file_gets_padded_name() {
        let mut server = mockito::Server::new();
        let feed = video_feed(&server, "123");
        server
            .mock("GET", "/feed")
            .match_query(Matcher::Any)
            .with_body(feed)
            .create();
        server
            .mock("GET", "/video.mp4")
            .with_body(b"second")
            .create();

        let dir = tempdir().unwrap();
        let existing = dir.path().join("123.mp4");
        fs::write(&existing, b"first").unwrap();

        let template = format!("{}/%media_id%", dir.path().display());
        let p = pipeline(&server, options(template, None));

        let outcome = p.process("https://www.tiktok.com/@user/video/123").unwrap();
        assert_eq!(outcome, Outcome::Success("123".to_string()));
        assert_eq!(fs::read(&existing).unwrap(), b"first");
        assert_eq!(fs::read(dir.path().join("123_01.mp4")).unwrap(), b"second");
    }

    #[test]
    fn test_unreadable_archive_aborts_the_run() {
        let server = mockito::Server::new();
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("archive.txt");
        fs::create_dir(&archive_path).unwrap();

        let template = format!("{}/%media_id%", dir.path().display());
        let p = pipeline(&server, options(template, Some(archive_path)));

        assert!(p.process("https://www.tiktok.com/@user/video/123").is_err());
    }
}
