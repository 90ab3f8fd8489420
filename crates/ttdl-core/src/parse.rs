use regex::Regex;
use std::sync::LazyLock;

static RE_VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://(?:www\.)*tiktok\.com/@[^?/]+/video/([0-9]+)(?:\?.+)?$").unwrap()
});
static RE_PHOTO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://(?:www\.)*tiktok\.com/@[^?/]+/photo/([0-9]+)(?:\?.+)?$").unwrap()
});
static RE_CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https://(?:www\.)*tiktok\.com/@[^?/]+)((?:/(?:video|photo)/[0-9]+)?)(?:\?.+)?$")
        .unwrap()
});

/// What kind of content a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Photo,
}

/// Content reference extracted from an input URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    /// Numeric media id as it appears in the URL
    pub id: String,
    /// Video post or photo gallery
    pub kind: MediaKind,
}

/// Extract the media id and content kind from a URL.
/// Returns None for anything that is not a video or photo content URL;
/// a matching account path without an id does not count.
pub fn parse(url: &str) -> Option<MediaReference> {
    if let Some(caps) = RE_VIDEO_ID.captures(url) {
        let id = caps.get(1)?.as_str();
        if !id.is_empty() {
            return Some(MediaReference {
                id: id.to_string(),
                kind: MediaKind::Video,
            });
        }
    }
    if let Some(caps) = RE_PHOTO_ID.captures(url) {
        let id = caps.get(1)?.as_str();
        if !id.is_empty() {
            return Some(MediaReference {
                id: id.to_string(),
                kind: MediaKind::Photo,
            });
        }
    }
    None
}

/// Strip query strings and tracking suffixes, keeping scheme + account path
/// + the optional /video/<id> or /photo/<id> suffix. This form is what gets
/// embedded as the source URL in tags and the %url% placeholder.
pub fn canonicalize(url: &str) -> Option<String> {
    let caps = RE_CANONICAL.captures(url)?;
    let account = caps.get(1)?.as_str();
    let content = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    Some(format!("{}{}", account, content))
}
