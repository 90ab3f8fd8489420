use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use crate::media::{AssetSource, MediaDescriptor};

pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_MOD_TIME: &str = "mod_time";
pub const FIELD_AUTHOR_ID: &str = "author_id";
pub const FIELD_AUTHOR_NAME: &str = "author_name";
pub const FIELD_MEDIA_HEIGHT: &str = "media_height";
pub const FIELD_MEDIA_WIDTH: &str = "media_width";
pub const FIELD_MEDIA_ID: &str = "media_id";
pub const FIELD_COUNTRY_CODE: &str = "country_code";
pub const FIELD_URL: &str = "url";

const FIELD_NAMES: &[&str] = &[
    FIELD_DESCRIPTION,
    FIELD_MOD_TIME,
    FIELD_AUTHOR_ID,
    FIELD_AUTHOR_NAME,
    FIELD_MEDIA_HEIGHT,
    FIELD_MEDIA_WIDTH,
    FIELD_MEDIA_ID,
    FIELD_COUNTRY_CODE,
    FIELD_URL,
];

/// Filenames keep at most this many characters of the description and
/// author name.
const DESCRIPTION_MAX: usize = 190;
const AUTHOR_NAME_MAX: usize = 40;

static FIELD_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    FIELD_NAMES
        .iter()
        .map(|name| (*name, Regex::new(&format!("(?i)%{}%", name)).unwrap()))
        .collect()
});

/// Full-width look-alikes for characters the filesystem refuses.
const ILLEGAL_WINDOWS: &[(char, char)] = &[
    ('<', '\u{FE64}'),
    ('>', '\u{FE65}'),
    (':', '\u{FE55}'),
    ('"', '\u{FF02}'),
    ('/', '\u{FF0F}'),
    ('\\', '\u{FF3C}'),
    ('|', '\u{FF5C}'),
    ('?', '\u{FF1F}'),
    ('*', '\u{FF0A}'),
];
const ILLEGAL_UNIX: &[(char, char)] = &[('/', '\u{FF0F}')];

fn illegal_characters() -> &'static [(char, char)] {
    if cfg!(windows) {
        ILLEGAL_WINDOWS
    } else {
        ILLEGAL_UNIX
    }
}

/// Field values for the asset currently being named. Rebuilt per media
/// item and passed explicitly; galleries swap the dimensions per image.
#[derive(Debug, Clone, Default)]
pub struct TemplateFields {
    pub description: String,
    /// Epoch seconds, None when the upstream left it unset
    pub mod_time: Option<i64>,
    pub author_id: String,
    pub author_name: String,
    pub media_height: Option<u32>,
    pub media_width: Option<u32>,
    pub media_id: String,
    pub country_code: String,
    pub url: String,
}

impl TemplateFields {
    pub fn from_descriptor(descriptor: &MediaDescriptor) -> Self {
        Self {
            description: descriptor.description.clone(),
            mod_time: descriptor.timestamp(),
            author_id: descriptor.author_id.clone(),
            author_name: descriptor.author_name.clone(),
            media_height: descriptor.video.as_ref().and_then(|v| v.height),
            media_width: descriptor.video.as_ref().and_then(|v| v.width),
            media_id: descriptor.id.clone(),
            country_code: descriptor.region.clone(),
            url: descriptor.canonical_url.clone(),
        }
    }

    /// Swap in the dimensions of the gallery image being named.
    pub fn set_image_size(&mut self, source: &AssetSource) {
        self.media_height = source.height;
        self.media_width = source.width;
    }

    fn value(&self, field: &str) -> String {
        match field {
            FIELD_DESCRIPTION => truncate_chars(self.description.trim(), DESCRIPTION_MAX),
            FIELD_MOD_TIME => self.mod_time.map(|t| t.to_string()).unwrap_or_default(),
            FIELD_AUTHOR_ID => self.author_id.trim().to_string(),
            FIELD_AUTHOR_NAME => truncate_chars(self.author_name.trim(), AUTHOR_NAME_MAX),
            FIELD_MEDIA_HEIGHT => self.media_height.map(|v| v.to_string()).unwrap_or_default(),
            FIELD_MEDIA_WIDTH => self.media_width.map(|v| v.to_string()).unwrap_or_default(),
            FIELD_MEDIA_ID => self.media_id.clone(),
            FIELD_COUNTRY_CODE => self.country_code.clone(),
            FIELD_URL => self.url.clone(),
            _ => String::new(),
        }
    }
}

/// Expand every recognized %placeholder% not in `excluded` with its
/// sanitized field value. Unrecognized placeholders stay untouched, and
/// a render that comes out empty falls back to "_" so the result is
/// always a usable path component.
pub fn render(template: &str, fields: &TemplateFields, excluded: &[&str]) -> String {
    let mut name = template.to_string();

    for (field, pattern) in FIELD_PATTERNS.iter() {
        if excluded.contains(field) {
            continue;
        }
        let value = sanitize(&fields.value(field));
        name = pattern.replace_all(&name, NoExpand(&value)).into_owned();
    }

    let name = name.trim();
    if name.is_empty() {
        "_".to_string()
    } else {
        name.to_string()
    }
}

/// Replace filesystem-illegal characters with full-width look-alikes.
pub fn sanitize(value: &str) -> String {
    substitute(value, illegal_characters())
}

fn substitute(value: &str, map: &[(char, char)]) -> String {
    value
        .chars()
        .map(|c| {
            map.iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Find a free path by inserting _01, _02, ... before the extension.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let (stem, ext) = split_extension(
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("_"),
    );

    let mut pad = 1u32;
    loop {
        let candidate = parent.join(format!("{}_{:02}{}", stem, pad, ext));
        if !candidate.exists() {
            return candidate;
        }
        pad += 1;
    }
}

/// Split "name.ext" into ("name", ".ext"); the extension is empty when
/// the final component has none.
pub fn split_extension(name: &str) -> (String, String) {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) => (
            name[..name.len() - ext.len() - 1].to_string(),
            format!(".{}", ext),
        ),
        None => (name.to_string(), String::new()),
    }
}

/// Zero-pad width for gallery index suffixes: at least two digits, more
/// when the gallery is large enough to need them.
pub fn index_width(count: usize) -> usize {
    count.to_string().len().max(2)
}

/// Videos always end in .mp4; applied to the rendered name.
pub fn force_mp4(name: String) -> String {
    if name.to_lowercase().ends_with(".mp4") {
        name
    } else {
        name + ".mp4"
    }
}

/// Photos always end in .jpg; applied to the template before rendering
/// so gallery index suffixes land in front of the extension.
pub fn force_jpg(template: &str) -> String {
    match Path::new(template).extension().and_then(|e| e.to_str()) {
        None => format!("{}.jpg", template),
        Some(ext) if ext.eq_ignore_ascii_case("jpg") => template.to_string(),
        Some(ext) => format!("{}.jpg", &template[..template.len() - ext.len() - 1]),
    }
}
