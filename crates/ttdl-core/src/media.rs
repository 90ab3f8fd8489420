use crate::api::{Aweme, MediaSource};

/// One downloadable asset: equivalent mirror URLs plus dimensions.
#[derive(Debug, Clone, Default)]
pub struct AssetSource {
    /// Mirror URLs for the same bytes
    pub urls: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl From<MediaSource> for AssetSource {
    fn from(source: MediaSource) -> Self {
        Self {
            urls: source.url_list,
            width: source.width,
            height: source.height,
        }
    }
}

/// Normalized record of a resolved media item. Absent upstream fields
/// degrade to empty strings or None, never to extraction failure.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    /// Media id, equal to the id it was resolved for
    pub id: String,
    pub description: String,
    /// Creation time in epoch seconds; 0 and absent both mean unknown
    pub created_at: Option<i64>,
    pub author_id: String,
    pub author_name: String,
    pub region: String,
    /// Canonicalized source URL, kept for tags and the %url% placeholder
    pub canonical_url: String,
    /// Video posts: the play address and its mirrors
    pub video: Option<AssetSource>,
    /// Photo posts: one entry per gallery image
    pub images: Vec<AssetSource>,
}

impl MediaDescriptor {
    pub fn from_post(post: Aweme, canonical_url: String) -> Self {
        let author = post.author.unwrap_or_default();
        Self {
            id: post.aweme_id,
            description: trimmed(post.desc),
            created_at: post.create_time,
            author_id: trimmed(author.uid),
            author_name: trimmed(author.unique_id),
            region: trimmed(post.region),
            canonical_url,
            video: post.video.and_then(|v| v.play_addr).map(AssetSource::from),
            images: post
                .image_post_info
                .map(|info| {
                    info.images
                        .into_iter()
                        .filter_map(|image| image.owner_watermark_image)
                        .map(AssetSource::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Creation timestamp usable for mtime/tagging, with the upstream
    /// "0 means unset" convention folded in.
    pub fn timestamp(&self) -> Option<i64> {
        self.created_at.filter(|t| *t != 0)
    }
}

fn trimmed(value: Option<String>) -> String {
    value.unwrap_or_default().trim().to_string()
}
