use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

/// Ordered API endpoints, best first. `{}` is the media id slot.
pub const API_ENDPOINTS: &[&str] = &[
    "https://api19-core-c-useast1a.musical.ly/aweme/v1/feed/?aweme_id={}",
    "https://api16-normal-c-useast1a.tiktokv.com/aweme/v1/feed/?aweme_id={}",
    "https://api31-normal-useast2a.tiktokv.com/aweme/v1/aweme/detail/?aweme_id={}",
];

/// Fixed app-identity query parameters appended to every API request.
const API_QUERY: &str = "&version_code=330304&app_name=musical_ly&channel=App&device_id=null\
&os_version=16.6&device_platform=iphone&device_type=iPhone15";

/// Client identity sent with every request, API and media alike.
pub const USER_AGENT: &str = "com.ss.android.ugc.33.3.4/330304 (Linux; U; Android 13; en_US; \
Pixel 7; Build/TD1A.220804.031; Cronet/58.0.2991.0)";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared blocking client with the fixed identity and a bounded timeout.
pub fn http_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Endpoints answered but none produced a verified record.
    #[error("no API endpoint returned a record for media id {0}")]
    NotFound(String),
    /// Every endpoint failed at the transport level.
    #[error("no API endpoint was reachable for media id {0}")]
    Network(String),
}

/// Top-level feed/detail payload.
#[derive(Debug, Default, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub aweme_list: Vec<Aweme>,
}

/// One post record as the API reports it. Endpoints are known to omit
/// fields freely, so everything except the id is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Aweme {
    #[serde(default)]
    pub aweme_id: String,
    pub desc: Option<String>,
    pub create_time: Option<i64>,
    pub author: Option<Author>,
    pub region: Option<String>,
    pub video: Option<Video>,
    pub image_post_info: Option<ImagePostInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    pub uid: Option<String>,
    pub unique_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Video {
    pub play_addr: Option<MediaSource>,
}

/// A list of equivalent mirrors plus the dimensions they serve.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaSource {
    #[serde(default)]
    pub url_list: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagePostInfo {
    #[serde(default)]
    pub images: Vec<ImagePost>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImagePost {
    pub owner_watermark_image: Option<MediaSource>,
}

/// Resolves a media id against an ordered endpoint list.
pub struct Resolver {
    client: Client,
    endpoints: Vec<String>,
}

impl Resolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoints: API_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Replace the endpoint list, keeping its order as the priority order.
    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Try each endpoint in order and return the first record whose id
    /// matches the requested one. Endpoints sometimes answer with stale or
    /// empty payloads, so the identity check is what ends the fallback,
    /// not a successful response.
    pub fn resolve(&self, media_id: &str) -> Result<Aweme, ResolveError> {
        let mut reached_any = false;

        for endpoint in &self.endpoints {
            let url = format!("{}{}", endpoint.replace("{}", media_id), API_QUERY);

            let response = match self.client.get(&url).send() {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("API request to {} failed: {}", endpoint, e);
                    continue;
                }
            };
            reached_any = true;

            let status = response.status();
            if !status.is_success() {
                tracing::warn!("error getting API data for {}, status code {}", media_id, status);
                continue;
            }

            let text = match response.text() {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("error reading API response for {}: {}", media_id, e);
                    continue;
                }
            };

            let feed: FeedResponse = match serde_json::from_str(&text) {
                Ok(feed) => feed,
                Err(e) => {
                    tracing::warn!("error decoding API response for {}: {}", media_id, e);
                    continue;
                }
            };

            let Some(post) = feed.aweme_list.into_iter().next() else {
                tracing::debug!("{} returned an empty record list for {}", endpoint, media_id);
                continue;
            };
            if post.aweme_id != media_id {
                tracing::warn!(
                    "{} answered with id {} instead of {}, discarding",
                    endpoint,
                    post.aweme_id,
                    media_id
                );
                continue;
            }

            return Ok(post);
        }

        if reached_any {
            Err(ResolveError::NotFound(media_id.to_string()))
        } else {
            Err(ResolveError::Network(media_id.to_string()))
        }
    }
}
