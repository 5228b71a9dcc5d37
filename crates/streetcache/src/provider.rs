//! Street-level imagery provider: metadata lookup and image download.
//!
//! Both collaborators sit behind traits so the pipeline can run against any
//! backend. [`StreetViewClient`] implements them over HTTP for the Street View
//! Static API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{ImageRequest, Location, StreetError, StreetResult};

/// Default image size requested from the provider.
pub const DEFAULT_IMAGE_SIZE: &str = "1280x960";

const DEFAULT_METADATA_URL: &str = "https://maps.googleapis.com/maps/api/streetview/metadata";
const DEFAULT_IMAGE_URL: &str = "https://maps.googleapis.com/maps/api/streetview";

/// Snaps a raw coordinate to the canonical panorama location near it.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, location: Location) -> StreetResult<Location>;
}

/// Downloads the encoded image for a canonical location and heading.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, request: &ImageRequest) -> StreetResult<Vec<u8>>;
}

/// Connection settings for [`StreetViewClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
    pub metadata_url: String,
    pub image_url: String,
    pub image_size: String,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            image_url: DEFAULT_IMAGE_URL.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
        }
    }

    /// Point both endpoints at another host, e.g. a local mock server.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.metadata_url = format!("{base}/maps/api/streetview/metadata");
        self.image_url = format!("{base}/maps/api/streetview");
        self
    }
}

/// Metadata response for a panorama lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanoramaMetadata {
    pub status: String,
    pub location: Option<Location>,
    #[serde(default)]
    pub pano_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
}

impl PanoramaMetadata {
    /// The canonical location, if the lookup found a panorama.
    pub fn canonical_location(&self, queried: Location) -> StreetResult<Location> {
        if self.status != "OK" {
            return Err(StreetError::PanoramaUnavailable {
                location: queried,
                status: self.status.clone(),
            });
        }
        self.location.ok_or_else(|| {
            StreetError::MalformedMetadata(format!("status OK but no location for {queried}"))
        })
    }
}

/// HTTP client for the Street View Static API.
#[derive(Clone)]
pub struct StreetViewClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl StreetViewClient {
    pub fn new(config: ProviderConfig) -> StreetResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("streetcache/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Fetch the full metadata record for a raw location.
    pub async fn metadata(&self, location: Location) -> StreetResult<PanoramaMetadata> {
        let response = self
            .client
            .get(&self.config.metadata_url)
            .query(&[
                ("location", location.to_string()),
                ("key", self.config.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreetError::BadStatus {
                endpoint: "metadata",
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| StreetError::MalformedMetadata(e.to_string()))
    }
}

#[async_trait]
impl MetadataResolver for StreetViewClient {
    async fn resolve(&self, location: Location) -> StreetResult<Location> {
        let metadata = self.metadata(location).await?;
        tracing::debug!(
            "Resolved {} to pano {:?} ({:?})",
            location,
            metadata.pano_id,
            metadata.date
        );
        metadata.canonical_location(location)
    }
}

#[async_trait]
impl ImageSource for StreetViewClient {
    async fn fetch(&self, request: &ImageRequest) -> StreetResult<Vec<u8>> {
        let response = self
            .client
            .get(&self.config.image_url)
            .query(&[
                ("size", self.config.image_size.clone()),
                ("location", request.location.to_string()),
                ("heading", request.angle.to_string()),
                ("key", self.config.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreetError::BadStatus {
                endpoint: "image",
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
