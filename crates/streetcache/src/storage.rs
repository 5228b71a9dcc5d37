//! Persistent panorama store: one JPEG file per location and heading.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use image::DynamicImage;

use crate::codec::{self, DEFAULT_JPEG_QUALITY};
use crate::types::{ImageRequest, Panorama, StreetResult};

/// Secondary cache consulted before the network.
///
/// `load` returns `Ok(None)` when nothing is stored under the request's key;
/// every other failure is an `Err`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn load(&self, request: &ImageRequest) -> StreetResult<Option<Panorama>>;

    async fn save(&self, request: &ImageRequest, image: &DynamicImage) -> StreetResult<()>;
}

/// Suffix counter for in-flight writes, unique within the process.
static PARTIAL_WRITES: AtomicU64 = AtomicU64::new(0);

/// Blob store backed by a directory of JPEG files.
///
/// Distinct keys map to distinct files, so concurrent access needs no locking
/// beyond what the filesystem provides.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
    quality: u8,
}

impl DiskStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StreetResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::debug!("Disk store at {}", dir.display());
        Ok(Self {
            dir,
            quality: DEFAULT_JPEG_QUALITY,
        })
    }

    /// Override the JPEG quality used by `save`.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds (or would hold) the panorama for `request`.
    pub fn path_for(&self, request: &ImageRequest) -> PathBuf {
        self.dir.join(format!("{}.jpg", request.store_key()))
    }
}

#[async_trait]
impl BlobStore for DiskStore {
    async fn load(&self, request: &ImageRequest) -> StreetResult<Option<Panorama>> {
        let path = self.path_for(request);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        codec::decode(&bytes).map(Some)
    }

    async fn save(&self, request: &ImageRequest, image: &DynamicImage) -> StreetResult<()> {
        let jpeg = codec::encode_jpeg(image, self.quality)?;
        let path = self.path_for(request);

        // Readers only ever see a missing file or a complete one.
        let partial = self.dir.join(format!(
            ".{}.{}.{}.part",
            request.store_key(),
            std::process::id(),
            PARTIAL_WRITES.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = tokio::fs::write(&partial, jpeg).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        Ok(())
    }
}
