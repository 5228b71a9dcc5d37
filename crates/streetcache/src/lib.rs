//! Streetcache: street-level panorama prefetching with a proximity cache.
//!
//! Raw (location, heading) requests are snapped to canonical panoramas and
//! fetched across a window of headings; position queries are answered with
//! the nearest cached panorama.

pub mod cache;
pub mod codec;
pub mod expander;
pub mod exporter;
pub mod fetcher;
pub mod pipeline;
pub mod provider;
pub mod storage;
pub mod types;

pub use cache::ProximityCache;
pub use expander::{angle_window, RequestExpander, DEFAULT_ANGLE_TOLERANCE};
pub use exporter::Exporter;
pub use fetcher::{FetchOutcome, FetchReport, Fetcher};
pub use pipeline::{Pipeline, PipelineConfig};
pub use provider::{ImageSource, MetadataResolver, PanoramaMetadata, ProviderConfig, StreetViewClient};
pub use storage::{BlobStore, DiskStore};
pub use types::*;
