//! Fetch stage: make sure each canonical request has an image in the cache.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::cache::ProximityCache;
use crate::codec;
use crate::provider::ImageSource;
use crate::storage::BlobStore;
use crate::types::{ImageRequest, StreetResult};

/// Where a fetched image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Already in the proximity cache; nothing fetched.
    Cached,
    /// Loaded from the persistent store.
    Stored,
    /// Downloaded from the provider and written to the store.
    Downloaded,
}

/// Counters for one fetch worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub skipped: usize,
    pub from_store: usize,
    pub from_network: usize,
    pub failed: usize,
}

impl FetchReport {
    fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Cached => self.skipped += 1,
            FetchOutcome::Stored => self.from_store += 1,
            FetchOutcome::Downloaded => self.from_network += 1,
        }
    }

    /// Requests that ended with an image in the cache.
    pub fn succeeded(&self) -> usize {
        self.skipped + self.from_store + self.from_network
    }
}

/// Second pipeline stage.
pub struct Fetcher {
    cache: Arc<ProximityCache>,
    source: Arc<dyn ImageSource>,
    store: Arc<dyn BlobStore>,
}

impl Fetcher {
    pub fn new(
        cache: Arc<ProximityCache>,
        source: Arc<dyn ImageSource>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            cache,
            source,
            store,
        }
    }

    /// Ensure `request` is cached: store first, then the network.
    pub async fn fetch(&self, request: ImageRequest) -> StreetResult<FetchOutcome> {
        if self.cache.has(&request).await {
            return Ok(FetchOutcome::Cached);
        }

        let (image, outcome) = match self.store.load(&request).await? {
            Some(image) => (image, FetchOutcome::Stored),
            None => {
                let bytes = self.source.fetch(&request).await?;
                let image = codec::decode(&bytes)?;
                self.store.save(&request, &image).await?;
                (image, FetchOutcome::Downloaded)
            }
        };

        self.cache.add(request, image).await;
        Ok(outcome)
    }

    /// Worker loop. A failed request is logged and skipped; the loop only ends
    /// when `input` is closed and drained.
    pub async fn run(self, mut input: UnboundedReceiver<ImageRequest>) -> FetchReport {
        tracing::info!("Fetcher started");
        let mut report = FetchReport::default();

        while let Some(request) = input.recv().await {
            match self.fetch(request).await {
                Ok(outcome) => {
                    tracing::debug!(
                        "{} heading {}: {outcome:?}",
                        request.location,
                        request.angle
                    );
                    report.record(outcome);
                }
                Err(e) => {
                    tracing::warn!(
                        "Fetch failed for {} heading {}: {e}",
                        request.location,
                        request.angle
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Fetcher stopped: {} cached, {} from store, {} downloaded, {} failed",
            report.skipped,
            report.from_store,
            report.from_network,
            report.failed
        );
        report
    }
}
