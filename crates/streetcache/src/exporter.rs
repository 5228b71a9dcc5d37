//! Export stage: answer live position queries from the proximity cache.

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::cache::ProximityCache;
use crate::types::{ImageRequest, Panorama};

/// Third pipeline stage. Emits exactly one result per query, in order;
/// `None` means nothing suitable is cached yet.
pub struct Exporter {
    cache: Arc<ProximityCache>,
}

impl Exporter {
    pub fn new(cache: Arc<ProximityCache>) -> Self {
        Self { cache }
    }

    pub async fn run(
        self,
        mut input: UnboundedReceiver<ImageRequest>,
        output: UnboundedSender<Option<Panorama>>,
    ) {
        tracing::info!("Exporter started");

        while let Some(query) = input.recv().await {
            let image = self.cache.get_and_clean(&query).await;
            tracing::debug!(
                "Position {} heading {}: {}",
                query.location,
                query.angle,
                if image.is_some() { "hit" } else { "miss" }
            );
            if output.send(image).is_err() {
                tracing::warn!("Image stream closed, stopping exporter");
                return;
            }
        }

        tracing::info!("Exporter stopped");
    }
}
