//! Pipeline wiring: expander -> fetcher -> cache <- exporter.
//!
//! Two inbound lanes (raw requests, position queries) and one outbound lane
//! (images). Each stage is a tokio task joined by unbounded channels; closing
//! a lane lets its consumer drain and close the next channel in turn.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::cache::ProximityCache;
use crate::expander::{RequestExpander, DEFAULT_ANGLE_TOLERANCE};
use crate::exporter::Exporter;
use crate::fetcher::{FetchReport, Fetcher};
use crate::provider::{ImageSource, MetadataResolver};
use crate::storage::BlobStore;
use crate::types::{ImageRequest, Panorama, StreetError, StreetResult};

/// Tunables for the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Width of the heading window fetched around each raw request.
    pub angle_tolerance: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            angle_tolerance: DEFAULT_ANGLE_TOLERANCE,
        }
    }
}

/// Handle to a running pipeline.
pub struct Pipeline {
    requests: Option<UnboundedSender<ImageRequest>>,
    positions: Option<UnboundedSender<ImageRequest>>,
    images: UnboundedReceiver<Option<Panorama>>,
    cache: Arc<ProximityCache>,
    expander: Option<JoinHandle<()>>,
    fetcher: Option<JoinHandle<FetchReport>>,
    exporter: Option<JoinHandle<()>>,
    report: FetchReport,
}

impl Pipeline {
    /// Start all three stages on the current tokio runtime.
    pub fn spawn(
        config: PipelineConfig,
        resolver: Arc<dyn MetadataResolver>,
        source: Arc<dyn ImageSource>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        let cache = Arc::new(ProximityCache::new());

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (positions_tx, positions_rx) = mpsc::unbounded_channel();
        let (images_tx, images_rx) = mpsc::unbounded_channel();

        let expander = RequestExpander::new(resolver, config.angle_tolerance);
        let fetcher = Fetcher::new(cache.clone(), source, store);
        let exporter = Exporter::new(cache.clone());

        Self {
            requests: Some(requests_tx),
            positions: Some(positions_tx),
            images: images_rx,
            cache,
            expander: Some(tokio::spawn(expander.run(requests_rx, fetch_tx))),
            fetcher: Some(tokio::spawn(fetcher.run(fetch_rx))),
            exporter: Some(tokio::spawn(exporter.run(positions_rx, images_tx))),
            report: FetchReport::default(),
        }
    }

    /// Queue a raw request for expansion and prefetching.
    pub fn submit(&self, request: ImageRequest) -> StreetResult<()> {
        self.requests
            .as_ref()
            .ok_or(StreetError::ChannelClosed("requests"))?
            .send(request)
            .map_err(|_| StreetError::ChannelClosed("requests"))
    }

    /// Queue a position query; its answer arrives on [`Pipeline::next_image`].
    pub fn locate(&self, query: ImageRequest) -> StreetResult<()> {
        self.positions
            .as_ref()
            .ok_or(StreetError::ChannelClosed("positions"))?
            .send(query)
            .map_err(|_| StreetError::ChannelClosed("positions"))
    }

    /// Next answer from the image stream. The outer `None` means the stream
    /// is closed; the inner `None` means nothing was cached near the query.
    pub async fn next_image(&mut self) -> Option<Option<Panorama>> {
        self.images.recv().await
    }

    pub fn cache(&self) -> Arc<ProximityCache> {
        self.cache.clone()
    }

    /// Close the raw request lane. Queued requests are still fetched.
    pub fn close_requests(&mut self) {
        self.requests.take();
    }

    /// Close the position lane. The image stream ends after the last answer.
    pub fn close_positions(&mut self) {
        self.positions.take();
    }

    /// Close the request lane and wait until every queued request has been
    /// expanded and fetched.
    pub async fn finish_fetching(&mut self) -> StreetResult<FetchReport> {
        self.close_requests();
        if let Some(handle) = self.expander.take() {
            handle.await?;
        }
        if let Some(handle) = self.fetcher.take() {
            self.report = handle.await?;
        }
        Ok(self.report)
    }

    /// Close both inbound lanes, drain every stage and join the workers.
    pub async fn shutdown(mut self) -> StreetResult<FetchReport> {
        self.close_positions();
        let report = self.finish_fetching().await?;
        if let Some(handle) = self.exporter.take() {
            handle.await?;
        }
        tracing::debug!("Pipeline shut down");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct Identity;

    #[async_trait]
    impl MetadataResolver for Identity {
        async fn resolve(&self, location: Location) -> StreetResult<Location> {
            Ok(location)
        }
    }

    struct Blank;

    #[async_trait]
    impl ImageSource for Blank {
        async fn fetch(&self, _request: &ImageRequest) -> StreetResult<Vec<u8>> {
            crate::codec::encode_jpeg(&image::DynamicImage::new_rgb8(2, 2), 80)
        }
    }

    #[derive(Default)]
    struct Memory(Mutex<HashMap<String, Panorama>>);

    #[async_trait]
    impl BlobStore for Memory {
        async fn load(&self, request: &ImageRequest) -> StreetResult<Option<Panorama>> {
            Ok(self.0.lock().unwrap().get(&request.store_key()).cloned())
        }

        async fn save(&self, request: &ImageRequest, image: &image::DynamicImage) -> StreetResult<()> {
            self.0
                .lock()
                .unwrap()
                .insert(request.store_key(), Arc::new(image.clone()));
            Ok(())
        }
    }

    fn spawn_pipeline() -> Pipeline {
        Pipeline::spawn(
            PipelineConfig::default(),
            Arc::new(Identity),
            Arc::new(Blank),
            Arc::new(Memory::default()),
        )
    }

    #[tokio::test]
    async fn test_submit_after_close_fails() {
        let mut pipeline = spawn_pipeline();
        pipeline.close_requests();
        let err = pipeline
            .submit(ImageRequest::new(Location::new(1.0, 1.0), 0))
            .unwrap_err();
        assert!(matches!(err, StreetError::ChannelClosed("requests")));
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_closing_positions_ends_image_stream() {
        let mut pipeline = spawn_pipeline();
        pipeline
            .locate(ImageRequest::new(Location::new(1.0, 1.0), 0))
            .unwrap();
        pipeline.close_positions();

        assert!(matches!(pipeline.next_image().await, Some(None)));
        assert!(pipeline.next_image().await.is_none());
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_finish_fetching_reports_counts() {
        let mut pipeline = spawn_pipeline();
        let here = Location::new(1.0, 1.0);
        pipeline.submit(ImageRequest::new(here, 90)).unwrap();
        pipeline.submit(ImageRequest::new(here, 92)).unwrap();

        let report = pipeline.finish_fetching().await.unwrap();
        // Windows [85, 95) and [87, 97) overlap on 8 headings.
        assert_eq!(report.from_network, 12);
        assert_eq!(report.skipped, 8);
        assert_eq!(pipeline.cache().len().await, 1);

        assert_eq!(pipeline.shutdown().await.unwrap(), report);
    }
}
