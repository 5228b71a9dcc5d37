//! Integration tests for the stdio line protocol.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::DynamicImage;
use serde_json::Value;

use streetcache::{
    codec, BlobStore, ImageRequest, ImageSource, Location, MetadataResolver, Panorama, Pipeline,
    PipelineConfig, StreetResult,
};
use streetcache_cli::transport::{PositionResult, StdioTransport};

// ─────────────────────── helpers ───────────────────────

struct Identity;

#[async_trait]
impl MetadataResolver for Identity {
    async fn resolve(&self, location: Location) -> StreetResult<Location> {
        Ok(location)
    }
}

/// Images are 8x(heading + 1) pixels.
struct HeadingSized;

#[async_trait]
impl ImageSource for HeadingSized {
    async fn fetch(&self, request: &ImageRequest) -> StreetResult<Vec<u8>> {
        codec::encode_jpeg(&DynamicImage::new_rgb8(8, request.angle as u32 + 1), 90)
    }
}

#[derive(Default)]
struct Memory(Mutex<HashMap<String, Panorama>>);

#[async_trait]
impl BlobStore for Memory {
    async fn load(&self, request: &ImageRequest) -> StreetResult<Option<Panorama>> {
        Ok(self.0.lock().unwrap().get(&request.store_key()).cloned())
    }

    async fn save(&self, request: &ImageRequest, image: &DynamicImage) -> StreetResult<()> {
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
        Arc::new(HeadingSized),
        Arc::new(Memory::default()),
    )
}

async fn run_lines(pipeline: Pipeline, input: &str) -> (Vec<Value>, streetcache::FetchReport) {
    run_bytes(pipeline, input.as_bytes()).await
}

async fn run_bytes(pipeline: Pipeline, input: &[u8]) -> (Vec<Value>, streetcache::FetchReport) {
    let mut output = Vec::new();
    let report = StdioTransport::new(pipeline)
        .run_with(input, &mut output)
        .await
        .unwrap();
    let lines = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    (lines, report)
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_positions_on_empty_cache_answer_in_order() {
    let input = concat!(
        r#"{"kind":"position","lat":1.0,"lng":1.0,"angle":0}"#,
        "\n",
        r#"{"kind":"position","lat":2.0,"lng":2.0,"angle":10}"#,
        "\n",
        "\n",
        r#"{"kind":"position","lat":3.0,"lng":3.0,"angle":20}"#,
        "\n",
    );

    let (lines, _) = run_lines(spawn_pipeline(), input).await;
    assert_eq!(lines.len(), 3);
    for (i, line) in lines.iter().enumerate() {
        let result: PositionResult = serde_json::from_value(line.clone()).unwrap();
        assert_eq!(result.seq, i as u64);
        assert!(!result.found);
        assert!(result.jpeg_base64.is_none());
    }
}

#[tokio::test]
async fn test_malformed_line_reports_error_and_continues() {
    let input = concat!(
        "this is not json\n",
        r#"{"kind":"position","lat":1.0,"lng":1.0,"angle":0}"#,
        "\n",
    );

    let (lines, _) = run_lines(spawn_pipeline(), input).await;
    assert_eq!(lines.len(), 2);
    assert!(lines[0]["error"].as_str().unwrap().starts_with("Parse error"));
    assert_eq!(lines[1]["seq"], 0);
    assert_eq!(lines[1]["found"], false);
}

#[tokio::test]
async fn test_invalid_utf8_line_reports_error_and_continues() {
    let input: &[u8] = b"\xff\xfe garbage\n{\"kind\":\"position\",\"lat\":1.0,\"lng\":1.0,\"angle\":0}\n";

    let (lines, _) = run_bytes(spawn_pipeline(), input).await;
    assert_eq!(lines.len(), 2);
    assert!(lines[0]["error"].as_str().unwrap().contains("UTF-8"));
    assert_eq!(lines[1]["seq"], 0);
    assert_eq!(lines[1]["found"], false);
}

#[tokio::test]
async fn test_request_lines_are_fetched_before_exit() {
    let input = concat!(
        r#"{"kind":"request","lat":10.0,"lng":10.0,"angle":90}"#,
        "\n",
        r#"{"kind":"request","lat":10.0,"lng":10.0,"angle":90}"#,
        "\n",
    );

    let (lines, report) = run_lines(spawn_pipeline(), input).await;
    assert!(lines.is_empty());
    assert_eq!(report.from_network, 10);
    assert_eq!(report.skipped, 10);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_position_after_prefetch_returns_image() {
    let mut pipeline = spawn_pipeline();
    let here = Location::new(10.001, 10.001);
    pipeline.submit(ImageRequest::new(here, 90)).unwrap();
    pipeline.finish_fetching().await.unwrap();

    let input = concat!(
        r#"{"kind":"position","lat":10.0015,"lng":10.0015,"angle":90}"#,
        "\n",
        r#"{"kind":"request","lat":10.0,"lng":10.0,"angle":0}"#,
        "\n",
    );
    let (lines, _) = run_lines(pipeline, input).await;
    assert_eq!(lines.len(), 2);

    let answer = lines.iter().find(|l| l.get("seq").is_some()).unwrap();
    let result: PositionResult = serde_json::from_value(answer.clone()).unwrap();
    assert!(result.found);
    assert_eq!(result.width, Some(8));
    assert_eq!(result.height, Some(91));
    assert!(result.jpeg_base64.is_some());

    // The request lane was already closed by the prefetch.
    let rejected = lines.iter().find(|l| l.get("error").is_some()).unwrap();
    assert!(rejected["error"].as_str().unwrap().contains("requests"));
}
