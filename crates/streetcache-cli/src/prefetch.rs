//! One-shot prefetch: expand and fetch a single raw request, then stop.

use streetcache::{FetchReport, ImageRequest, Pipeline};

use crate::error::CliResult;

/// Push `request` through expansion and fetching and wait for completion.
pub async fn prefetch(mut pipeline: Pipeline, request: ImageRequest) -> CliResult<FetchReport> {
    tracing::info!(
        "Prefetching heading {} around {}",
        request.angle,
        request.location
    );
    pipeline.submit(request)?;
    let report = pipeline.finish_fetching().await?;
    pipeline.shutdown().await?;
    Ok(report)
}
