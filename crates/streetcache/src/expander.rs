//! Request expansion: raw query -> canonical location -> window of headings.

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::provider::MetadataResolver;
use crate::types::{Angle, ImageRequest};

/// Default width of the heading window, in degrees.
pub const DEFAULT_ANGLE_TOLERANCE: i32 = 10;

/// Headings in `[angle - tolerance/2, angle + tolerance/2)`, wrapped into
/// `[0, 360)`.
///
/// The heading is reduced before widening, so any `i32` is accepted.
pub fn angle_window(angle: Angle, tolerance: i32) -> Vec<Angle> {
    let base = i64::from(angle.rem_euclid(360));
    let half = i64::from(tolerance / 2);
    (base - half..base + half)
        .map(|a| a.rem_euclid(360) as Angle)
        .collect()
}

/// First pipeline stage. Resolves each raw request and fans it out over a
/// window of headings at the canonical location.
pub struct RequestExpander {
    resolver: Arc<dyn MetadataResolver>,
    tolerance: i32,
}

impl RequestExpander {
    pub fn new(resolver: Arc<dyn MetadataResolver>, tolerance: i32) -> Self {
        Self {
            resolver,
            tolerance,
        }
    }

    /// Resolve one raw request into its canonical per-heading requests.
    ///
    /// Resolver failures are logged and yield no requests.
    pub async fn expand(&self, raw: ImageRequest) -> Vec<ImageRequest> {
        let canonical = match self.resolver.resolve(raw.location).await {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!("Dropping request at {}: {e}", raw.location);
                return Vec::new();
            }
        };

        angle_window(raw.angle, self.tolerance)
            .into_iter()
            .map(|angle| ImageRequest::new(canonical, angle))
            .collect()
    }

    /// Worker loop. Returns once `input` is closed and drained; dropping
    /// `output` on return closes the next stage's input.
    pub async fn run(
        self,
        mut input: UnboundedReceiver<ImageRequest>,
        output: UnboundedSender<ImageRequest>,
    ) {
        tracing::info!("Request expander started (tolerance {})", self.tolerance);

        while let Some(raw) = input.recv().await {
            for request in self.expand(raw).await {
                if output.send(request).is_err() {
                    tracing::warn!("Fetch queue closed, stopping request expander");
                    return;
                }
            }
        }

        tracing::info!("Request expander stopped");
    }
}
