//! Proximity cache: canonical location -> cached headings, pruned by distance.
//!
//! Each record remembers the distance it had to the query that last evaluated
//! it. A scan ([`ProximityCache::get_and_clean`]) answers a position query
//! with the nearest record's image and, in the same pass, drops records that
//! moved closer to the query since their last evaluation while still being
//! dominated by a nearer record.
//!
//! ## Locking
//!
//! The outer map sits behind an `RwLock`: lookups and scans take it shared,
//! creating or deleting a location takes it exclusive. Every record has its
//! own `RwLock`, so writing one location's images never waits on another
//! location.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::{Angle, ImageRequest, Location, Panorama};

/// Per-location cache entry.
#[derive(Debug)]
struct CacheRecord {
    /// Distance to the query that last evaluated this record, in metres.
    last_distance: f64,
    images: HashMap<Angle, Panorama>,
}

impl CacheRecord {
    fn new() -> Self {
        Self {
            last_distance: f64::INFINITY,
            images: HashMap::new(),
        }
    }
}

/// What a scan decided for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Lead,
    Evict,
    Keep,
}

impl CacheRecord {
    /// Apply the eviction rule for a record at `distance` from the query when
    /// the best distance seen so far in the pass is `best_so_far`.
    fn evaluate(&mut self, distance: f64, best_so_far: f64) -> Verdict {
        if distance < best_so_far {
            self.last_distance = distance;
            Verdict::Lead
        } else if distance < self.last_distance {
            Verdict::Evict
        } else {
            self.last_distance = distance;
            Verdict::Keep
        }
    }
}

/// Concurrent map from canonical location to cached panorama headings.
#[derive(Debug, Default)]
pub struct ProximityCache {
    records: RwLock<HashMap<Location, Arc<RwLock<CacheRecord>>>>,
}

impl ProximityCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `image` under the request's location and heading.
    ///
    /// Creates the location's record on first use. An existing image for the
    /// same heading is replaced.
    pub async fn add(&self, request: ImageRequest, image: Panorama) {
        {
            let records = self.records.read().await;
            if let Some(record) = records.get(&request.location) {
                record.write().await.images.insert(request.angle, image);
                return;
            }
        }

        let record = {
            let mut records = self.records.write().await;
            records
                .entry(request.location)
                .or_insert_with(|| Arc::new(RwLock::new(CacheRecord::new())))
                .clone()
        };
        record.write().await.images.insert(request.angle, image);
        tracing::debug!("New cache record at {}", request.location);
    }

    /// Whether an image is cached for exactly this location and heading.
    pub async fn has(&self, request: &ImageRequest) -> bool {
        let records = self.records.read().await;
        match records.get(&request.location) {
            Some(record) => record.read().await.images.contains_key(&request.angle),
            None => false,
        }
    }

    /// Number of locations currently cached.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the cache holds no locations.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Answer a position query with the nearest record's image for
    /// `query.angle`, pruning converging records along the way.
    ///
    /// Records are visited nearest-first, so the first record visited leads
    /// and every later one is judged against it:
    ///
    /// 1. closer than the best so far: becomes the answer, remembers `d`;
    /// 2. otherwise, closer than its own last distance: evicted;
    /// 3. otherwise: remembers `d` and stays.
    ///
    /// Returns `None` when the cache is empty or the nearest record never had
    /// this exact heading fetched.
    pub async fn get_and_clean(&self, query: &ImageRequest) -> Option<Panorama> {
        let mut best_so_far = f64::INFINITY;
        let mut best_image = None;
        let mut evicted = Vec::new();

        {
            let records = self.records.read().await;

            let mut visits: Vec<(f64, &Location, &Arc<RwLock<CacheRecord>>)> = records
                .iter()
                .map(|(location, record)| (location.distance(&query.location), location, record))
                .collect();
            visits.sort_by(|a, b| a.0.total_cmp(&b.0));

            for (distance, location, record) in visits {
                let mut record = record.write().await;
                match record.evaluate(distance, best_so_far) {
                    Verdict::Lead => {
                        best_so_far = distance;
                        best_image = record.images.get(&query.angle).cloned();
                    }
                    Verdict::Evict => evicted.push(*location),
                    Verdict::Keep => {}
                }
            }
        }

        if !evicted.is_empty() {
            let mut records = self.records.write().await;
            for location in &evicted {
                records.remove(location);
            }
            tracing::debug!(
                "Evicted {} cache records while locating {}",
                evicted.len(),
                query.location
            );
        }

        best_image
    }
}
