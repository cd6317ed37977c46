//! Mergeable latency sketch.
//!
//! A t-digest over latency in milliseconds. Rows store the digest in
//! serialized form so percentiles over any set of rows can be computed
//! later by merging, without going back to raw events.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default compression. Higher is more accurate and larger.
pub const DEFAULT_COMPRESSION: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Centroid {
    mean: f64,
    weight: f64,
}

impl Centroid {
    fn new(mean: f64, weight: f64) -> Self {
        Self { mean, weight }
    }

    fn absorb(&mut self, other: &Centroid) {
        let total = self.weight + other.weight;
        if total > 0.0 {
            self.mean = (self.mean * self.weight + other.mean * other.weight) / total;
            self.weight = total;
        }
    }
}

fn by_mean(a: &Centroid, b: &Centroid) -> Ordering {
    a.mean.partial_cmp(&b.mean).unwrap_or(Ordering::Equal)
}

/// Latency percentiles derived from a digest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

/// T-digest of request latencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyDigest {
    compression: f64,
    /// Sorted by mean.
    centroids: Vec<Centroid>,
    /// Values not yet folded into centroids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    buffer: Vec<Centroid>,
    total_weight: f64,
    min: f64,
    max: f64,
}

impl Default for LatencyDigest {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION)
    }
}

impl LatencyDigest {
    /// Creates an empty digest. Non-positive compression falls back to the default.
    pub fn new(compression: f64) -> Self {
        let compression = if compression.is_finite() && compression > 0.0 {
            compression
        } else {
            DEFAULT_COMPRESSION
        };
        Self {
            compression,
            centroids: Vec::new(),
            buffer: Vec::new(),
            total_weight: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    fn buffer_capacity(&self) -> usize {
        (self.compression * 2.0) as usize
    }

    pub fn add(&mut self, value: f64) {
        self.add_weighted(value, 1.0);
    }

    /// Adds a value with weight. Non-finite values and non-positive weights
    /// are ignored.
    pub fn add_weighted(&mut self, value: f64, weight: f64) {
        if !value.is_finite() || !weight.is_finite() || weight <= 0.0 {
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.total_weight += weight;
        self.buffer.push(Centroid::new(value, weight));

        if self.buffer.len() >= self.buffer_capacity() {
            self.flush();
        }
    }

    /// Folds buffered values into the centroid list.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let buffered = std::mem::take(&mut self.buffer);
        self.fold(buffered);
    }

    fn fold(&mut self, incoming: Vec<Centroid>) {
        let mut all = std::mem::take(&mut self.centroids);
        all.extend(incoming);
        all.sort_by(by_mean);
        self.centroids = self.compress(all);
    }

    fn compress(&self, centroids: Vec<Centroid>) -> Vec<Centroid> {
        let mut iter = centroids.into_iter();
        let Some(mut current) = iter.next() else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut weight_so_far = 0.0;
        for centroid in iter {
            let proposed = current.weight + centroid.weight;
            let q = (weight_so_far + proposed / 2.0) / self.total_weight;
            if proposed <= self.scale_limit(q) {
                current.absorb(&centroid);
            } else {
                weight_so_far += current.weight;
                result.push(current);
                current = centroid;
            }
        }
        result.push(current);
        result
    }

    fn scale_limit(&self, q: f64) -> f64 {
        let q = q.clamp(0.0001, 0.9999);
        (self.compression * (q * (1.0 - q)).sqrt() * 4.0).max(1.0)
    }

    /// Merges another digest into this one. Total count is conserved and
    /// does not depend on merge order.
    pub fn merge(&mut self, other: &LatencyDigest) {
        if other.is_empty() {
            return;
        }
        self.flush();
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.total_weight += other.total_weight;

        let mut incoming = other.centroids.clone();
        incoming.extend(other.buffer.iter().copied());
        self.fold(incoming);
    }

    /// Estimates the `q` quantile, `q` in `[0, 1]`.
    pub fn quantile(&self, q: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&q) {
            return Err(Error::sketch(format!("quantile {q} out of range [0, 1]")));
        }
        if self.is_empty() {
            return Err(Error::sketch("digest is empty"));
        }
        if q == 0.0 {
            return Ok(self.min);
        }
        if q == 1.0 {
            return Ok(self.max);
        }

        let digest = if self.buffer.is_empty() {
            Cow::Borrowed(self)
        } else {
            let mut flushed = self.clone();
            flushed.flush();
            Cow::Owned(flushed)
        };
        Ok(digest.interpolate(q))
    }

    fn interpolate(&self, q: f64) -> f64 {
        let centroids = &self.centroids;
        let n = centroids.len();
        let target = q * self.total_weight;

        let mut lower = 0.0;
        let mut idx = n - 1;
        for (i, c) in centroids.iter().enumerate() {
            if target <= lower + c.weight {
                idx = i;
                break;
            }
            lower += c.weight;
        }
        let centroid = centroids[idx];
        let upper = lower + centroid.weight;
        let frac = if upper > lower {
            ((target - lower) / (upper - lower)).clamp(0.0, 1.0)
        } else {
            0.5
        };

        let left = if idx == 0 {
            self.min
        } else {
            (centroids[idx - 1].mean + centroid.mean) / 2.0
        };
        let right = if idx == n - 1 {
            self.max
        } else {
            (centroid.mean + centroids[idx + 1].mean) / 2.0
        };

        left + frac * (right - left)
    }

    /// p50, p90, p95, p99 plus bounds and count.
    pub fn percentiles(&self) -> Result<Percentiles> {
        Ok(Percentiles {
            p50: self.quantile(0.50)?,
            p90: self.quantile(0.90)?,
            p95: self.quantile(0.95)?,
            p99: self.quantile(0.99)?,
            min: self.min,
            max: self.max,
            count: self.count(),
        })
    }

    pub fn count(&self) -> u64 {
        self.total_weight.round() as u64
    }

    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight <= 0.0
    }

    pub fn centroid_count(&self) -> usize {
        self.centroids.len() + self.buffer.len()
    }

    /// Serializes the digest, folding any buffered values first.
    pub fn to_json(&self) -> Result<String> {
        let mut flushed = self.clone();
        flushed.flush();
        Ok(serde_json::to_string(&flushed)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
