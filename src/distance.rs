//! SIMD-accelerated distance computation for graph construction and search.
//!
//! This module provides distance kernels optimized using the `wide` crate
//! for portable SIMD (AVX2, AVX-512, NEON), and the [`DistanceComputer`]
//! that both the builder and the searcher consume.
//!
//! # Metrics
//!
//! - **L2**: Euclidean distance. Lower means closer.
//! - **InnerProduct**: dot-product similarity. Internally the computer
//!   returns *negated* dot products so that ascending order still means
//!   "closer"; the index facade flips the sign back when reporting results.

use crate::storage::VectorStore;
use serde::{Deserialize, Serialize};

/// Distance metric for similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Euclidean distance: sqrt(sum((a[i] - b[i])^2)). Lower is more similar.
    L2,
    /// Inner product: sum(a[i] * b[i]). Higher is more similar.
    InnerProduct,
}

impl Metric {
    /// Returns true if raw scores grow with similarity (before negation).
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::InnerProduct)
    }
}

/// Distance evaluator bound to a vector store.
///
/// Holds the current query as owned scratch, so one instance per search
/// thread; the builder only uses [`symmetric`](DistanceComputer::symmetric),
/// which is `&self` and can be shared across build workers.
///
/// All returned values are ordered so that smaller means closer, for both
/// metrics. For [`Metric::InnerProduct`] the values are negated dot products;
/// callers that report distances outward must undo the negation.
pub struct DistanceComputer<'a> {
    store: &'a VectorStore,
    metric: Metric,
    query: Vec<f32>,
}

impl<'a> DistanceComputer<'a> {
    /// Create a computer over `store` with no query installed.
    pub fn new(store: &'a VectorStore, metric: Metric) -> Self {
        Self {
            store,
            metric,
            query: Vec::with_capacity(store.dim()),
        }
    }

    /// Install the query vector for subsequent [`distance_to`](Self::distance_to) calls.
    pub fn set_query(&mut self, x: &[f32]) {
        self.query.clear();
        self.query.extend_from_slice(x);
    }

    /// Distance from the current query to stored vector `i`.
    pub fn distance_to(&self, i: u32) -> f32 {
        self.eval(&self.query, self.store.vector(i))
    }

    /// Distance between two stored vectors.
    pub fn symmetric(&self, i: u32, j: u32) -> f32 {
        self.eval(self.store.vector(i), self.store.vector(j))
    }

    fn eval(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            Metric::L2 => euclidean_distance_simd(a, b),
            Metric::InnerProduct => -dot_product_simd(a, b),
        }
    }
}

/// Compute dot product using SIMD.
///
/// Uses `f32x8` from the `wide` crate for 8-wide SIMD operations.
/// Falls back to scalar for remaining elements.
pub fn dot_product_simd(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let dim = a.len();
    let mut sum = wide::f32x8::ZERO;

    // Process 8 elements at a time
    let chunks = dim / 8;
    for i in 0..chunks {
        let offset = i * 8;
        let va = wide::f32x8::from(&a[offset..offset + 8]);
        let vb = wide::f32x8::from(&b[offset..offset + 8]);
        sum = sum + (va * vb);
    }

    // Horizontal sum of SIMD vector
    let mut result: f32 = sum.to_array().iter().sum();

    // Handle remaining elements
    let remainder = dim % 8;
    if remainder > 0 {
        let start = chunks * 8;
        for i in 0..remainder {
            result += a[start + i] * b[start + i];
        }
    }

    result
}

/// Compute Euclidean distance using SIMD.
///
/// L2 distance = sqrt(sum((a[i] - b[i])^2))
///
/// Returns the actual distance (not squared).
pub fn euclidean_distance_simd(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let dim = a.len();
    let mut sum = wide::f32x8::ZERO;

    // Process 8 elements at a time
    let chunks = dim / 8;
    for i in 0..chunks {
        let offset = i * 8;
        let va = wide::f32x8::from(&a[offset..offset + 8]);
        let vb = wide::f32x8::from(&b[offset..offset + 8]);
        let diff = va - vb;
        sum = sum + (diff * diff);
    }

    // Horizontal sum of SIMD vector
    let mut result: f32 = sum.to_array().iter().sum();

    // Handle remaining elements
    let remainder = dim % 8;
    if remainder > 0 {
        let start = chunks * 8;
        for i in 0..remainder {
            let diff = a[start + i] - b[start + i];
            result += diff * diff;
        }
    }

    result.sqrt()
}

/// Scalar fallback implementations for comparison and testing.
pub mod scalar {
    /// Scalar dot product.
    pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    /// Scalar Euclidean distance.
    pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
        let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
        sum.sqrt()
    }
}
