//! rnn-descent - Parallel graph index for approximate nearest neighbors
//!
//! This crate builds a directed k-nearest-neighbor graph over a fixed set of
//! vectors using RNN-Descent (relative NN-Descent), then answers top-k
//! queries with a greedy best-first walk over the finished graph.
//!
//! # Core Design
//!
//! - **Multi-round refinement**: every vertex keeps a candidate pool that is
//!   pruned by a relative-neighborhood rule and re-densified with reverse
//!   edges between rounds, converging to a compact graph with bounded
//!   out-degree.
//! - **Data parallelism**: construction is parallel over vertices with one
//!   short-lived lock per vertex; search is parallel over queries with
//!   per-thread scratch. No locks are held during distance computation.
//! - **Compact search structure**: the finished graph is two flat arrays in
//!   CSR form, shared read-only by all search threads.
//!
//! # Example
//!
//! ```
//! use rnn_descent::{Metric, RnnIndex, RnnParams};
//!
//! # fn main() -> rnn_descent::Result<()> {
//! let params = RnnParams::default()
//!     .with_s(4)
//!     .with_r(8)
//!     .with_search_l(16)
//!     .with_seed(42);
//! let mut index = RnnIndex::new(2, Metric::L2, params)?;
//!
//! // 16 points on a diagonal.
//! let vectors: Vec<f32> = (0..32).map(|i| i as f32).collect();
//! index.add(&vectors)?;
//!
//! let mut distances = vec![0.0; 2];
//! let mut labels = vec![0u32; 2];
//! index.search(&[4.0, 5.0], 2, &mut distances, &mut labels)?;
//! assert_eq!(labels[0], 2); // vector (4, 5)
//! assert_eq!(distances[0], 0.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod build;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod graph;
pub mod index;
pub mod properties;
pub mod search;
pub mod storage;

pub use build::RnnParams;
pub use distance::{DistanceComputer, Metric};
pub use error::{Error, Result};
pub use graph::{CsrGraph, Neighbor};
pub use index::RnnIndex;
pub use properties::{DegreeDistribution, GraphProperties};
pub use search::VisitedSet;
pub use storage::VectorStore;
