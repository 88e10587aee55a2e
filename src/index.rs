//! The index facade: vector ingestion, graph construction, and batched
//! parallel search.
//!
//! # Example
//!
//! ```
//! use rnn_descent::{Metric, RnnIndex, RnnParams};
//!
//! # fn main() -> rnn_descent::Result<()> {
//! let params = RnnParams::default().with_s(4).with_r(8).with_search_l(16);
//! let mut index = RnnIndex::new(2, Metric::L2, params)?;
//!
//! let vectors: Vec<f32> = (0..32).map(|i| i as f32).collect();
//! index.add(&vectors)?;
//!
//! let mut distances = vec![0.0; 3];
//! let mut labels = vec![0u32; 3];
//! index.search(&[2.0, 3.0], 3, &mut distances, &mut labels)?;
//! assert_eq!(labels[0], 1); // vector (2, 3)
//! # Ok(())
//! # }
//! ```

use crate::build::{RnnBuilder, RnnParams};
use crate::distance::{DistanceComputer, Metric};
use crate::error::{Error, Result};
use crate::graph::CsrGraph;
use crate::search::{search_graph, VisitedSet};
use crate::storage::VectorStore;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// An approximate nearest-neighbor index over a fixed set of vectors.
///
/// Vectors are added once and the graph is built eagerly; there is no
/// incremental insertion. Adding to a non-empty index logs a warning and
/// rebuilds over the combined set. Search is read-only and parallel over
/// queries.
pub struct RnnIndex {
    dim: usize,
    metric: Metric,
    params: RnnParams,
    store: VectorStore,
    graph: Option<CsrGraph>,
    interrupted: AtomicBool,
}

impl std::fmt::Debug for RnnIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RnnIndex")
            .field("dim", &self.dim)
            .field("metric", &self.metric)
            .field("ntotal", &self.store.ntotal())
            .field("built", &self.graph.is_some())
            .finish_non_exhaustive()
    }
}

impl RnnIndex {
    /// Create an empty index for vectors of dimension `dim`.
    pub fn new(dim: usize, metric: Metric, params: RnnParams) -> Result<Self> {
        if dim == 0 {
            return Err(Error::invalid_arg("dim", "dimension must be positive"));
        }
        Ok(Self {
            dim,
            metric,
            params,
            store: VectorStore::new(dim),
            graph: None,
            interrupted: AtomicBool::new(false),
        })
    }

    /// Vector dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Distance metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Number of indexed vectors.
    pub fn ntotal(&self) -> usize {
        self.store.ntotal()
    }

    /// Returns true once a graph has been built.
    pub fn is_built(&self) -> bool {
        self.graph.is_some()
    }

    /// The finished graph, if built.
    pub fn graph(&self) -> Option<&CsrGraph> {
        self.graph.as_ref()
    }

    /// Construction and search parameters.
    pub fn params(&self) -> &RnnParams {
        &self.params
    }

    /// Mutable parameters; `search_l` and `k0` may be retuned between
    /// searches without rebuilding.
    pub fn params_mut(&mut self) -> &mut RnnParams {
        &mut self.params
    }

    /// Store row-major vectors and build the graph over everything stored.
    ///
    /// The index does not support incremental insertion: adding to a
    /// non-empty index rebuilds from scratch over the combined set.
    pub fn add(&mut self, vectors: &[f32]) -> Result<()> {
        if self.store.ntotal() != 0 {
            log::warn!(
                "index already holds {} vectors and does not support dynamic \
                 insertion; rebuilding over the combined set",
                self.store.ntotal()
            );
        }
        self.store.add(vectors)?;
        self.params.validate(self.store.ntotal())?;

        let graph = {
            let dis = DistanceComputer::new(&self.store, self.metric);
            RnnBuilder::new(&dis, self.params, self.store.ntotal()).build()
        };
        self.graph = Some(graph);
        Ok(())
    }

    /// Answer `topk` nearest neighbors for each row-major query.
    ///
    /// Outputs are row-major `[n_queries, topk]`: ids into `labels`,
    /// distances into `distances`, each row sorted ascending. Queries run in
    /// parallel; every worker holds its own distance computer and visited
    /// set. Between batches a cooperative interruption flag is consulted;
    /// see [`interrupt`](Self::interrupt).
    pub fn search(
        &self,
        queries: &[f32],
        topk: usize,
        distances: &mut [f32],
        labels: &mut [u32],
    ) -> Result<()> {
        let graph = self.graph.as_ref().ok_or(Error::NotBuilt)?;
        let n = self.store.ntotal();

        if topk == 0 {
            return Err(Error::invalid_arg("topk", "must be at least 1"));
        }
        if topk > n {
            return Err(Error::invalid_arg(
                "topk",
                format!("cannot exceed the vector count ({})", n),
            ));
        }
        if queries.is_empty() || queries.len() % self.dim != 0 {
            return Err(Error::invalid_arg(
                "queries",
                format!(
                    "buffer length {} is not a positive multiple of dimension {}",
                    queries.len(),
                    self.dim
                ),
            ));
        }
        let nq = queries.len() / self.dim;
        if distances.len() != nq * topk || labels.len() != nq * topk {
            return Err(Error::invalid_arg(
                "outputs",
                format!("output buffers must hold {} entries", nq * topk),
            ));
        }

        self.interrupted.store(false, Ordering::Relaxed);

        // Coarse cancellation granularity, scaled down as per-query work
        // (dimension times pool size) grows.
        let l = self.params.search_l.max(topk).min(n);
        let period = ((1 << 18) / (self.dim * l).max(1)).max(1);

        for start in (0..nq).step_by(period) {
            let end = (start + period).min(nq);

            let batch_queries = &queries[start * self.dim..end * self.dim];
            let batch_distances = &mut distances[start * topk..end * topk];
            let batch_labels = &mut labels[start * topk..end * topk];

            batch_queries
                .par_chunks(self.dim)
                .zip(batch_distances.par_chunks_mut(topk))
                .zip(batch_labels.par_chunks_mut(topk))
                .for_each_init(
                    || {
                        (
                            DistanceComputer::new(&self.store, self.metric),
                            VisitedSet::new(n),
                        )
                    },
                    |(dis, visited), ((query, dist_row), label_row)| {
                        dis.set_query(query);
                        search_graph(
                            graph,
                            dis,
                            &self.params,
                            topk,
                            label_row,
                            dist_row,
                            visited,
                        );
                    },
                );

            if self.interrupted.load(Ordering::Relaxed) {
                return Err(Error::Interrupted);
            }
        }

        // Internally inner-product scores are negated so ascending means
        // better; undo the negation at the boundary.
        if self.metric == Metric::InnerProduct {
            for d in distances.iter_mut() {
                *d = -*d;
            }
        }

        Ok(())
    }

    /// Request cancellation of an in-flight `search`.
    ///
    /// The running batch completes, no further batches start, and the search
    /// returns [`Error::Interrupted`]. The flag is cleared on the next call
    /// to `search`.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    /// Borrow the stored vector `id`.
    pub fn reconstruct(&self, id: u32) -> Result<&[f32]> {
        if (id as usize) >= self.store.ntotal() {
            return Err(Error::invalid_arg(
                "id",
                format!("{} is out of range (ntotal = {})", id, self.store.ntotal()),
            ));
        }
        Ok(self.store.vector(id))
    }

    /// Discard the graph and all stored vectors.
    pub fn reset(&mut self) {
        self.graph = None;
        self.store.clear();
    }
}
