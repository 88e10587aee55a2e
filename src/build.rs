//! Parallel construction of the k-nearest-neighbor graph.
//!
//! Construction runs in three phases, data-parallel over vertices:
//!
//! 1. **init**: every vertex starts with `s` random neighbors.
//! 2. **refine**: `t1` outer rounds of `t2` relative-neighborhood pruning
//!    passes each. A candidate edge `u -> v` survives a pass only if no
//!    already-accepted neighbor `w` of `u` is closer to `v` than `v` is to
//!    `u`; when it is, the edge `w -> v` is promoted instead, propagating
//!    useful edges through the graph. Between rounds, every edge is mirrored
//!    back onto its target (reverse-edge injection) and pools are capped at
//!    `r` entries.
//! 3. **finalize**: pools are sorted, deduplicated, and packed into a
//!    [`CsrGraph`].
//!
//! # Locking
//!
//! One mutex per vertex. A worker holds a lock only while swapping a pool
//! in or out, or while pushing a single promoted edge onto another vertex;
//! distances are always computed outside any lock, and no worker ever holds
//! two pool locks at once. The output graph is therefore not deterministic
//! under multiple threads (promotion order depends on scheduling); under a
//! single-thread pool with a fixed seed it is byte-identical across runs.

use crate::distance::DistanceComputer;
use crate::error::{Error, Result};
use crate::graph::{dedup_by_id, sample_distinct_ids, sort_pool, CsrGraph, Neighbor, Nhood};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Scheduling granularity for the refinement passes, in vertices.
const REFINE_CHUNK: usize = 256;

/// Construction and search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RnnParams {
    /// Initial random neighbors per vertex.
    pub s: usize,
    /// Per-vertex pool cap after reverse-edge injection.
    pub r: usize,
    /// Number of outer rounds.
    pub t1: usize,
    /// Refinement passes per outer round.
    pub t2: usize,
    /// Initial pool capacity hint.
    pub pool_capacity: usize,
    /// Candidate pool size during search; 0 means "use topk".
    pub search_l: usize,
    /// Out-neighbors examined per expansion during search.
    pub k0: usize,
    /// Seed for all random draws.
    pub seed: u64,
}

impl Default for RnnParams {
    fn default() -> Self {
        Self {
            s: 16,
            r: 96,
            t1: 4,
            t2: 15,
            pool_capacity: 8,
            search_l: 0,
            k0: 32,
            seed: 2021,
        }
    }
}

impl RnnParams {
    /// Set the initial neighbor count.
    pub fn with_s(mut self, s: usize) -> Self {
        self.s = s;
        self
    }

    /// Set the pool cap.
    pub fn with_r(mut self, r: usize) -> Self {
        self.r = r;
        self
    }

    /// Set the outer round count.
    pub fn with_t1(mut self, t1: usize) -> Self {
        self.t1 = t1;
        self
    }

    /// Set the passes per round.
    pub fn with_t2(mut self, t2: usize) -> Self {
        self.t2 = t2;
        self
    }

    /// Set the search pool size.
    pub fn with_search_l(mut self, search_l: usize) -> Self {
        self.search_l = search_l;
        self
    }

    /// Set the per-expansion neighbor cap.
    pub fn with_k0(mut self, k0: usize) -> Self {
        self.k0 = k0;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject configurations the builder cannot run with.
    pub(crate) fn validate(&self, ntotal: usize) -> Result<()> {
        if self.s == 0 {
            return Err(Error::invalid_arg("s", "must be at least 1"));
        }
        if self.s >= ntotal {
            return Err(Error::invalid_arg(
                "s",
                format!("must be smaller than the vector count ({})", ntotal),
            ));
        }
        if self.r == 0 {
            return Err(Error::invalid_arg("r", "must be at least 1"));
        }
        if self.t1 == 0 || self.t2 == 0 {
            return Err(Error::invalid_arg("t1/t2", "round counts must be at least 1"));
        }
        Ok(())
    }
}

/// One-shot builder; consumed by [`build`](RnnBuilder::build).
pub(crate) struct RnnBuilder<'a> {
    dis: &'a DistanceComputer<'a>,
    params: RnnParams,
    ntotal: usize,
    graph: Vec<Nhood>,
}

impl<'a> RnnBuilder<'a> {
    pub fn new(dis: &'a DistanceComputer<'a>, params: RnnParams, ntotal: usize) -> Self {
        Self {
            dis,
            params,
            ntotal,
            graph: Vec::new(),
        }
    }

    /// Run the full construction and return the packed graph.
    pub fn build(mut self) -> CsrGraph {
        self.init_graph();

        for t1 in 0..self.params.t1 {
            for _ in 0..self.params.t2 {
                self.update_neighbors();
            }
            if t1 + 1 != self.params.t1 {
                self.add_reverse_edges();
            }
        }

        self.finalize()
    }

    /// Seed every pool with `s` random neighbors, all flagged new.
    ///
    /// Each vertex draws from its own seeded generator, so initialization is
    /// deterministic regardless of how vertices are distributed over threads.
    fn init_graph(&mut self) {
        let n = self.ntotal;
        let s = self.params.s;
        let capacity = self.params.pool_capacity.max(s);
        let seed = self.params.seed;

        self.graph = (0..n).map(|_| Nhood::with_capacity(capacity)).collect();

        let graph = &self.graph;
        let dis = self.dis;
        (0..n).into_par_iter().for_each_init(
            || Vec::with_capacity(s),
            |ids, u| {
                let mut rng =
                    fastrand::Rng::with_seed(seed.wrapping_mul(7741).wrapping_add(u as u64));
                sample_distinct_ids(&mut rng, s, n, ids);

                let mut pool = graph[u].pool.lock();
                for &id in ids.iter() {
                    if id as usize == u {
                        continue;
                    }
                    let dist = dis.symmetric(u as u32, id);
                    pool.push(Neighbor::new(id, dist, true));
                }
            },
        );
    }

    /// One relative-neighborhood pruning pass over every vertex.
    fn update_neighbors(&self) {
        let graph = &self.graph;
        let dis = self.dis;

        (0..self.ntotal)
            .into_par_iter()
            .with_min_len(REFINE_CHUNK)
            .for_each(|u| {
                let mut old_pool = {
                    let mut pool = graph[u].pool.lock();
                    std::mem::take(&mut *pool)
                };
                sort_pool(&mut old_pool);
                dedup_by_id(&mut old_pool);

                let mut new_pool: Vec<Neighbor> = Vec::with_capacity(old_pool.len());
                for nn in old_pool {
                    let mut ok = true;
                    for other in &new_pool {
                        // Both endpoints already examined in an earlier pass.
                        if !nn.flag && !other.flag {
                            continue;
                        }
                        if nn.id == other.id {
                            ok = false;
                            break;
                        }
                        let dist = dis.symmetric(nn.id, other.id);
                        if dist < nn.distance {
                            // An accepted neighbor sits closer to nn than u
                            // does: drop u -> nn and promote other -> nn.
                            ok = false;
                            graph[other.id as usize]
                                .pool
                                .lock()
                                .push(Neighbor::new(nn.id, dist, true));
                            break;
                        }
                    }
                    if ok {
                        new_pool.push(nn);
                    }
                }

                for nn in &mut new_pool {
                    nn.flag = false;
                }
                graph[u].pool.lock().append(&mut new_pool);
            });
    }

    /// Mirror every edge back onto its target and cap pools at `r`.
    ///
    /// Four barrier-separated parallel passes, so pool reads never race with
    /// the redistribution writes. Surviving edges come out flagged new and
    /// are re-examined in the next refinement round.
    fn add_reverse_edges(&self) {
        let n = self.ntotal;
        let r = self.params.r;
        let graph = &self.graph;

        let reverse: Vec<Mutex<Vec<Neighbor>>> = (0..n).map(|_| Mutex::new(Vec::new())).collect();

        // Record u as an incoming candidate on every target.
        (0..n).into_par_iter().for_each(|u| {
            let snapshot = graph[u].pool.lock().clone();
            for nn in snapshot {
                reverse[nn.id as usize]
                    .lock()
                    .push(Neighbor::new(u as u32, nn.distance, nn.flag));
            }
        });

        // Fold the forward pool into the reverse pool, dedup, cap at r.
        (0..n).into_par_iter().for_each(|u| {
            let mut pool = graph[u].pool.lock();
            for nn in pool.iter_mut() {
                nn.flag = true;
            }
            let mut rpool = reverse[u].lock();
            rpool.append(&mut pool);
            drop(pool);

            sort_pool(&mut rpool);
            dedup_by_id(&mut rpool);
            rpool.truncate(r);
        });

        // Redistribute: every entry v in u's merged pool becomes v -> u.
        (0..n).into_par_iter().for_each(|u| {
            let rpool = reverse[u].lock();
            for nn in rpool.iter() {
                graph[nn.id as usize]
                    .pool
                    .lock()
                    .push(Neighbor::new(u as u32, nn.distance, nn.flag));
            }
        });

        (0..n).into_par_iter().for_each(|u| {
            let mut pool = graph[u].pool.lock();
            sort_pool(&mut pool);
            pool.truncate(r);
        });
    }

    /// Pack the pools into CSR form and release them.
    fn finalize(self) -> CsrGraph {
        let n = self.ntotal;
        let mut pools: Vec<Vec<Neighbor>> = self
            .graph
            .into_iter()
            .map(|nhood| nhood.pool.into_inner())
            .collect();

        pools.par_iter_mut().for_each(|pool| {
            sort_pool(pool);
            dedup_by_id(pool);
        });

        let mut offsets = Vec::with_capacity(n + 1);
        let mut total = 0;
        offsets.push(0);
        for pool in &pools {
            total += pool.len();
            offsets.push(total);
        }

        let mut neighbors = vec![0u32; total];
        for (u, pool) in pools.iter().enumerate() {
            let start = offsets[u];
            for (i, nn) in pool.iter().enumerate() {
                neighbors[start + i] = nn.id;
            }
        }

        CsrGraph::new(offsets, neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Metric;
    use crate::storage::VectorStore;

    fn grid_store(n: usize, dim: usize) -> VectorStore {
        let mut store = VectorStore::new(dim);
        let mut rng = fastrand::Rng::with_seed(99);
        for _ in 0..n {
            let row: Vec<f32> = (0..dim).map(|_| rng.f32()).collect();
            store.add(&row).unwrap();
        }
        store
    }

    fn build_graph(store: &VectorStore, params: RnnParams) -> CsrGraph {
        let dis = DistanceComputer::new(store, Metric::L2);
        RnnBuilder::new(&dis, params, store.ntotal()).build()
    }

    fn check_invariants(graph: &CsrGraph, n: usize, r: usize) {
        let offsets = graph.offsets();
        assert_eq!(offsets.len(), n + 1);
        assert_eq!(offsets[0], 0);
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*offsets.last().unwrap(), graph.num_edges());

        for u in 0..n as u32 {
            let edges = graph.neighbors_of(u);
            assert!(edges.len() <= r, "vertex {} exceeds degree cap", u);
            assert!(edges.iter().all(|&v| (v as usize) < n));
            assert!(!edges.contains(&u), "vertex {} has a self-loop", u);

            let mut sorted = edges.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), edges.len(), "vertex {} has duplicates", u);
        }
    }

    #[test]
    fn test_params_defaults() {
        let params = RnnParams::default();
        assert_eq!(params.s, 16);
        assert_eq!(params.r, 96);
        assert_eq!(params.t1, 4);
        assert_eq!(params.t2, 15);
        assert_eq!(params.k0, 32);
        assert_eq!(params.seed, 2021);
    }

    #[test]
    fn test_params_validation() {
        let params = RnnParams::default();
        assert!(params.validate(100).is_ok());
        assert!(params.validate(16).is_err()); // s >= ntotal
        assert!(params.with_s(0).validate(100).is_err());
        assert!(params.with_r(0).validate(100).is_err());
        assert!(params.with_t1(0).validate(100).is_err());
    }

    #[test]
    fn test_build_invariants_small() {
        let store = grid_store(120, 4);
        let params = RnnParams::default()
            .with_s(8)
            .with_r(24)
            .with_t1(2)
            .with_t2(4)
            .with_seed(5);
        let graph = build_graph(&store, params);
        check_invariants(&graph, 120, params.r);
        assert!(graph.num_edges() > 0);
    }

    #[test]
    fn test_build_invariants_hold_with_identical_vectors() {
        // Degenerate case: every pairwise distance is zero, so dedup and the
        // degree cap do all the work.
        let mut store = VectorStore::new(3);
        for _ in 0..20 {
            store.add(&[1.0, 1.0, 1.0]).unwrap();
        }
        let params = RnnParams::default()
            .with_s(4)
            .with_r(8)
            .with_t1(2)
            .with_t2(2);
        let graph = build_graph(&store, params);
        check_invariants(&graph, 20, params.r);
    }

    #[test]
    fn test_build_finds_close_neighbors() {
        // Two tight clusters far apart: every vertex's best edges must stay
        // inside its own cluster.
        let mut store = VectorStore::new(2);
        for i in 0..20 {
            store.add(&[i as f32 * 0.01, 0.0]).unwrap();
        }
        for i in 0..20 {
            store.add(&[1000.0 + i as f32 * 0.01, 0.0]).unwrap();
        }
        let params = RnnParams::default()
            .with_s(8)
            .with_r(12)
            .with_t1(2)
            .with_t2(4)
            .with_seed(11);
        let graph = build_graph(&store, params);
        check_invariants(&graph, 40, params.r);

        for u in 0..40u32 {
            let nearest = graph.neighbors_of(u)[0];
            assert_eq!(
                u < 20,
                nearest < 20,
                "vertex {} crossed clusters to {}",
                u,
                nearest
            );
        }
    }

    #[test]
    fn test_single_thread_build_is_deterministic() {
        let store = grid_store(150, 6);
        let params = RnnParams::default()
            .with_s(8)
            .with_r(16)
            .with_t1(2)
            .with_t2(3)
            .with_seed(77);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        let first = pool.install(|| build_graph(&store, params));
        let second = pool.install(|| build_graph(&store, params));

        assert_eq!(first.offsets(), second.offsets());
        assert_eq!(first.neighbor_ids(), second.neighbor_ids());
    }
}
