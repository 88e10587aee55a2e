//! Greedy best-first search over the finished CSR graph.
//!
//! A single query is served by one thread: the candidate pool (`retset`) is
//! a sorted array of size `L = max(search_l, topk)`, seeded with `L` random
//! vertices and refined by expanding flagged entries until no slot below `L`
//! changes. Parallelism happens across queries, in the index facade.

use crate::build::RnnParams;
use crate::distance::DistanceComputer;
use crate::graph::{insert_into_pool, sample_distinct_ids, sort_pool, CsrGraph, Neighbor};

/// Per-thread scratch marking vertices visited within a single query.
///
/// A version-stamped byte array: `advance` bumps the stamp, so reset between
/// queries is O(1) amortized. When the stamp wraps, the array is cleared.
#[derive(Debug, Clone)]
pub struct VisitedSet {
    marks: Vec<u8>,
    stamp: u8,
}

impl VisitedSet {
    /// Create a set covering ids in `[0, n)`.
    pub fn new(n: usize) -> Self {
        Self {
            marks: vec![0; n],
            stamp: 1,
        }
    }

    /// Has `id` been marked since the last `advance`?
    pub fn get(&self, id: u32) -> bool {
        self.marks[id as usize] == self.stamp
    }

    /// Mark `id` as visited.
    pub fn set(&mut self, id: u32) {
        self.marks[id as usize] = self.stamp;
    }

    /// Forget all marks.
    pub fn advance(&mut self) {
        if self.stamp == u8::MAX {
            self.marks.fill(0);
            self.stamp = 1;
        } else {
            self.stamp += 1;
        }
    }
}

/// Run one query against the graph, writing `topk` ids and distances.
///
/// `labels` and `distances` must each hold exactly `topk` elements, and
/// `topk` must not exceed the number of vertices. The visited set is
/// advanced before returning, ready for the next query on this thread.
pub(crate) fn search_graph(
    graph: &CsrGraph,
    dis: &DistanceComputer<'_>,
    params: &RnnParams,
    topk: usize,
    labels: &mut [u32],
    distances: &mut [f32],
    visited: &mut VisitedSet,
) {
    let n = graph.num_vertices();
    let l = params.search_l.max(topk).min(n);

    // Candidate pool; the topk best entries are the result. One extra slot
    // absorbs the element pushed off the end during insertion.
    let mut retset = vec![Neighbor::default(); l + 1];

    // Randomly choose l vertices to seed the pool.
    let mut rng = fastrand::Rng::with_seed(params.seed);
    let mut init_ids = Vec::with_capacity(l);
    sample_distinct_ids(&mut rng, l, n, &mut init_ids);
    for (slot, &id) in retset.iter_mut().zip(init_ids.iter()) {
        *slot = Neighbor::new(id, dis.distance_to(id), true);
    }
    sort_pool(&mut retset[..l]);

    // Walk until the earliest updated slot is >= l.
    let mut k = 0;
    while k < l {
        let mut nk = l;

        if retset[k].flag {
            retset[k].flag = false;
            let u = retset[k].id;

            let edges = graph.neighbors_of(u);
            let examine = edges.len().min(params.k0);
            for &id in &edges[..examine] {
                if visited.get(id) {
                    continue;
                }
                visited.set(id);

                let d = dis.distance_to(id);
                if d >= retset[l - 1].distance {
                    continue;
                }

                let r = insert_into_pool(&mut retset, l, Neighbor::new(id, d, true));
                if r < nk {
                    nk = r;
                }
            }
        }
        if nk <= k {
            k = nk;
        } else {
            k += 1;
        }
    }

    for i in 0..topk {
        labels[i] = retset[i].id;
        distances[i] = retset[i].distance;
    }

    visited.advance();
}
