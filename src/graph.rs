//! Core graph data structures shared by the builder and the searcher.
//!
//! This module provides:
//! - `Neighbor`: a `(id, distance, flag)` candidate-pool entry
//! - `Nhood`: a per-vertex mutable pool with its own lock (build-time only)
//! - `CsrGraph`: the finished graph in CSR (Compressed Sparse Row) format
//! - Sorted-pool insertion and distinct-id sampling primitives used by both
//!   graph construction and search
//!
//! # CSR Layout
//!
//! The finished graph is stored as two flat arrays:
//! - `neighbors: Vec<u32>`: all out-neighbor ids packed contiguously
//! - `offsets: Vec<usize>`: vertex u's neighbors are at
//!   `neighbors[offsets[u]..offsets[u + 1]]`
//!
//! Neighbor lists are ordered closest-first at finalization; the distances
//! themselves are discarded.

use parking_lot::Mutex;
use std::collections::HashSet;

/// A candidate-pool entry: a neighboring vertex with its distance from the
/// pool's owner (or from the query, during search).
///
/// `flag` marks the entry as "new": it has not yet been used as the origin
/// of outgoing comparisons in the current refinement pass, or has not been
/// expanded yet during search.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Neighbor {
    /// Vertex id.
    pub id: u32,
    /// Distance to the pool owner (lower is closer).
    pub distance: f32,
    /// Active bit; see above.
    pub flag: bool,
}

impl Neighbor {
    /// Create an entry.
    pub fn new(id: u32, distance: f32, flag: bool) -> Self {
        Self { id, distance, flag }
    }
}

/// Sort a pool ascending by distance.
///
/// The sort is stable, so entries at equal distance keep insertion order and
/// [`dedup_by_id`] retains the first occurrence.
pub(crate) fn sort_pool(pool: &mut [Neighbor]) {
    pool.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

/// Remove duplicate ids from a pool, keeping the first occurrence.
pub(crate) fn dedup_by_id(pool: &mut Vec<Neighbor>) {
    let mut seen = HashSet::with_capacity(pool.len());
    pool.retain(|nn| seen.insert(nn.id));
}

/// Per-vertex neighborhood during construction.
///
/// The pool is guarded by its own mutex so that workers refining other
/// vertices can push promoted edges concurrently. Critical sections are
/// short: pool swap/splice on entry/exit of a refinement pass, and
/// single-element pushes from neighboring vertices. A worker never holds
/// two `Nhood` locks at once.
#[derive(Debug, Default)]
pub(crate) struct Nhood {
    pub pool: Mutex<Vec<Neighbor>>,
}

impl Nhood {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: Mutex::new(Vec::with_capacity(capacity)),
        }
    }
}

/// The finished k-nearest-neighbor graph in CSR format.
///
/// Immutable after construction; shared read-only across search threads.
#[derive(Debug, Clone, Default)]
pub struct CsrGraph {
    offsets: Vec<usize>,
    neighbors: Vec<u32>,
}

impl CsrGraph {
    pub(crate) fn new(offsets: Vec<usize>, neighbors: Vec<u32>) -> Self {
        debug_assert!(!offsets.is_empty());
        debug_assert_eq!(*offsets.last().unwrap_or(&0), neighbors.len());
        Self { offsets, neighbors }
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Total number of directed edges.
    pub fn num_edges(&self) -> usize {
        self.neighbors.len()
    }

    /// Out-neighbors of vertex `u`, closest first.
    pub fn neighbors_of(&self, u: u32) -> &[u32] {
        let u = u as usize;
        &self.neighbors[self.offsets[u]..self.offsets[u + 1]]
    }

    /// Out-degree of vertex `u`.
    pub fn out_degree(&self, u: u32) -> usize {
        let u = u as usize;
        self.offsets[u + 1] - self.offsets[u]
    }

    /// The offset table, of length `num_vertices() + 1`.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// The flat neighbor-id array.
    pub fn neighbor_ids(&self) -> &[u32] {
        &self.neighbors
    }
}

/// Insert `nn` into the first `size` slots of `pool` (which must have room
/// for one more), keeping ascending distance order.
///
/// Returns the insertion position, or `size + 1` when nothing changed: the
/// candidate is an equal-id duplicate at its distance column, or worse than
/// every resident entry. Callers use the position to track the earliest
/// disturbed slot and treat `size + 1` as "no disturbance".
pub(crate) fn insert_into_pool(pool: &mut [Neighbor], size: usize, nn: Neighbor) -> usize {
    debug_assert!(size >= 1 && pool.len() > size);
    let mut left = 0;
    let mut right = size - 1;
    if pool[left].distance > nn.distance {
        pool.copy_within(left..size, left + 1);
        pool[left] = nn;
        return left;
    }
    if pool[right].distance < nn.distance {
        pool[size] = nn;
        return size;
    }
    while left + 1 < right {
        let mid = (left + right) / 2;
        if pool[mid].distance > nn.distance {
            right = mid;
        } else {
            left = mid;
        }
    }
    // Scan the run of equal distances for a duplicate id.
    while left > 0 {
        if pool[left].distance < nn.distance {
            break;
        }
        if pool[left].id == nn.id {
            return size + 1;
        }
        left -= 1;
    }
    if pool[left].id == nn.id || pool[right].id == nn.id {
        return size + 1;
    }
    pool.copy_within(right..size, right + 1);
    pool[right] = nn;
    right
}

/// Fill `out` with `size` distinct ids drawn from `[0, n)`.
///
/// Draws `size` samples in `[0, n - size)`, sorts them, enforces strict
/// increase, then applies a random rotation modulo `n`; the rotation is a
/// bijection, so the ids stay distinct. When `size == n` the whole id range
/// is returned.
pub(crate) fn sample_distinct_ids(rng: &mut fastrand::Rng, size: usize, n: usize, out: &mut Vec<u32>) {
    debug_assert!(size <= n && n > 0);
    out.clear();
    if size >= n {
        out.extend(0..n as u32);
        return;
    }
    for _ in 0..size {
        out.push(rng.u32(0..(n - size) as u32));
    }
    out.sort_unstable();
    for i in 1..size {
        if out[i] <= out[i - 1] {
            out[i] = out[i - 1] + 1;
        }
    }
    let off = rng.u32(0..n as u32) as usize;
    for id in out.iter_mut() {
        *id = ((*id as usize + off) % n) as u32;
    }
}
