//! Structural measurements over a finished graph.
//!
//! Used by the benchmark harness to report graph quality alongside recall:
//! weakly-connected component count, in/out-degree distributions, and the
//! total edge count. Everything serializes to JSON through `serde`.

use crate::graph::CsrGraph;
use serde::Serialize;
use std::collections::BTreeMap;

/// A degree histogram as parallel arrays: `nvertices[i]` vertices have
/// degree `degree[i]`.
#[derive(Debug, Clone, Serialize)]
pub struct DegreeDistribution {
    /// Distinct degree values, ascending.
    pub degree: Vec<usize>,
    /// Number of vertices with the corresponding degree.
    pub nvertices: Vec<usize>,
}

impl From<BTreeMap<usize, usize>> for DegreeDistribution {
    fn from(histogram: BTreeMap<usize, usize>) -> Self {
        let mut degree = Vec::with_capacity(histogram.len());
        let mut nvertices = Vec::with_capacity(histogram.len());
        for (d, count) in histogram {
            degree.push(d);
            nvertices.push(count);
        }
        Self { degree, nvertices }
    }
}

/// Summary of a graph's connectivity and degree structure.
#[derive(Debug, Clone, Serialize)]
pub struct GraphProperties {
    /// Weakly-connected component count.
    pub connected_components: usize,
    /// In-degree histogram.
    pub dist_indeg: DegreeDistribution,
    /// Out-degree histogram.
    pub dist_outdeg: DegreeDistribution,
    /// Total number of directed edges.
    pub total_degrees: usize,
}

impl GraphProperties {
    /// Measure `graph`. Edges are treated as undirected for the component
    /// count.
    pub fn measure(graph: &CsrGraph) -> Self {
        let n = graph.num_vertices();

        let mut uf = UnionFind::new(n);
        let mut indegrees = vec![0usize; n];
        let mut outdeg_hist: BTreeMap<usize, usize> = BTreeMap::new();

        for u in 0..n {
            let edges = graph.neighbors_of(u as u32);
            for &v in edges {
                uf.merge(u, v as usize);
                indegrees[v as usize] += 1;
            }
            *outdeg_hist.entry(edges.len()).or_insert(0) += 1;
        }

        let mut indeg_hist: BTreeMap<usize, usize> = BTreeMap::new();
        for &deg in &indegrees {
            *indeg_hist.entry(deg).or_insert(0) += 1;
        }

        let total_degrees = outdeg_hist.iter().map(|(d, count)| d * count).sum();

        Self {
            connected_components: uf.count_roots(),
            dist_indeg: indeg_hist.into(),
            dist_outdeg: outdeg_hist.into(),
            total_degrees,
        }
    }
}

/// Union-find with path halving.
struct UnionFind {
    parents: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parents: (0..n).collect(),
        }
    }

    fn root(&mut self, mut a: usize) -> usize {
        while self.parents[a] != a {
            self.parents[a] = self.parents[self.parents[a]];
            a = self.parents[a];
        }
        a
    }

    fn merge(&mut self, a: usize, b: usize) {
        let ra = self.root(a);
        let rb = self.root(b);
        if ra != rb {
            self.parents[ra] = rb;
        }
    }

    fn count_roots(&mut self) -> usize {
        (0..self.parents.len())
            .filter(|&i| self.root(i) == i)
            .count()
    }
}
