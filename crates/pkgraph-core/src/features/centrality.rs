//! Degree, betweenness and closeness centrality.
//!
//! Degree centrality uses the undirected projection. Betweenness and
//! closeness follow edge direction (`A → B` when A depends on B) and only
//! count pairs where the target is reachable from the source.
//!
//! All functions return one score per graph node, indexed by
//! `NodeIndex::index()` for the directed measures and by projection position
//! for degree centrality.

use std::collections::VecDeque;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{IntoNodeIdentifiers, NodeIndexable};
use tracing::instrument;

use super::undirected::Projection;

// ---------------------------------------------------------------------------
// Degree
// ---------------------------------------------------------------------------

/// Undirected degree divided by `n − 1`, with a self-loop counted twice.
/// A lone node scores 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn degree_centrality(view: &Projection) -> Vec<f64> {
    if view.is_empty() {
        return Vec::new();
    }
    let n = view.len();
    if n == 1 {
        return vec![1.0];
    }
    let scale = 1.0 / (n - 1) as f64;
    (0..n)
        .map(|pos| {
            // A self-loop adds both of its ends to the degree.
            let degree = view.degree(pos) + 2 * usize::from(view.has_self_loop(pos));
            degree as f64 * scale
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Betweenness
// ---------------------------------------------------------------------------

/// Betweenness centrality via Brandes' algorithm, normalized by
/// `1 / ((n − 1)(n − 2))` when `n > 2`.
///
/// Self-loops never lie on a shortest path and have no effect.
#[must_use]
#[instrument(skip_all, fields(nodes = g.node_count()))]
#[allow(clippy::cast_precision_loss)]
pub fn betweenness_centrality<N, E>(g: &DiGraph<N, E>) -> Vec<f64> {
    let n = g.node_count();
    let mut cb: Vec<f64> = vec![0.0; n];

    for s in g.node_identifiers() {
        let si = g.to_index(s);

        // Nodes in BFS order; popped farthest first.
        let mut stack: Vec<NodeIndex> = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<NodeIndex>> = vec![Vec::new(); n];

        // sigma[t]: number of shortest paths from s to t.
        let mut sigma: Vec<f64> = vec![0.0; n];
        sigma[si] = 1.0;

        // dist[t]: -1 until visited.
        let mut dist: Vec<i64> = vec![-1; n];
        dist[si] = 0;

        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            let vi = g.to_index(v);
            stack.push(v);

            for w in g.neighbors_directed(v, Direction::Outgoing) {
                let wi = g.to_index(w);
                if dist[wi] < 0 {
                    dist[wi] = dist[vi] + 1;
                    queue.push_back(w);
                }
                if dist[wi] == dist[vi] + 1 {
                    sigma[wi] += sigma[vi];
                    predecessors[wi].push(v);
                }
            }
        }

        let mut delta: Vec<f64> = vec![0.0; n];
        while let Some(w) = stack.pop() {
            let wi = g.to_index(w);
            for &v in &predecessors[wi] {
                let vi = g.to_index(v);
                if sigma[wi] > 0.0 {
                    delta[vi] += (sigma[vi] / sigma[wi]) * (1.0 + delta[wi]);
                }
            }
            if wi != si {
                cb[wi] += delta[wi];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
        for score in &mut cb {
            *score *= scale;
        }
    }
    cb
}

// ---------------------------------------------------------------------------
// Closeness
// ---------------------------------------------------------------------------

/// Closeness from each node to the nodes it can reach.
///
/// With `r` reachable nodes (counting the node itself) at total distance
/// `Σd`, the score is `(r − 1) / Σd`. When `wf_improved` is set the score is
/// further scaled by `(r − 1) / (n − 1)` so that nodes reaching only a small
/// part of a disconnected graph are not over-rated. Nodes that reach nothing
/// score 0.
#[must_use]
#[instrument(skip_all, fields(nodes = g.node_count()))]
#[allow(clippy::cast_precision_loss)]
pub fn closeness_centrality<N, E>(g: &DiGraph<N, E>, wf_improved: bool) -> Vec<f64> {
    let n = g.node_count();
    g.node_identifiers()
        .map(|s| {
            let (reached, total) = bfs_distances(g, s);
            if total == 0 || n < 2 {
                return 0.0;
            }
            let others = (reached - 1) as f64;
            let mut score = others / total as f64;
            if wf_improved {
                score *= others / (n - 1) as f64;
            }
            score
        })
        .collect()
}

/// `(nodes reached including s, sum of distances)` along outgoing edges.
fn bfs_distances<N, E>(g: &DiGraph<N, E>, s: NodeIndex) -> (usize, usize) {
    let mut dist: Vec<Option<usize>> = vec![None; g.node_count()];
    dist[g.to_index(s)] = Some(0);
    let mut queue = VecDeque::from([s]);
    let (mut reached, mut total) = (0usize, 0usize);

    while let Some(v) = queue.pop_front() {
        let dv = dist[g.to_index(v)].unwrap_or(0);
        reached += 1;
        total += dv;
        for w in g.neighbors_directed(v, Direction::Outgoing) {
            let slot = &mut dist[g.to_index(w)];
            if slot.is_none() {
                *slot = Some(dv + 1);
                queue.push_back(w);
            }
        }
    }
    (reached, total)
}
