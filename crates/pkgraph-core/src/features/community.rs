//! Greedy modularity communities and the community-relative edge ratio.
//!
//! # Algorithm
//!
//! Clauset–Newman–Moore agglomeration on the undirected projection:
//!
//! 1. Start with every node in its own community. For each edge `(i, j)`,
//!    `ΔQ_ij = 1/m − k_i·k_j / (2m²)` and `a_i = k_i / 2m`.
//! 2. Repeatedly merge the pair with the largest `ΔQ` (ties broken by the
//!    lowest `(i, j)`), folding the higher-numbered community into the lower.
//! 3. Stop once the best available `ΔQ` is negative or no pairs remain.
//!
//! Each row's best pair sits in a max-heap, so choosing the next merge does
//! not rescan every row.
//!
//! Communities are returned largest first; equal sizes are ordered by their
//! smallest member position.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use super::undirected::Projection;
use crate::graph::AttrValue;

/// Partition the projection into communities of positions.
///
/// A graph without edges yields one singleton community per node.
#[must_use]
pub fn greedy_modularity(view: &Projection) -> Vec<Vec<usize>> {
    let n = view.len();
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    if view.edge_count() > 0 {
        let (mut dq, mut a) = initial_state(view);
        let mut queue = PairQueue::new(&dq);

        while let Some((i, j, best)) = queue.pop() {
            if best < 0.0 {
                break;
            }
            merge_into(&mut dq, &mut a, i, j);
            let absorbed = std::mem::take(&mut members[j]);
            members[i].extend(absorbed);

            let touched: Vec<usize> = dq[i].keys().copied().collect();
            queue.refresh(&dq, i);
            queue.refresh(&dq, j);
            for k in touched {
                queue.refresh(&dq, k);
            }
        }
    }

    let mut communities: Vec<Vec<usize>> = members.into_iter().filter(|c| !c.is_empty()).collect();
    for community in &mut communities {
        community.sort_unstable();
    }
    communities.sort_by(|x, y| y.len().cmp(&x.len()).then_with(|| x[0].cmp(&y[0])));
    communities
}

/// Sparse `ΔQ` rows and `a_i` for the all-singletons partition.
#[allow(clippy::cast_precision_loss)]
fn initial_state(view: &Projection) -> (Vec<BTreeMap<usize, f64>>, Vec<f64>) {
    let m = view.edge_count() as f64;
    let a = (0..view.len()).map(|i| view.degree(i) as f64 / (2.0 * m)).collect();
    let dq = (0..view.len())
        .map(|i| {
            let ki = view.degree(i) as f64;
            view.neighbors(i)
                .iter()
                .map(|&j| {
                    let kj = view.degree(j) as f64;
                    (j, 1.0 / m - ki * kj / (2.0 * m * m))
                })
                .collect()
        })
        .collect();
    (dq, a)
}

/// Best `ΔQ` of one row, as computed at row version `version`.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    value: f64,
    i: usize,
    j: usize,
    version: u64,
}

// Larger ΔQ first, then the lowest (i, j).
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| other.i.cmp(&self.i))
            .then_with(|| other.j.cmp(&self.j))
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Max-heap of row maxima over pairs `i < j`.
///
/// Entries are invalidated lazily: refreshing a row bumps its version and
/// older entries for that row are skipped on pop.
struct PairQueue {
    heap: BinaryHeap<Candidate>,
    versions: Vec<u64>,
}

impl PairQueue {
    fn new(dq: &[BTreeMap<usize, f64>]) -> Self {
        let mut queue = Self {
            heap: BinaryHeap::with_capacity(dq.len()),
            versions: vec![0; dq.len()],
        };
        for i in 0..dq.len() {
            queue.push_row(dq, i);
        }
        queue
    }

    fn refresh(&mut self, dq: &[BTreeMap<usize, f64>], i: usize) {
        self.versions[i] += 1;
        self.push_row(dq, i);
    }

    fn push_row(&mut self, dq: &[BTreeMap<usize, f64>], i: usize) {
        let mut best: Option<(usize, f64)> = None;
        for (&j, &value) in dq[i].range(i + 1..) {
            if best.is_none_or(|(_, b)| value > b) {
                best = Some((j, value));
            }
        }
        if let Some((j, value)) = best {
            self.heap.push(Candidate {
                value,
                i,
                j,
                version: self.versions[i],
            });
        }
    }

    /// Largest current `ΔQ` as `(i, j, ΔQ)`.
    fn pop(&mut self) -> Option<(usize, usize, f64)> {
        while let Some(c) = self.heap.pop() {
            if c.version == self.versions[c.i] {
                return Some((c.i, c.j, c.value));
            }
        }
        None
    }
}

/// Fold community `j` into community `i`.
fn merge_into(dq: &mut [BTreeMap<usize, f64>], a: &mut [f64], i: usize, j: usize) {
    let row_i = std::mem::take(&mut dq[i]);
    let row_j = std::mem::take(&mut dq[j]);

    let mut merged = BTreeMap::new();
    for (&k, &dq_ik) in &row_i {
        if k == j {
            continue;
        }
        let value = match row_j.get(&k) {
            Some(&dq_jk) => dq_ik + dq_jk,
            None => 2.0f64.mul_add(-a[j] * a[k], dq_ik),
        };
        merged.insert(k, value);
    }
    for (&k, &dq_jk) in &row_j {
        if k == i || row_i.contains_key(&k) {
            continue;
        }
        merged.insert(k, 2.0f64.mul_add(-a[i] * a[k], dq_jk));
    }

    for (&k, &value) in &merged {
        dq[k].remove(&j);
        dq[k].insert(i, value);
    }
    dq[i] = merged;

    a[i] += a[j];
    a[j] = 0.0;
}

/// Community id for each position, from [`greedy_modularity`] output.
#[must_use]
pub fn assignment(len: usize, communities: &[Vec<usize>]) -> Vec<Option<usize>> {
    let mut out = vec![None; len];
    for (id, community) in communities.iter().enumerate() {
        for &pos in community {
            if let Some(slot) = out.get_mut(pos) {
                *slot = Some(id);
            }
        }
    }
    out
}

/// Ratio of a node's inter-community to intra-community neighbors.
///
/// `+inf` when every neighbor is in another community, `0` for nodes without
/// neighbors, and [`AttrValue::Null`] for positions with no community. A
/// self-loop makes the node one of its own intra-community neighbors.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn inter_intra_ratio(view: &Projection, assignment: &[Option<usize>]) -> Vec<AttrValue> {
    (0..view.len())
        .map(|pos| {
            let Some(own) = assignment.get(pos).copied().flatten() else {
                return AttrValue::Null;
            };
            let (mut intra, mut inter) = (0usize, 0usize);
            for &nb in view.neighbors(pos) {
                if assignment.get(nb).copied().flatten() == Some(own) {
                    intra += 1;
                } else {
                    inter += 1;
                }
            }
            if view.has_self_loop(pos) {
                intra += 1;
            }
            let ratio = match (inter, intra) {
                (_, i) if i > 0 => inter as f64 / i as f64,
                (0, _) => 0.0,
                _ => f64::INFINITY,
            };
            AttrValue::Float(ratio)
        })
        .collect()
}
