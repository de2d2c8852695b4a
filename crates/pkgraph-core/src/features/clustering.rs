//! Local clustering coefficient on the undirected projection.

use super::undirected::Projection;

/// `2T / (d(d − 1))` per position, where `T` counts links among the node's
/// neighbors. Nodes with fewer than two neighbors score 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn clustering(view: &Projection) -> Vec<f64> {
    (0..view.len())
        .map(|pos| {
            let neighbors: Vec<usize> = view.neighbors(pos).iter().copied().collect();
            let d = neighbors.len();
            if d < 2 {
                return 0.0;
            }
            let links = neighbors
                .iter()
                .enumerate()
                .map(|(i, &u)| neighbors[i + 1..].iter().filter(|&&v| view.has_edge(u, v)).count())
                .sum::<usize>();
            (2 * links) as f64 / (d * (d - 1)) as f64
        })
        .collect()
}
