//! Nearest-exemplar lookup.
//!
//! Uses an R-tree over the exemplar descriptors so assignment of a whole
//! season stays logarithmic in the number of clusters.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::ClusterId;
use crate::descriptor::DESCRIPTOR_LEN;

/// One exemplar in descriptor space.
#[derive(Debug, Clone, PartialEq)]
pub struct Exemplar {
    pub cluster: ClusterId,
    pub features: [f64; DESCRIPTOR_LEN],
}

impl RTreeObject for Exemplar {
    type Envelope = AABB<[f64; DESCRIPTOR_LEN]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.features)
    }
}

impl PointDistance for Exemplar {
    fn distance_2(&self, point: &[f64; DESCRIPTOR_LEN]) -> f64 {
        self.features
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b).powi(2))
            .sum()
    }
}

/// Spatial index of exemplars.
#[derive(Debug)]
pub struct ExemplarIndex {
    tree: RTree<Exemplar>,
}

impl ExemplarIndex {
    /// Index exemplars; cluster ids follow slice order.
    pub fn build(exemplars: &[[f64; DESCRIPTOR_LEN]]) -> Self {
        let entries: Vec<Exemplar> = exemplars
            .iter()
            .enumerate()
            .map(|(i, features)| Exemplar {
                cluster: ClusterId(i),
                features: *features,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Closest exemplar. Ties resolve to the lowest cluster id.
    pub fn nearest(&self, features: &[f64; DESCRIPTOR_LEN]) -> Option<ClusterId> {
        let mut candidates = self.tree.nearest_neighbor_iter_with_distance_2(features);
        let (first, best_distance) = candidates.next()?;
        let mut best = first.cluster;
        for (exemplar, distance) in candidates {
            if distance > best_distance {
                break;
            }
            best = best.min(exemplar.cluster);
        }
        Some(best)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(v: f64) -> [f64; DESCRIPTOR_LEN] {
        [v; DESCRIPTOR_LEN]
    }

    #[test]
    fn test_nearest_exemplar() {
        let index = ExemplarIndex::build(&[point(0.0), point(10.0), point(20.0)]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.nearest(&point(9.0)), Some(ClusterId(1)));
        assert_eq!(index.nearest(&point(-4.0)), Some(ClusterId(0)));
    }

    #[test]
    fn test_tie_goes_to_lowest_cluster() {
        let index = ExemplarIndex::build(&[point(0.0), point(10.0)]);
        assert_eq!(index.nearest(&point(5.0)), Some(ClusterId(0)));
    }

    #[test]
    fn test_empty_index() {
        let index = ExemplarIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.nearest(&point(1.0)), None);
    }
}
