//! Lattice identities for fiducial candidates.
//!
//! Markers on neighbouring lattice rows sit one fiducial spacing apart in x, and
//! markers on neighbouring columns one spacing apart in y. The separation along
//! the other axis is unique to the pair of lattice indices involved, so every
//! matched pair votes for the absolute indices of both members.
//!
//! Identification runs in two passes. The first pass votes from pair separations.
//! The second fills indices the first pass left empty by propagating from the
//! partner in each pair: shared index across the pair, neighbouring index along it.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::config::AspectConfig;
use crate::mapping::LatticeIndex;
use crate::math::{mode, rotate_deg, Mode};

/// Number of tabulated neighbour separations, for lattice indices -7..=7
pub const LATTICE_STEPS: usize = 14;

/// Identities below this are never considered valid
pub const MIN_VALID_INDEX: i32 = -10;

/// Outcome of voting on one lattice axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisIndex {
    Resolved(i32),
    /// Votes tied between two or more indices
    Ambiguous,
    /// No votes were cast
    Unresolved,
}

impl AxisIndex {
    pub fn value(self) -> Option<i32> {
        match self {
            AxisIndex::Resolved(index) if index >= MIN_VALID_INDEX => Some(index),
            _ => None,
        }
    }
}

/// Identity of one fiducial candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiducialId {
    pub row: AxisIndex,
    pub col: AxisIndex,
}

impl FiducialId {
    pub fn resolved(&self) -> Option<LatticeIndex> {
        Some(LatticeIndex::new(self.row.value()?, self.col.value()?))
    }
}

impl From<LatticeIndex> for FiducialId {
    fn from(index: LatticeIndex) -> Self {
        Self {
            row: AxisIndex::Resolved(index.row),
            col: AxisIndex::Resolved(index.col),
        }
    }
}

/// Candidate index pairs that match the lattice spacing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiducialPairs {
    /// Neighbours along the row index: x differs by one spacing
    pub rows: Vec<(usize, usize)>,
    /// Neighbours along the column index: y differs by one spacing
    pub cols: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identification {
    pub ids: Vec<FiducialId>,
    pub pairs: FiducialPairs,
}

impl Identification {
    pub fn valid_count(&self) -> usize {
        self.ids.iter().filter(|id| id.resolved().is_some()).count()
    }
}

/// Separation between markers `d - 7` and `d - 6` along one axis, in pixels
pub fn lattice_distances(spacing: f64) -> [f64; LATTICE_STEPS] {
    let mut distances = [0.0; LATTICE_STEPS];
    for (d, distance) in distances.iter_mut().enumerate() {
        let steps = if d < 7 { 84 - 6 * d } else { 45 + 6 * (d - 7) };
        *distance = steps as f64 * spacing / 15.0;
    }
    distances
}

/// A single vote on one axis.
///
/// A vote propagated from a partner whose index was itself ambiguous carries the
/// offset it would have applied. Such votes never resolve to an index; they only
/// compete in the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Vote {
    Index(i32),
    Tainted(i32),
}

impl Vote {
    /// Vote for the partner's index shifted by `offset`
    fn from_partner(partner: AxisIndex, offset: i32) -> Option<Self> {
        match partner {
            AxisIndex::Resolved(index) => Some(Vote::Index(index + offset)),
            AxisIndex::Ambiguous => Some(Vote::Tainted(offset)),
            AxisIndex::Unresolved => None,
        }
    }
}

fn tally(votes: &[Vote]) -> AxisIndex {
    match mode(votes) {
        Mode::Unique(Vote::Index(index)) => AxisIndex::Resolved(index),
        Mode::Unique(Vote::Tainted(_)) | Mode::Tied => AxisIndex::Ambiguous,
        Mode::Empty => AxisIndex::Unresolved,
    }
}

/// Assign lattice identities to candidate positions
pub struct Identifier {
    spacing: f64,
    tolerance: f64,
    twist_deg: f64,
    distances: [f64; LATTICE_STEPS],
}

impl Identifier {
    pub fn new(config: &AspectConfig) -> Self {
        Self {
            spacing: config.fiducial_spacing,
            tolerance: config.fiducial_spacing_tol,
            twist_deg: config.fiducial_twist,
            distances: lattice_distances(config.fiducial_spacing),
        }
    }

    pub fn identify(&self, positions: &[Point2<f64>]) -> Identification {
        let rotated: Vec<Point2<f64>> = positions
            .iter()
            .map(|p| rotate_deg(*p, self.twist_deg))
            .collect();

        let pairs = self.find_pairs(&rotated);
        let count = rotated.len();

        // First pass: absolute indices from pair separations
        let mut row_votes = vec![Vec::new(); count];
        let mut col_votes = vec![Vec::new(); count];
        for &(k, l) in &pairs.rows {
            self.separation_votes(rotated[l].y - rotated[k].y, k, l, &mut row_votes);
        }
        for &(k, l) in &pairs.cols {
            self.separation_votes(rotated[k].x - rotated[l].x, k, l, &mut col_votes);
        }

        let mut ids: Vec<FiducialId> = row_votes
            .iter()
            .zip(&col_votes)
            .map(|(rows, cols)| FiducialId {
                row: tally(rows),
                col: tally(cols),
            })
            .collect();

        // Second pass: fill gaps from partners
        let mut row_votes = vec![Vec::new(); count];
        let mut col_votes = vec![Vec::new(); count];
        for &(k, l) in &pairs.rows {
            let step = if rotated[l].y - rotated[k].y >= 0.0 { 1 } else { -1 };
            propagate(ids[k].col, ids[l].col, 0, k, l, &mut col_votes);
            propagate(ids[k].row, ids[l].row, step, k, l, &mut row_votes);
        }
        for &(k, l) in &pairs.cols {
            let step = if rotated[k].x - rotated[l].x >= 0.0 { 1 } else { -1 };
            propagate(ids[k].row, ids[l].row, 0, k, l, &mut row_votes);
            propagate(ids[k].col, ids[l].col, step, k, l, &mut col_votes);
        }

        for (id, (rows, cols)) in ids.iter_mut().zip(row_votes.iter().zip(&col_votes)) {
            if !rows.is_empty() {
                id.row = tally(rows);
            }
            if !cols.is_empty() {
                id.col = tally(cols);
            }
        }

        Identification { ids, pairs }
    }

    fn find_pairs(&self, rotated: &[Point2<f64>]) -> FiducialPairs {
        let lo = self.distances[7] - self.tolerance;
        let hi = self.distances[0] + self.tolerance;
        let in_span = |d: f64| d > lo && d < hi;
        let one_spacing = |d: f64| (d.abs() - self.spacing).abs() < self.tolerance;

        let mut pairs = FiducialPairs::default();
        for k in 0..rotated.len() {
            for l in k + 1..rotated.len() {
                let row_diff = rotated[k].y - rotated[l].y;
                let col_diff = rotated[k].x - rotated[l].x;
                if one_spacing(row_diff) && in_span(col_diff.abs()) {
                    pairs.cols.push((k, l));
                } else if one_spacing(col_diff) && in_span(row_diff.abs()) {
                    pairs.rows.push((k, l));
                }
            }
        }
        pairs
    }

    /// Votes from a separation that is positive when `l` has the higher index
    fn separation_votes(&self, diff: f64, k: usize, l: usize, votes: &mut [Vec<Vote>]) {
        for (d, distance) in self.distances.iter().enumerate() {
            if (diff.abs() - distance).abs() < self.tolerance {
                let lower = d as i32 - 7;
                let (vk, vl) = if diff > 0.0 {
                    (lower, lower + 1)
                } else {
                    (lower + 1, lower)
                };
                votes[k].push(Vote::Index(vk));
                votes[l].push(Vote::Index(vl));
            }
        }
    }
}

/// Give the unresolved member of a pair a vote derived from the other member.
/// `step` is the index increase from `k` to `l`.
fn propagate(
    at_k: AxisIndex,
    at_l: AxisIndex,
    step: i32,
    k: usize,
    l: usize,
    votes: &mut [Vec<Vote>],
) {
    match (at_k, at_l) {
        (AxisIndex::Unresolved, partner) => votes[k].extend(Vote::from_partner(partner, -step)),
        (partner, AxisIndex::Unresolved) => votes[l].extend(Vote::from_partner(partner, step)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{lattice, SyntheticScene};

    fn identify_scene(scene: &SyntheticScene, config: &AspectConfig) -> Identification {
        let positions: Vec<Point2<f64>> = scene
            .fiducial_positions()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        Identifier::new(config).identify(&positions)
    }

    #[test]
    fn test_lattice_distances() {
        let d = lattice_distances(15.0);
        assert_eq!(d[0], 84.0);
        assert_eq!(d[6], 48.0);
        assert_eq!(d[7], 45.0);
        assert_eq!(d[13], 81.0);
    }

    #[test]
    fn test_full_lattice_resolves() {
        let scene = SyntheticScene {
            fiducials: lattice(-2..=1, -1..=1),
            ..SyntheticScene::default()
        };
        let config = AspectConfig::default();
        let result = identify_scene(&scene, &config);

        let truth: Vec<LatticeIndex> = scene.fiducials.clone();
        for (id, expected) in result.ids.iter().zip(&truth) {
            assert_eq!(id.resolved(), Some(*expected), "{id:?}");
        }
        assert_eq!(result.valid_count(), 12);
        assert!(!result.pairs.rows.is_empty());
        assert!(!result.pairs.cols.is_empty());
    }

    #[test]
    fn test_pairs_are_exclusive() {
        let scene = SyntheticScene {
            fiducials: lattice(-2..=1, -1..=1),
            ..SyntheticScene::default()
        };
        let result = identify_scene(&scene, &AspectConfig::default());
        for pair in &result.pairs.rows {
            assert!(!result.pairs.cols.contains(pair));
        }
    }

    #[test]
    fn test_idempotent() {
        let scene = SyntheticScene {
            fiducials: lattice(-2..=1, -1..=1),
            ..SyntheticScene::default()
        };
        let config = AspectConfig::default();
        let first = identify_scene(&scene, &config);
        let second = identify_scene(&scene, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_twist_compensated() {
        let scene = SyntheticScene {
            fiducials: lattice(-1..=1, -1..=1),
            twist_deg: 4.0,
            ..SyntheticScene::default()
        };
        let mut config = AspectConfig::default();

        config.fiducial_twist = 4.0;
        let result = identify_scene(&scene, &config);
        for (id, expected) in result.ids.iter().zip(&scene.fiducials) {
            assert_eq!(id.resolved(), Some(*expected));
        }
    }

    #[test]
    fn test_second_pass_fills_from_partner() {
        // Markers (0, 0) and (1, 0) form a row pair; (0, 0) and (0, 1) a column pair.
        // The row index of (0, 1) is only reachable through propagation.
        let scene = SyntheticScene {
            fiducials: vec![
                LatticeIndex::new(0, 0),
                LatticeIndex::new(1, 0),
                LatticeIndex::new(0, 1),
            ],
            ..SyntheticScene::default()
        };
        let result = identify_scene(&scene, &AspectConfig::default());
        assert_eq!(result.pairs.rows, vec![(0, 1)]);
        assert_eq!(result.pairs.cols, vec![(0, 2)]);
        for (id, expected) in result.ids.iter().zip(&scene.fiducials) {
            assert_eq!(id.resolved(), Some(*expected));
        }
    }

    #[test]
    fn test_isolated_marker_unresolved() {
        let positions = [Point2::new(100.0, 100.0), Point2::new(200.0, 30.0)];
        let result = Identifier::new(&AspectConfig::default()).identify(&positions);
        assert!(result.pairs.rows.is_empty() && result.pairs.cols.is_empty());
        for id in &result.ids {
            assert_eq!(id.row, AxisIndex::Unresolved);
            assert_eq!(id.col, AxisIndex::Unresolved);
            assert_eq!(id.resolved(), None);
        }
    }

    #[test]
    fn test_tally() {
        assert_eq!(
            tally(&[Vote::Index(2), Vote::Index(2), Vote::Index(1)]),
            AxisIndex::Resolved(2)
        );
        assert_eq!(tally(&[Vote::Index(2), Vote::Index(1)]), AxisIndex::Ambiguous);
        assert_eq!(tally(&[Vote::Tainted(1)]), AxisIndex::Ambiguous);
        assert_eq!(
            tally(&[Vote::Index(0), Vote::Index(0), Vote::Tainted(0)]),
            AxisIndex::Resolved(0)
        );
        assert_eq!(tally(&[]), AxisIndex::Unresolved);
    }
}
