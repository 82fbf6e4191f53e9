//! Disk center from a grid of row and column chords.
//!
//! Every column chord that crosses the disk gives a midpoint in y, every row chord
//! a midpoint in x. The center is the mean midpoint per axis and the error is the
//! spread of those midpoints.

use nalgebra::{Point2, Vector2};
use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::LimbError;
use crate::limb::{ChordCrossings, LimbDetector};
use crate::roi::Roi;
use crate::stats::mean_std;

/// A limb crossing in full-frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimbPoint {
    pub position: Point2<f64>,
    /// Synthetic crossing placed at the chord boundary
    pub is_virtual: bool,
}

/// Result of one center search
#[derive(Debug, Clone, PartialEq)]
pub struct CenterEstimate {
    /// NaN on an axis where no chord crossed the disk
    pub center: Point2<f64>,
    pub error: Vector2<f64>,
    pub points: Vec<LimbPoint>,
    /// Limb-fit slope magnitudes from every accepted chord
    pub slopes: Vec<f64>,
}

/// Evenly spaced chord indices across `extent` pixels
pub fn chord_positions(extent: usize, density: usize) -> Vec<usize> {
    let density = density.min(extent);
    if density == 0 {
        return Vec::new();
    }
    let step = extent / density;
    let start = step / 2;
    (0..density).map(|k| start + k * step).collect()
}

/// Per-chord failure tallies, for diagnostics only
#[derive(Default)]
struct Rejections {
    no_edge: usize,
    non_finite: usize,
    out_of_window: usize,
    off_sensor: usize,
}

/// Search for the disk center inside `region` of `frame`.
///
/// `region` is the whole frame when searching and the previous region of interest
/// when tracking. Coordinates in the result are always full-frame.
pub fn find_center(
    frame: ArrayView2<u8>,
    region: &Roi,
    detector: &LimbDetector,
    density: usize,
) -> CenterEstimate {
    let mut scan = ChordScan {
        frame_dim: frame.dim(),
        offset: region.offset(),
        detector,
        density,
        points: Vec::new(),
        slopes: Vec::new(),
        rejections: Rejections::default(),
    };
    let view = region.view(frame);

    let y_midpoints = scan.axis(view, Axis(1));
    let x_midpoints = scan.axis(view, Axis(0));

    let rejected = &scan.rejections;
    log::trace!(
        "center chords: {} rows, {} columns accepted; rejected {} no edge, {} non-finite, {} out of window, {} off sensor",
        x_midpoints.len(),
        y_midpoints.len(),
        rejected.no_edge,
        rejected.non_finite,
        rejected.out_of_window,
        rejected.off_sensor
    );

    let (cx, ex) = summarize(&x_midpoints);
    let (cy, ey) = summarize(&y_midpoints);

    CenterEstimate {
        center: Point2::new(cx, cy),
        error: Vector2::new(ex, ey),
        points: scan.points,
        slopes: scan.slopes,
    }
}

struct ChordScan<'a> {
    /// Full frame `(rows, cols)`
    frame_dim: (usize, usize),
    /// Region offset `(x, y)`
    offset: (usize, usize),
    detector: &'a LimbDetector,
    density: usize,
    points: Vec<LimbPoint>,
    slopes: Vec<f64>,
    rejections: Rejections,
}

impl ChordScan<'_> {
    /// Run every chord along `axis` and return the accepted midpoints in frame
    /// coordinates. `Axis(1)` selects columns (chords along y), `Axis(0)` rows.
    fn axis(&mut self, view: ArrayView2<u8>, axis: Axis) -> Vec<f64> {
        let columns = axis == Axis(1);
        let (along_offset, across_offset, frame_extent) = if columns {
            (self.offset.1, self.offset.0, self.frame_dim.0)
        } else {
            (self.offset.0, self.offset.1, self.frame_dim.1)
        };

        let mut midpoints = Vec::new();
        for index in chord_positions(view.len_of(axis), self.density) {
            let chord = view.index_axis(axis, index);
            let crossings = match self.detector.detect(chord) {
                Ok(crossings) => crossings,
                Err(error) => {
                    match error {
                        LimbError::NoEdge => self.rejections.no_edge += 1,
                        LimbError::NonFinite => self.rejections.non_finite += 1,
                        LimbError::OutOfWindow => self.rejections.out_of_window += 1,
                    }
                    continue;
                }
            };
            if !on_sensor(&crossings, along_offset, chord.len(), frame_extent) {
                self.rejections.off_sensor += 1;
                continue;
            }

            let across = (across_offset + index) as f64;
            let along = along_offset as f64;
            for crossing in [crossings.leading, crossings.trailing] {
                let along = along + crossing.position();
                let position = if columns {
                    Point2::new(across, along)
                } else {
                    Point2::new(along, across)
                };
                self.points.push(LimbPoint {
                    position,
                    is_virtual: crossing.is_virtual(),
                });
                self.slopes.extend(crossing.slope());
            }
            midpoints.push(along + crossings.midpoint());
        }
        midpoints
    }
}

/// A crossing at the chord boundary is only believable if the chord boundary is
/// also the sensor boundary.
fn on_sensor(
    crossings: &ChordCrossings,
    along_offset: usize,
    chord_len: usize,
    frame_extent: usize,
) -> bool {
    if crossings.leading.is_virtual() && along_offset > 0 {
        return false;
    }
    if crossings.trailing.is_virtual() && along_offset + chord_len < frame_extent {
        return false;
    }
    true
}

fn summarize(midpoints: &[f64]) -> (f64, f64) {
    match mean_std(midpoints.iter().copied()) {
        Ok(stats) => (stats.mean, stats.std_dev),
        Err(_) => (f64::NAN, f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AspectConfig;
    use crate::synthetic::SyntheticScene;
    use approx::assert_abs_diff_eq;

    fn disk_scene(cx: f64, cy: f64) -> SyntheticScene {
        SyntheticScene {
            width: 320,
            height: 240,
            center: Point2::new(cx, cy),
            radius: 98.0,
            fiducials: Vec::new(),
            noise_sigma: 0.0,
            ..SyntheticScene::default()
        }
    }

    fn detector() -> LimbDetector {
        LimbDetector::new(&AspectConfig::default(), 20, 200)
    }

    #[test]
    fn test_chord_positions() {
        assert_eq!(chord_positions(100, 10), vec![5, 15, 25, 35, 45, 55, 65, 75, 85, 95]);
        assert_eq!(chord_positions(30, 4), vec![3, 10, 17, 24]);
        assert!(chord_positions(100, 0).is_empty());
        assert_eq!(chord_positions(3, 10).len(), 3);
    }

    #[test]
    fn test_centered_disk_all_densities() {
        let frame = disk_scene(160.3, 119.6).render();
        let region = Roi::full(240, 320);

        for density in [10, 20, 30] {
            let estimate = find_center(frame.view(), &region, &detector(), density);
            assert_abs_diff_eq!(estimate.center.x, 160.3, epsilon = 0.25);
            assert_abs_diff_eq!(estimate.center.y, 119.6, epsilon = 0.25);
            assert!(estimate.points.len() >= 4);
            assert!(estimate.points.iter().all(|p| !p.is_virtual));
            assert_eq!(estimate.slopes.len(), estimate.points.len());
        }
    }

    #[test]
    fn test_tracking_region_translates_to_frame() {
        let frame = disk_scene(170.0, 125.0).render();
        let region = Roi::around(170.0, 125.0, 122, 240, 320);
        assert!(region.offset().0 > 0);

        let estimate = find_center(frame.view(), &region, &detector(), 10);
        assert_abs_diff_eq!(estimate.center.x, 170.0, epsilon = 0.25);
        assert_abs_diff_eq!(estimate.center.y, 125.0, epsilon = 0.25);
        for point in &estimate.points {
            assert!(point.position.x >= region.cols.start as f64 - 1.0);
            assert!(point.position.x <= region.cols.end as f64);
        }
    }

    #[test]
    fn test_virtual_crossing_only_at_sensor_edge() {
        // Disk hangs off the left side of the frame
        let frame = disk_scene(40.0, 120.0).render();

        let full = Roi::full(240, 320);
        let estimate = find_center(frame.view(), &full, &detector(), 30);
        assert!(estimate.points.iter().any(|p| p.is_virtual));

        // Same disk seen through a crop that starts inside the frame; the crop edge
        // is not the sensor edge so rows running off it are discarded
        let cropped = Roi {
            rows: 0..240,
            cols: 20..320,
        };
        let estimate = find_center(frame.view(), &cropped, &detector(), 30);
        assert!(estimate.points.iter().all(|p| !p.is_virtual));
    }

    #[test]
    fn test_no_disk() {
        let frame = ndarray::Array2::from_elem((240, 320), 20u8);
        let estimate = find_center(frame.view(), &Roi::full(240, 320), &detector(), 10);
        assert!(estimate.points.is_empty());
        assert!(estimate.center.x.is_nan());
        assert!(estimate.center.y.is_nan());
    }
}
