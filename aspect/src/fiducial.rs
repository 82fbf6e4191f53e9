//! Fiducial candidates from matched filtering of the solar region.

use nalgebra::Point2;
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::config::AspectConfig;
use crate::kernel::Kernel;
use crate::roi::{safe_range, Roi};
use crate::stats::mean_std;

/// A sub-pixel fiducial position in full-frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiducialCandidate {
    pub position: Point2<f64>,
    /// Correlation peak height in standard deviations above the surface mean
    pub strength: f64,
}

/// Integer local maximum on the correlation surface
#[derive(Debug, Clone, Copy)]
struct Peak {
    row: usize,
    col: usize,
    value: f64,
}

pub struct FiducialFinder<'a> {
    kernel: &'a Kernel,
    threshold_sigma: f64,
    separation: usize,
    capacity: usize,
    refine_half_width: usize,
}

impl<'a> FiducialFinder<'a> {
    pub fn new(kernel: &'a Kernel, config: &AspectConfig) -> Self {
        Self {
            kernel,
            threshold_sigma: config.fiducial_threshold,
            separation: 2 * config.fiducial_length,
            capacity: config.num_fiducials,
            refine_half_width: config.fiducial_width,
        }
    }

    /// Locate up to `capacity` fiducials inside `roi`.
    ///
    /// Intensities are clipped at `frame_max` first so saturated regions do not
    /// dominate the correlation.
    pub fn find(
        &self,
        frame: ArrayView2<u8>,
        roi: &Roi,
        frame_max: u8,
    ) -> Vec<FiducialCandidate> {
        let ceiling = frame_max as f64;
        let image = roi.view(frame).mapv(|v| (v as f64).min(ceiling));
        let surface = self.kernel.correlate(image.view());

        let Ok(stats) = mean_std(surface.iter().copied()) else {
            return Vec::new();
        };
        if stats.std_dev <= 0.0 {
            return Vec::new();
        }

        let peaks = self.local_maxima(&surface, stats.mean + self.threshold_sigma * stats.std_dev);

        let (roi_x, roi_y) = roi.offset();
        let half = (self.kernel.side() / 2) as f64;
        let offset = Point2::new(roi_x as f64 + half, roi_y as f64 + half);
        let loose = stats.mean + self.threshold_sigma / 2.0 * stats.std_dev;

        let mut candidates: Vec<FiducialCandidate> = peaks
            .iter()
            .map(|peak| FiducialCandidate {
                position: self.refine(&surface, peak, loose) + offset.coords,
                strength: (peak.value - stats.mean) / stats.std_dev,
            })
            .collect();
        candidates.retain(|c| c.position.x.is_finite() && c.position.y.is_finite());

        log::trace!(
            "correlation mean {:.1} sd {:.1}: {} peaks kept",
            stats.mean,
            stats.std_dev,
            candidates.len()
        );
        candidates
    }

    /// Strict 4-neighbour maxima above `threshold`, deduplicated and capped.
    ///
    /// A maximum within the exclusion box of an existing peak replaces it when
    /// stronger and is dropped otherwise. With the list full, a new maximum evicts
    /// the weakest kept peak if stronger.
    fn local_maxima(&self, surface: &Array2<f64>, threshold: f64) -> Vec<Peak> {
        let (rows, cols) = surface.dim();
        let mut peaks: Vec<Peak> = Vec::new();
        if self.capacity == 0 {
            return peaks;
        }

        for m in 1..rows.saturating_sub(1) {
            for n in 1..cols.saturating_sub(1) {
                let value = surface[[m, n]];
                if value <= threshold
                    || value <= surface[[m, n + 1]]
                    || value <= surface[[m, n - 1]]
                    || value <= surface[[m + 1, n]]
                    || value <= surface[[m - 1, n]]
                {
                    continue;
                }
                let peak = Peak {
                    row: m,
                    col: n,
                    value,
                };

                if let Some(existing) = peaks.iter_mut().find(|p| {
                    p.row.abs_diff(m) < self.separation && p.col.abs_diff(n) < self.separation
                }) {
                    if value > existing.value {
                        *existing = peak;
                    }
                    continue;
                }

                if peaks.len() < self.capacity {
                    peaks.push(peak);
                } else if let Some(weakest) = peaks
                    .iter_mut()
                    .reduce(|weakest, p| if p.value < weakest.value { p } else { weakest })
                {
                    if value > weakest.value {
                        *weakest = peak;
                    }
                }
            }
        }
        peaks
    }

    /// Weighted centroid of the surface values above `threshold` around `peak`,
    /// in surface coordinates
    fn refine(&self, surface: &Array2<f64>, peak: &Peak, threshold: f64) -> Point2<f64> {
        let w = self.refine_half_width as f64;
        let rows = safe_range(
            peak.row as f64 - w,
            peak.row as f64 + w + 1.0,
            surface.nrows(),
        );
        let cols = safe_range(
            peak.col as f64 - w,
            peak.col as f64 + w + 1.0,
            surface.ncols(),
        );

        let mut sum_row = 0.0;
        let mut sum_col = 0.0;
        let mut total = 0.0;
        let window = surface.slice(s![rows.clone(), cols.clone()]);
        for ((r, c), &value) in window.indexed_iter() {
            if value > threshold {
                sum_row += (rows.start + r) as f64 * value;
                sum_col += (cols.start + c) as f64 * value;
                total += value;
            }
        }

        Point2::new(sum_col / total, sum_row / total)
    }
}
