//! Synthetic solar frames for tests and bench tools.
//!
//! Renders a uniformly bright disk on a dark sky, with the fiducial mask shadow
//! drawn as dark crosses wherever a marker falls on the disk. Pixels along the limb
//! and the cross edges are supersampled so edges land at sub-pixel positions.

use std::ops::RangeInclusive;

use nalgebra::{Point2, Rotation2, Vector2};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::mapping::{screen_position, LatticeIndex};

/// Subsamples per pixel side on edge pixels
const SUPERSAMPLE: usize = 4;

/// Screen units per lattice spacing
const SCREEN_PER_SPACING: f64 = 90.0;

/// Every index in `rows x cols`, row-major
pub fn lattice(rows: RangeInclusive<i32>, cols: RangeInclusive<i32>) -> Vec<LatticeIndex> {
    rows.flat_map(|row| cols.clone().map(move |col| LatticeIndex::new(row, col)))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScene {
    pub width: usize,
    pub height: usize,
    /// Disk center in pixels
    pub center: Point2<f64>,
    pub radius: f64,
    pub sky_level: f64,
    pub disk_level: f64,
    /// Intensity inside a cross shadow on the disk
    pub fiducial_level: f64,
    /// Cross arm length and bar thickness, pixels
    pub arm_length: f64,
    pub bar_width: f64,
    /// Pixel position of lattice index (0, 0); the mask is fixed to the sensor
    pub lattice_origin: Point2<f64>,
    pub fiducial_spacing: f64,
    /// Mask roll relative to the sensor, degrees
    pub twist_deg: f64,
    pub fiducials: Vec<LatticeIndex>,
    /// Gaussian read noise, intensity units
    pub noise_sigma: f64,
    pub seed: u64,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            center: Point2::new(160.0, 120.0),
            radius: 98.0,
            sky_level: 20.0,
            disk_level: 200.0,
            fiducial_level: 90.0,
            arm_length: 15.0,
            bar_width: 3.0,
            lattice_origin: Point2::new(160.0, 120.0),
            fiducial_spacing: 15.6,
            twist_deg: 0.0,
            fiducials: lattice(-1..=1, -1..=1),
            noise_sigma: 1.5,
            seed: 42,
        }
    }
}

impl SyntheticScene {
    /// Pixel position of a marker.
    ///
    /// Screen x runs against pixel x and screen y with pixel y, both scaled so that
    /// 90 screen units span one fiducial spacing. The twist rotates the lattice
    /// clockwise about its origin, which the identifier undoes with a positive
    /// twist setting.
    pub fn fiducial_position(&self, index: LatticeIndex) -> Point2<f64> {
        let screen = screen_position(index);
        let scale = self.fiducial_spacing / SCREEN_PER_SPACING;
        let offset = Vector2::new(-screen.x * scale, screen.y * scale);
        self.lattice_origin + Rotation2::new(-self.twist_deg.to_radians()) * offset
    }

    pub fn fiducial_positions(&self) -> Vec<(LatticeIndex, Point2<f64>)> {
        self.fiducials
            .iter()
            .map(|&index| (index, self.fiducial_position(index)))
            .collect()
    }

    /// Markers whose whole cross lies on the disk
    pub fn visible_fiducials(&self) -> Vec<(LatticeIndex, Point2<f64>)> {
        let reach = self.arm_length / 2.0 * std::f64::consts::SQRT_2;
        self.fiducial_positions()
            .into_iter()
            .filter(|(_, p)| {
                nalgebra::distance(p, &self.center) + reach < self.radius
                    && p.x >= 0.0
                    && p.y >= 0.0
                    && p.x < self.width as f64
                    && p.y < self.height as f64
            })
            .collect()
    }

    pub fn render(&self) -> Array2<u8> {
        let crosses: Vec<Point2<f64>> = self
            .fiducial_positions()
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        let unrotate = Rotation2::new(self.twist_deg.to_radians());
        let half_arm = self.arm_length / 2.0;
        let half_bar = self.bar_width / 2.0;
        let reach = half_arm + 1.0;

        let intensity = |x: f64, y: f64, nearby: &[Point2<f64>]| -> f64 {
            let dx = x - self.center.x;
            let dy = y - self.center.y;
            if dx * dx + dy * dy >= self.radius * self.radius {
                return self.sky_level;
            }
            for p in nearby {
                let local = unrotate * Vector2::new(x - p.x, y - p.y);
                let (u, v) = (local.x.abs(), local.y.abs());
                if (u < half_arm && v < half_bar) || (v < half_arm && u < half_bar) {
                    return self.fiducial_level;
                }
            }
            self.disk_level
        };

        let mut frame = Array2::<f64>::zeros((self.height, self.width));
        for ((row, col), pixel) in frame.indexed_iter_mut() {
            let (x, y) = (col as f64, row as f64);
            let nearby: Vec<Point2<f64>> = crosses
                .iter()
                .filter(|p| (p.x - x).abs() < reach && (p.y - y).abs() < reach)
                .copied()
                .collect();
            let limb_distance = ((x - self.center.x).hypot(y - self.center.y) - self.radius).abs();

            *pixel = if nearby.is_empty() && limb_distance > 1.0 {
                intensity(x, y, &nearby)
            } else {
                let mut sum = 0.0;
                for i in 0..SUPERSAMPLE {
                    for j in 0..SUPERSAMPLE {
                        let sx = x + (j as f64 + 0.5) / SUPERSAMPLE as f64 - 0.5;
                        let sy = y + (i as f64 + 0.5) / SUPERSAMPLE as f64 - 0.5;
                        sum += intensity(sx, sy, &nearby);
                    }
                }
                sum / (SUPERSAMPLE * SUPERSAMPLE) as f64
            };
        }

        if self.noise_sigma > 0.0 {
            if let Ok(noise) = Normal::new(0.0, self.noise_sigma) {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                frame.iter_mut().for_each(|pixel| *pixel += noise.sample(&mut rng));
            }
        }

        frame.mapv(|v| v.round().clamp(0.0, 255.0) as u8)
    }
}
