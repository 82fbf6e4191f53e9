//! Sub-pixel limb crossings along a single chord.
//!
//! A chord is one row or column of the frame. The detector looks for exactly one
//! rise onto the disk and one fall off it, then refines each edge by fitting a
//! line to the samples around it and solving for the limb threshold.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::config::AspectConfig;
use crate::error::LimbError;
use crate::math::fit_line;

/// A threshold crossing found by the integer scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    /// First sample above the threshold
    Rising(usize),
    /// Last sample above the threshold
    Falling(usize),
    /// Disk already bright at the start of the chord
    VirtualLeading,
    /// Disk still bright at the end of the chord
    VirtualTrailing,
}

/// One end of the disk along a chord
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LimbCrossing {
    /// Sub-pixel edge with the magnitude of the fitted intensity slope
    Fitted { position: f64, slope: f64 },
    /// The disk runs off the end of the chord; position is `-1` or the chord length
    Virtual { position: f64 },
}

impl LimbCrossing {
    pub fn position(&self) -> f64 {
        match *self {
            LimbCrossing::Fitted { position, .. } | LimbCrossing::Virtual { position } => position,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, LimbCrossing::Virtual { .. })
    }

    pub fn slope(&self) -> Option<f64> {
        match *self {
            LimbCrossing::Fitted { slope, .. } => Some(slope),
            LimbCrossing::Virtual { .. } => None,
        }
    }
}

/// Leading and trailing crossings of one chord
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordCrossings {
    pub leading: LimbCrossing,
    pub trailing: LimbCrossing,
}

impl ChordCrossings {
    pub fn midpoint(&self) -> f64 {
        (self.leading.position() + self.trailing.position()) / 2.0
    }
}

/// Chord-level limb detector for one frame's intensity thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct LimbDetector {
    /// Intensity at the limb
    pub lower: f64,
    /// Intensity a chord must exceed somewhere to cross the disk
    pub upper: f64,
    pub min_limb_width: usize,
    pub fit_width: usize,
    pub solar_radius: usize,
}

impl LimbDetector {
    /// Thresholds placed at the configured fractions of `[min, max]`
    pub fn new(config: &AspectConfig, min: u8, max: u8) -> Self {
        let min = min as f64;
        let range = max as f64 - min;
        Self {
            lower: min + config.limb_threshold * range,
            upper: min + config.disk_threshold * range,
            min_limb_width: config.min_limb_width,
            fit_width: config.limb_fit_width,
            solar_radius: config.solar_radius,
        }
    }

    pub fn detect(&self, chord: ArrayView1<u8>) -> Result<ChordCrossings, LimbError> {
        let len = chord.len();

        let peak = chord.iter().copied().max().unwrap_or(0);
        if (peak as f64) < self.upper {
            return Err(LimbError::NoEdge);
        }

        let edges = self.scan(chord);
        let (first, second) = match edges.as_slice() {
            [] => return Err(LimbError::NoEdge),
            [single] => self.salvage(*single, len)?,
            _ => {
                let kept = self.prune(&edges);
                match kept.as_slice() {
                    [a, b] => (*a, *b),
                    _ => return Err(LimbError::NoEdge),
                }
            }
        };

        let leading = match first {
            Edge::VirtualLeading => LimbCrossing::Virtual { position: -1.0 },
            Edge::Rising(index) => self.fit_edge(chord, index)?,
            _ => return Err(LimbError::NoEdge),
        };
        let trailing = match second {
            Edge::VirtualTrailing => LimbCrossing::Virtual {
                position: len as f64,
            },
            Edge::Falling(index) => self.fit_edge(chord, index)?,
            _ => return Err(LimbError::NoEdge),
        };

        Ok(ChordCrossings { leading, trailing })
    }

    /// Integer crossings of the lower threshold, in chord order
    fn scan(&self, chord: ArrayView1<u8>) -> Vec<Edge> {
        let threshold = self.lower as u8;
        let mut edges = Vec::new();
        // A chord that starts on the disk has no rising edge
        let mut above = chord.get(0).is_some_and(|&v| v > threshold);
        for (index, &value) in chord.iter().enumerate().skip(1) {
            if value > threshold && !above {
                edges.push(Edge::Rising(index));
                above = true;
            } else if value <= threshold && above {
                edges.push(Edge::Falling(index - 1));
                above = false;
            }
        }
        edges
    }

    /// Pair a lone edge with the chord boundary when the disk plausibly runs off it
    fn salvage(&self, edge: Edge, len: usize) -> Result<(Edge, Edge), LimbError> {
        let diameter = 2 * self.solar_radius;
        match edge {
            Edge::Falling(index) if index < diameter => Ok((Edge::VirtualLeading, edge)),
            Edge::Rising(index) if index + diameter > len => Ok((edge, Edge::VirtualTrailing)),
            _ => Err(LimbError::NoEdge),
        }
    }

    /// Drop both members of every adjacent pair closer than the minimum limb width
    fn prune(&self, edges: &[Edge]) -> Vec<Edge> {
        let index = |edge: &Edge| match *edge {
            Edge::Rising(i) | Edge::Falling(i) => i,
            Edge::VirtualLeading | Edge::VirtualTrailing => 0,
        };

        let mut noise = vec![false; edges.len()];
        for k in 1..edges.len() {
            if index(&edges[k]).abs_diff(index(&edges[k - 1])) <= self.min_limb_width {
                noise[k - 1] = true;
                noise[k] = true;
            }
        }

        edges
            .iter()
            .zip(noise)
            .filter(|(_, is_noise)| !is_noise)
            .map(|(edge, _)| *edge)
            .collect()
    }

    /// Line fit around `edge`, solved for the limb threshold
    fn fit_edge(&self, chord: ArrayView1<u8>, edge: usize) -> Result<LimbCrossing, LimbError> {
        let lo = edge.saturating_sub(self.fit_width);
        let hi = (edge + self.fit_width).min(chord.len().saturating_sub(1));
        if hi <= lo {
            return Err(LimbError::NoEdge);
        }

        let x: Vec<f64> = (lo..=hi).map(|l| l as f64 - edge as f64).collect();
        let y: Vec<f64> = (lo..=hi).map(|l| chord[l] as f64).collect();
        let line = fit_line(&x, &y).map_err(|_| LimbError::NoEdge)?;

        let position = line.solve_for_x(self.lower) + edge as f64;
        if !position.is_finite() {
            return Err(LimbError::NonFinite);
        }
        if position < lo as f64 || position > hi as f64 {
            return Err(LimbError::OutOfWindow);
        }

        Ok(LimbCrossing::Fitted {
            position,
            slope: line.slope.abs(),
        })
    }
}
