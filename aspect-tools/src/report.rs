//! Per-frame summary of everything the pipeline produced.
//!
//! Each product is captured through its gated accessor, so a field is `None`
//! whenever the run did not get far enough to make it trustworthy.

use std::fmt;

use aspect::{Aspect, AspectCode, LatticeIndex};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FiducialReport {
    pub pixel: [f64; 2],
    pub strength: f64,
    pub id: Option<LatticeIndex>,
    pub screen: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: String,
    pub state: AspectCode,
    pub min_max: Option<(u8, u8)>,
    pub limb_points: Option<usize>,
    pub pixel_center: Option<[f64; 2]>,
    pub pixel_error: Option<[f64; 2]>,
    pub fiducials: Vec<FiducialReport>,
    pub mapping: Option<[f64; 4]>,
    pub condition_numbers: Option<[f64; 2]>,
    pub screen_center: Option<[f64; 2]>,
}

impl FrameReport {
    pub fn from_aspect(frame: impl Into<String>, aspect: &Aspect) -> Self {
        let ids = aspect.fiducial_ids().ok();
        let screen = aspect.screen_fiducials().ok();
        let fiducials = aspect
            .pixel_fiducials()
            .map(|candidates| {
                candidates
                    .iter()
                    .enumerate()
                    .map(|(k, c)| FiducialReport {
                        pixel: [c.position.x, c.position.y],
                        strength: c.strength,
                        id: ids.and_then(|ids| ids.get(k)).and_then(|id| id.resolved()),
                        screen: screen.as_ref().and_then(|s| s.get(k)).map(|p| [p.x, p.y]),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            frame: frame.into(),
            state: aspect.state(),
            min_max: aspect.min_max().ok(),
            limb_points: aspect.limb_crossings().ok().map(|points| points.len()),
            pixel_center: aspect.pixel_center().ok().map(|p| [p.x, p.y]),
            pixel_error: aspect.pixel_error().ok().map(|e| [e.x, e.y]),
            fiducials,
            mapping: aspect.mapping_coefficients().ok(),
            condition_numbers: aspect.condition_numbers().ok(),
            screen_center: aspect.screen_center().ok().map(|p| [p.x, p.y]),
        }
    }
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}: {}", self.frame, self.state)?;
        if let Some((min, max)) = self.min_max {
            writeln!(f, "  range      {min}..{max}")?;
        }
        if let Some(count) = self.limb_points {
            writeln!(f, "  limb       {count} points")?;
        }
        if let (Some([x, y]), Some([ex, ey])) = (self.pixel_center, self.pixel_error) {
            writeln!(f, "  center     ({x:.2}, {y:.2}) +/- ({ex:.2}, {ey:.2}) px")?;
        }
        for fiducial in &self.fiducials {
            let [x, y] = fiducial.pixel;
            write!(f, "  fiducial   ({x:.2}, {y:.2})")?;
            if let Some(id) = fiducial.id {
                write!(f, " id [{}, {}]", id.row, id.col)?;
            }
            writeln!(f)?;
        }
        if let Some([m0, m1, m2, m3]) = self.mapping {
            writeln!(
                f,
                "  mapping    x = {m0:.3} + {m1:.5} px, y = {m2:.3} + {m3:.5} px"
            )?;
        }
        if let Some([x, y]) = self.screen_center {
            writeln!(f, "  screen     ({x:.2}, {y:.2})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use aspect::SyntheticScene;
    use nalgebra::Point2;

    #[test]
    fn test_report_of_full_run() {
        let mut aspect = Aspect::new();
        aspect.load_frame(SyntheticScene::default().render()).unwrap();
        aspect.run().unwrap();

        let report = FrameReport::from_aspect("synthetic", &aspect);
        assert_eq!(report.state, AspectCode::NoError);
        assert_eq!(report.fiducials.len(), 9);
        assert!(report.fiducials.iter().all(|f| f.id.is_some() && f.screen.is_some()));
        assert!(report.mapping.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "NoError");
        assert_eq!(json["frame"], "synthetic");

        let text = report.to_string();
        assert!(text.starts_with("synthetic: no error"));
        assert!(text.contains("mapping"));
    }

    #[test]
    fn test_report_matches_pipeline_products() {
        let scene = SyntheticScene {
            center: Point2::new(158.5, 121.25),
            ..SyntheticScene::default()
        };
        let mut aspect = Aspect::new();
        aspect.load_frame(scene.render()).unwrap();
        aspect.run().unwrap();
        let report = FrameReport::from_aspect("offset", &aspect);

        let mapping = report.mapping.unwrap();
        for (reported, actual) in mapping.iter().zip(aspect.mapping_coefficients().unwrap()) {
            assert_relative_eq!(*reported, actual);
        }

        let [x, y] = report.pixel_center.unwrap();
        assert_relative_eq!(x, 158.5, epsilon = 0.3);
        assert_relative_eq!(y, 121.25, epsilon = 0.3);

        for fiducial in &report.fiducials {
            let [px, py] = fiducial.pixel;
            let [sx, sy] = fiducial.screen.unwrap();
            let expected = aspect.pixel_to_screen(Point2::new(px, py)).unwrap();
            assert_relative_eq!(sx, expected.x, epsilon = 1e-9);
            assert_relative_eq!(sy, expected.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_report_hides_unreached_products() {
        let mut aspect = Aspect::new();
        aspect
            .load_frame(ndarray::Array2::from_elem((64, 64), 9u8))
            .unwrap();
        assert!(aspect.run().is_err());

        let report = FrameReport::from_aspect("flat", &aspect);
        assert_eq!(report.state, AspectCode::MinMaxBad);
        // The range itself is still reported; it is what failed
        assert_eq!(report.min_max, Some((9, 9)));
        assert_eq!(report.limb_points, None);
        assert_eq!(report.pixel_center, None);
        assert!(report.fiducials.is_empty());
        assert_eq!(
            report.to_string(),
            "flat: min/max intensity invalid\n  range      9..9\n"
        );
    }
}
