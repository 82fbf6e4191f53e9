//! End-to-end runs of the aspect pipeline on synthetic solar frames

use approx::assert_abs_diff_eq;
use aspect::{screen_position, Aspect, AspectCode, AspectConfig, FloatParam, SyntheticScene};
use nalgebra::Point2;
use ndarray::{s, Array2};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn run_scene(aspect: &mut Aspect, scene: &SyntheticScene) -> Result<(), AspectCode> {
    aspect.load_frame(scene.render())?;
    aspect.run()
}

#[test]
fn test_drifting_sun_is_tracked() {
    init_logging();
    let mut aspect = Aspect::new();

    // Slow drift of the disk under a fixed mask
    for step in 0..5 {
        let truth = Point2::new(150.0 + 3.0 * step as f64, 125.0 - 2.0 * step as f64);
        let scene = SyntheticScene {
            center: truth,
            seed: 100 + step,
            ..SyntheticScene::default()
        };
        run_scene(&mut aspect, &scene).unwrap();

        let center = aspect.pixel_center().unwrap();
        assert_abs_diff_eq!(center.x, truth.x, epsilon = 0.3);
        assert_abs_diff_eq!(center.y, truth.y, epsilon = 0.3);
        assert!(aspect.roi().is_some());
    }
}

#[test]
fn test_screen_products_follow_identities() {
    init_logging();
    let scene = SyntheticScene::default();
    let mut aspect = Aspect::new();
    run_scene(&mut aspect, &scene).unwrap();

    let ids = aspect.fiducial_ids().unwrap();
    let screen = aspect.screen_fiducials().unwrap();
    assert_eq!(ids.len(), screen.len());

    for (id, point) in ids.iter().zip(&screen) {
        let expected = screen_position(id.resolved().unwrap());
        // A few tenths of a pixel at ~5.8 screen units per pixel
        assert_abs_diff_eq!(point.x, expected.x, epsilon = 3.0);
        assert_abs_diff_eq!(point.y, expected.y, epsilon = 3.0);
    }

    let pairs = aspect.fiducial_pairs().unwrap();
    assert_eq!(pairs.rows.len(), 6);
    assert_eq!(pairs.cols.len(), 6);
}

#[test]
fn test_twisted_mask() {
    init_logging();
    let scene = SyntheticScene {
        twist_deg: 3.0,
        ..SyntheticScene::default()
    };
    let mut aspect = Aspect::new();
    aspect.set_float(FloatParam::FiducialTwist, 3.0);
    run_scene(&mut aspect, &scene).unwrap();

    let ids = aspect.fiducial_ids().unwrap();
    assert_eq!(ids.len(), 9);
    assert!(ids.iter().all(|id| id.resolved().is_some()));
}

#[test]
fn test_focus_report_sorted() {
    init_logging();
    let mut aspect = Aspect::new();
    run_scene(&mut aspect, &SyntheticScene::default()).unwrap();

    let slopes = aspect.focus_report().unwrap();
    assert!(!slopes.is_empty());
    assert!(slopes.windows(2).all(|w| w[0] >= w[1]));
    // Limb rises from sky to disk over about one pixel
    assert!(slopes[0] > 40.0);
}

#[test]
fn test_circle_refinement() {
    init_logging();
    let config = AspectConfig {
        refine_center_with_circle_fit: true,
        ..AspectConfig::default()
    };
    let scene = SyntheticScene {
        center: Point2::new(171.5, 112.25),
        ..SyntheticScene::default()
    };
    let mut aspect = Aspect::with_config(config);
    run_scene(&mut aspect, &scene).unwrap();

    let center = aspect.pixel_center().unwrap();
    assert_abs_diff_eq!(center.x, 171.5, epsilon = 0.5);
    assert_abs_diff_eq!(center.y, 112.25, epsilon = 0.5);
}

#[test]
fn test_lost_disk_falls_back_to_search() {
    init_logging();
    let mut aspect = Aspect::new();
    run_scene(&mut aspect, &SyntheticScene::default()).unwrap();

    // A frame with no disk: the center stage fails and drops the center
    let mut blank = Array2::from_elem((240, 320), 20u8);
    blank.slice_mut(s![.., 195..205]).fill(200);
    aspect.load_frame(blank).unwrap();
    assert_eq!(aspect.run(), Err(AspectCode::NoLimbCrossings));
    assert!(aspect.pixel_center().is_err());

    // Reappears far from the old region and is found by a full search. Part of
    // the lattice is now off the disk, so later stages may stop short.
    let moved = SyntheticScene {
        center: Point2::new(200.0, 130.0),
        ..SyntheticScene::default()
    };
    if let Err(code) = run_scene(&mut aspect, &moved) {
        assert!(code.better_than(AspectCode::CenterError), "{code}");
    }
    let center = aspect.pixel_center().unwrap();
    assert_abs_diff_eq!(center.x, 200.0, epsilon = 0.3);
    assert_abs_diff_eq!(center.y, 130.0, epsilon = 0.3);
}
