use anyhow::{Context, Result};
use aspect::synthetic::lattice;
use aspect::SyntheticScene;
use aspect_tools::save_frame;
use clap::Parser;
use nalgebra::Point2;
use std::path::PathBuf;

/// Render a synthetic solar frame
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Render a synthetic solar frame with a fiducial lattice"
)]
struct Args {
    #[arg(help = "Output image file; the format follows the extension")]
    output: PathBuf,

    #[arg(long, default_value_t = 320, help = "Frame width in pixels")]
    width: usize,

    #[arg(long, default_value_t = 240, help = "Frame height in pixels")]
    height: usize,

    #[arg(long, default_value_t = 160.0, help = "Disk center x in pixels")]
    center_x: f64,

    #[arg(long, default_value_t = 120.0, help = "Disk center y in pixels")]
    center_y: f64,

    #[arg(long, default_value_t = 98.0, help = "Disk radius in pixels")]
    radius: f64,

    #[arg(
        long,
        default_value_t = 1,
        help = "Lattice half-extent: markers at rows and columns -n..=n"
    )]
    lattice: i32,

    #[arg(long, default_value_t = 15.6, help = "Fiducial spacing in pixels")]
    spacing: f64,

    #[arg(long, default_value_t = 0.0, help = "Mask twist against the sensor, degrees")]
    twist: f64,

    #[arg(long, default_value_t = 1.5, help = "Gaussian read noise sigma")]
    noise: f64,

    #[arg(long, default_value_t = 42, help = "Noise seed")]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let scene = SyntheticScene {
        width: args.width,
        height: args.height,
        center: Point2::new(args.center_x, args.center_y),
        radius: args.radius,
        lattice_origin: Point2::new(args.width as f64 / 2.0, args.height as f64 / 2.0),
        fiducial_spacing: args.spacing,
        twist_deg: args.twist,
        fiducials: lattice(-args.lattice..=args.lattice, -args.lattice..=args.lattice),
        noise_sigma: args.noise,
        seed: args.seed,
        ..SyntheticScene::default()
    };

    let frame = scene.render();
    save_frame(&frame, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let visible = scene.visible_fiducials();
    log::info!(
        "wrote {}x{} frame to {} with {} of {} fiducials on the disk",
        args.width,
        args.height,
        args.output.display(),
        visible.len(),
        scene.fiducials.len()
    );
    for (index, position) in visible {
        println!(
            "{:>3} {:>3}  {:8.3} {:8.3}",
            index.row, index.col, position.x, position.y
        );
    }
    Ok(())
}
