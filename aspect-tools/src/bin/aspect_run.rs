use anyhow::{Context, Result};
use aspect::{Aspect, AspectConfig};
use aspect_tools::{load_config, load_frame, FrameReport};
use clap::Parser;
use std::path::PathBuf;

/// Run the aspect pipeline over a sequence of frame files
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run the aspect pipeline over frame files",
    long_about = "Loads each frame in order and runs the aspect pipeline on it, printing a \
        report per frame. Tracking state carries from one frame to the next, so a \
        sequence is processed the way it would be in flight."
)]
struct Args {
    #[arg(required = true, help = "Frame files (PNG, TIFF, ...), processed in order")]
    frames: Vec<PathBuf>,

    #[arg(short, long, help = "JSON file of pipeline tunables")]
    config: Option<PathBuf>,

    #[arg(
        long,
        help = "Skip the center search and look for fiducials over the whole frame"
    )]
    fiducials_only: bool,

    #[arg(long, help = "Print one JSON report per line instead of text")]
    json: bool,

    #[arg(long, help = "Log the limb slope focus report for every frame")]
    focus: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AspectConfig::default(),
    };
    let mut aspect = Aspect::with_config(config);

    let mut failures = 0usize;
    for path in &args.frames {
        let frame =
            load_frame(path).with_context(|| format!("Failed to read {}", path.display()))?;

        let outcome = aspect.load_frame(frame).and_then(|_| {
            if args.fiducials_only {
                aspect.fiducial_run()
            } else {
                aspect.run()
            }
        });
        if outcome.is_err() {
            failures += 1;
        }
        if args.focus {
            let _ = aspect.focus_report();
        }

        let report = FrameReport::from_aspect(path.display().to_string(), &aspect);
        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print!("{report}");
        }
    }

    log::info!(
        "{} frames, {} stopped short of a mapping",
        args.frames.len(),
        failures
    );
    Ok(())
}
