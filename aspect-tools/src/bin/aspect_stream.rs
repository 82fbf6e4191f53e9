use anyhow::{anyhow, Result};
use aspect::{Aspect, AspectCode, SyntheticScene};
use aspect_tools::{FrameSlot, SlotError};
use clap::Parser;
use nalgebra::Point2;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Capture and processing on separate threads with a latest-wins hand-off
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stream drifting synthetic frames through the aspect pipeline",
    long_about = "A capture thread renders synthetic frames of a drifting sun at a fixed \
        cadence and publishes each into a single-slot buffer. The pipeline thread takes \
        the newest frame whenever it is free. Frames overwritten before they were \
        taken are counted as dropped."
)]
struct Args {
    #[arg(short, long, default_value_t = 100, help = "Frames to capture")]
    frames: usize,

    #[arg(long, default_value_t = 10, help = "Capture period in milliseconds")]
    period_ms: u64,

    #[arg(
        long,
        default_value_t = 0.2,
        help = "Disk drift per frame in pixels, along both axes"
    )]
    drift: f64,

    #[arg(long, default_value_t = 1000, help = "Give up waiting for a frame after this")]
    timeout_ms: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let slot = Arc::new(FrameSlot::new());
    let capture = {
        let slot = Arc::clone(&slot);
        let (frames, drift) = (args.frames, args.drift);
        let period = Duration::from_millis(args.period_ms);
        thread::spawn(move || {
            let start = Point2::new(150.0, 112.0);
            for k in 0..frames {
                let offset = drift * k as f64;
                let scene = SyntheticScene {
                    center: Point2::new(start.x + offset, start.y + offset),
                    seed: k as u64,
                    ..SyntheticScene::default()
                };
                if slot.publish((k, scene.render())) {
                    log::trace!("frame {k} replaced an untaken frame");
                }
                thread::sleep(period);
            }
            slot.close();
        })
    };

    let mut aspect = Aspect::new();
    let timeout = Duration::from_millis(args.timeout_ms);
    let started = Instant::now();
    let mut processed = 0usize;
    let mut mapped = 0usize;

    loop {
        let (index, frame) = match slot.take(timeout) {
            Ok(item) => item,
            Err(SlotError::Closed) => break,
            Err(SlotError::Timeout) => {
                log::warn!("no frame within {timeout:?}");
                continue;
            }
        };

        let outcome = aspect.load_frame(frame).and_then(|_| aspect.run());
        processed += 1;
        match (outcome, aspect.pixel_center()) {
            (Ok(()), Ok(center)) => {
                mapped += 1;
                log::debug!("frame {index}: center ({:.2}, {:.2})", center.x, center.y);
            }
            (Err(code), Ok(center)) => {
                log::debug!("frame {index}: {code}, center ({:.2}, {:.2})", center.x, center.y)
            }
            (Err(code), Err(_)) | (Ok(()), Err(code)) => {
                log::debug!("frame {index}: {code}");
            }
        }
    }

    capture
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))?;

    let elapsed = started.elapsed().as_secs_f64();
    println!(
        "captured {} frames, processed {processed} ({mapped} mapped), dropped {} in {elapsed:.2} s",
        slot.published(),
        slot.dropped()
    );
    if aspect.state() != AspectCode::NoError {
        log::info!("last frame ended in {}", aspect.state());
    }
    Ok(())
}
