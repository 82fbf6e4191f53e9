//! Support code for the aspect command line tools.
//!
//! Frame file I/O, JSON tunables, per-frame reports, and the single-slot frame
//! hand-off used between a capture thread and the pipeline.

pub mod config_file;
pub mod frame_io;
pub mod frame_slot;
pub mod report;

pub use config_file::{load_config, save_config};
pub use frame_io::{load_frame, save_frame, FrameIoError};
pub use frame_slot::{FrameSlot, SlotError};
pub use report::FrameReport;
