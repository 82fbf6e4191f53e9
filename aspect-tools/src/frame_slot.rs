//! Single-slot frame hand-off between a capture thread and the pipeline.
//!
//! The capture side always overwrites the slot, so the consumer sees only the most
//! recent frame. A frame replaced before it was taken counts as dropped. Taking
//! blocks on a condition variable until a frame arrives, the slot is closed, or the
//! timeout passes.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    #[error("timed out waiting for a frame")]
    Timeout,
    #[error("frame slot closed")]
    Closed,
}

struct SlotState<T> {
    frame: Option<T>,
    published: u64,
    dropped: u64,
    closed: bool,
}

pub struct FrameSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                frame: None,
                published: 0,
                dropped: 0,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `frame`, replacing any frame not yet taken.
    ///
    /// Returns true if an unconsumed frame was dropped.
    pub fn publish(&self, frame: T) -> bool {
        let mut state = self.lock();
        let dropped = state.frame.replace(frame).is_some();
        state.published += 1;
        if dropped {
            state.dropped += 1;
        }
        drop(state);
        self.ready.notify_one();
        dropped
    }

    /// Take the latest frame, waiting up to `timeout` for one to arrive.
    ///
    /// A frame already in the slot is returned even after the slot is closed.
    pub fn take(&self, timeout: Duration) -> Result<T, SlotError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frame.take() {
                return Ok(frame);
            }
            if state.closed {
                return Err(SlotError::Closed);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SlotError::Timeout);
            }
            state = self
                .ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wake every waiter; later takes fail once the slot is empty
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn published(&self) -> u64 {
        self.lock().published
    }

    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_latest_frame_wins() {
        let slot = FrameSlot::new();
        assert!(!slot.publish(1));
        assert!(slot.publish(2));
        assert!(slot.publish(3));

        assert_eq!(slot.take(Duration::ZERO), Ok(3));
        assert_eq!(slot.published(), 3);
        assert_eq!(slot.dropped(), 2);
    }

    #[test]
    fn test_empty_slot_times_out() {
        let slot = FrameSlot::<u32>::new();
        let start = Instant::now();
        assert_eq!(slot.take(Duration::from_millis(20)), Err(SlotError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_close_drains_then_fails() {
        let slot = FrameSlot::new();
        slot.publish("last");
        slot.close();
        assert_eq!(slot.take(Duration::ZERO), Ok("last"));
        assert_eq!(slot.take(Duration::from_secs(1)), Err(SlotError::Closed));
    }

    #[test]
    fn test_hand_off_across_threads() {
        let slot = Arc::new(FrameSlot::new());

        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for frame in 0..50u32 {
                    slot.publish(frame);
                }
                slot.close();
            })
        };

        let mut received = Vec::new();
        while let Ok(frame) = slot.take(Duration::from_secs(5)) {
            received.push(frame);
        }
        producer.join().unwrap();

        // Frames arrive in order and every frame is either received or dropped
        assert!(received.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(received.len() as u64 + slot.dropped(), 50);
        assert_eq!(received.last(), Some(&49));
    }
}
