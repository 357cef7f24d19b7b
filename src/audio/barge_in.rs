//! Short "is the user talking over playback?" check.
//!
//! Reuses [`UtteranceStateMachine`] with a single fixed threshold and stops at
//! the first lock, so only the gating half of the machine is exercised.

use super::capture::UtteranceStateMachine;
use super::clock::Clock;
use super::energy::Thresholds;
use super::frame::FrameSource;
use super::vad::VadConfig;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Return `true` once `cfg.barge_in_frames()` consecutive frames exceed
/// `threshold`, or `false` when the window closes, the source ends, or the
/// stop flag is raised. Nothing is buffered.
pub fn detect_barge_in(
    source: &mut dyn FrameSource,
    threshold: f32,
    cfg: &VadConfig,
    clock: &dyn Clock,
    stop_flag: Option<&AtomicBool>,
) -> Result<bool> {
    let window = Duration::from_millis(cfg.barge_in_timeout_ms);
    let thresholds = Thresholds::fixed(threshold);
    let mut gate = UtteranceStateMachine::new(cfg.barge_in_frames(), usize::MAX);
    debug!(
        threshold,
        min_frames = cfg.barge_in_frames(),
        window_ms = cfg.barge_in_timeout_ms,
        "waiting for barge-in"
    );

    while clock.elapsed() < window {
        if stop_flag.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Ok(false);
        }
        let Some(read) = source.read_frame()? else {
            return Ok(false);
        };
        gate.on_frame(read.frame.energy(), &thresholds);
        if gate.has_locked() {
            info!(frames = gate.frames_seen(), "barge-in detected");
            return Ok(true);
        }
    }
    debug!(frames = gate.frames_seen(), "no barge-in");
    Ok(false)
}
