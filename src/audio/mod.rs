//! Audio capture and voice activity detection (VAD) pipeline.
//!
//! Frames come from a [`FrameSource`] (a CPAL device or in-memory PCM), are
//! labelled by RMS energy against thresholds derived from a calibrated noise
//! floor, and drive an utterance state machine that decides where speech
//! starts and ends.

/// Default session sample rate.
pub const TARGET_RATE: u32 = 16_000;

mod barge_in;
mod calibrate;
mod capture;
mod clock;
mod dispatch;
mod energy;
mod frame;
mod recorder;
mod resample;
mod vad;
mod wav;

pub use barge_in::detect_barge_in;
pub use calibrate::{NoiseCalibrator, NoiseFloor, NoiseFloorCache, FALLBACK_NOISE_FLOOR};
pub use capture::{
    capture_utterance, offline_capture_from_pcm, CaptureMetrics, CaptureOutcome, CaptureResult,
    StopReason, Utterance, UtteranceState, UtteranceStateMachine,
};
pub use clock::{Clock, MonotonicClock, StepClock};
pub use energy::{frame_energy, Thresholds, ENERGY_EPSILON};
pub use frame::{Frame, FrameRead, FrameSource, PcmFrameSource};
pub use recorder::{DeviceStream, Recorder, StreamOpener, StreamSettings, DEVICE_STALL_TIMEOUT};
pub use resample::resample_buffer;
pub use vad::{VadConfig, VadDecision};
pub use wav::{read_wav, write_wav};
