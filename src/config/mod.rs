//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

pub use defaults::{
    default_noise_floor_estimator, default_noise_floor_policy, DEFAULT_BARGE_IN_MIN_SPEECH_MS,
    DEFAULT_BARGE_IN_TIMEOUT_MS, DEFAULT_CALIBRATION_MS, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_DEBUG_EVERY_FRAMES, DEFAULT_END_SILENCE_MS, DEFAULT_END_THRESHOLD_FACTOR,
    DEFAULT_FRAME_MS, DEFAULT_MAX_WAIT_MS, DEFAULT_MIN_GATE_MS, DEFAULT_MIN_THRESHOLD,
    DEFAULT_SAMPLE_RATE, DEFAULT_START_THRESHOLD_FACTOR, DEFAULT_TURNS,
};

/// CLI options for the voxcall listener. Validated values keep the capture loop sane.
#[derive(Debug, Parser, Clone)]
#[command(
    about = "voxcall: energy-based utterance capture for voice-call agents",
    author,
    version
)]
pub struct AppConfig {
    /// Preferred audio input device name
    #[arg(long, env = "VOXCALL_INPUT_DEVICE")]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Segment a WAV file instead of listening to a device
    #[arg(long = "input-wav", value_name = "PATH")]
    pub input_wav: Option<PathBuf>,

    /// Write each captured utterance as a WAV file into this directory
    #[arg(long = "output-dir", env = "VOXCALL_OUTPUT_DIR", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of listening turns to run (0 runs until interrupted)
    #[arg(long, default_value_t = DEFAULT_TURNS)]
    pub turns: u32,

    /// Measure the noise floor, print it and exit
    #[arg(long, default_value_t = false)]
    pub calibrate: bool,

    /// Run a single barge-in check instead of capturing an utterance
    #[arg(long = "barge-in", default_value_t = false)]
    pub barge_in: bool,

    /// Print capture reports as JSON lines
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Session sample rate (Hz)
    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Frame duration (milliseconds)
    #[arg(long = "frame-ms", default_value_t = DEFAULT_FRAME_MS)]
    pub frame_ms: u64,

    /// Noise calibration window at the start of each listen (milliseconds)
    #[arg(long = "calibration-ms", default_value_t = DEFAULT_CALIBRATION_MS)]
    pub calibration_ms: u64,

    /// How calibration frame energies are combined into a noise floor
    #[arg(
        long = "noise-floor-estimator",
        value_enum,
        default_value_t = default_noise_floor_estimator()
    )]
    pub noise_floor_estimator: NoiseFloorEstimator,

    /// Recalibrate on every listen, or once per session
    #[arg(
        long = "noise-floor-policy",
        env = "VOXCALL_NOISE_FLOOR_POLICY",
        value_enum,
        default_value_t = default_noise_floor_policy()
    )]
    pub noise_floor_policy: NoiseFloorPolicy,

    /// Noise floor multiplier for entering speech
    #[arg(
        long = "start-threshold-factor",
        default_value_t = DEFAULT_START_THRESHOLD_FACTOR
    )]
    pub start_threshold_factor: f32,

    /// Noise floor multiplier for staying in speech
    #[arg(long = "end-threshold-factor", default_value_t = DEFAULT_END_THRESHOLD_FACTOR)]
    pub end_threshold_factor: f32,

    /// Absolute lower bound for both thresholds (RMS)
    #[arg(long = "min-threshold", default_value_t = DEFAULT_MIN_THRESHOLD)]
    pub min_threshold: f32,

    /// Consecutive speech required before an utterance locks (milliseconds)
    #[arg(long = "min-gate-ms", default_value_t = DEFAULT_MIN_GATE_MS)]
    pub min_gate_ms: u64,

    /// Trailing silence that ends a locked utterance (milliseconds)
    #[arg(long = "end-silence-ms", default_value_t = DEFAULT_END_SILENCE_MS)]
    pub end_silence_ms: u64,

    /// Wall-clock budget for one listen, calibration included (milliseconds)
    #[arg(long = "max-wait-ms", default_value_t = DEFAULT_MAX_WAIT_MS)]
    pub max_wait_ms: u64,

    /// Frame channel capacity between the device callback and the capture loop
    #[arg(long = "channel-capacity", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Emit a frame trace every N frames at debug level
    #[arg(long = "debug-every-frames", default_value_t = DEFAULT_DEBUG_EVERY_FRAMES)]
    pub debug_every_frames: usize,

    /// Barge-in listening window (milliseconds)
    #[arg(long = "barge-in-timeout-ms", default_value_t = DEFAULT_BARGE_IN_TIMEOUT_MS)]
    pub barge_in_timeout_ms: u64,

    /// Sustained speech that counts as a barge-in (milliseconds)
    #[arg(
        long = "barge-in-min-speech-ms",
        default_value_t = DEFAULT_BARGE_IN_MIN_SPEECH_MS
    )]
    pub barge_in_min_speech_ms: u64,

    /// Log per-frame VAD decisions
    #[arg(long = "debug-vad", env = "VOXCALL_DEBUG_VAD", default_value_t = false)]
    pub debug_vad: bool,

    /// Write JSON trace logs to a file instead of stderr
    #[arg(long = "logs", env = "VOXCALL_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all logging (overrides --logs and --debug-vad)
    #[arg(long = "no-logs", env = "VOXCALL_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,
}

/// Tunable parameters for the capture pipeline.
#[derive(Debug, Clone)]
pub struct VoicePipelineConfig {
    pub sample_rate: u32,
    pub frame_ms: u64,
    pub calibration_ms: u64,
    pub noise_floor_estimator: NoiseFloorEstimator,
    pub noise_floor_policy: NoiseFloorPolicy,
    pub start_threshold_factor: f32,
    pub end_threshold_factor: f32,
    pub min_threshold: f32,
    pub min_gate_ms: u64,
    pub end_silence_ms: u64,
    pub max_wait_ms: u64,
    pub channel_capacity: usize,
    pub debug_every_frames: usize,
    pub barge_in_timeout_ms: u64,
    pub barge_in_min_speech_ms: u64,
}

/// Statistic used to collapse calibration energies into one noise floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseFloorEstimator {
    Median,
    Mean,
}

impl NoiseFloorEstimator {
    pub fn label(self) -> &'static str {
        match self {
            NoiseFloorEstimator::Median => "median",
            NoiseFloorEstimator::Mean => "mean",
        }
    }
}

/// Lifetime of a measured noise floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseFloorPolicy {
    /// Measure a fresh floor at the start of every listen.
    PerCall,
    /// Measure once and reuse the floor for the rest of the session.
    Session,
}

impl NoiseFloorPolicy {
    pub fn label(self) -> &'static str {
        match self {
            NoiseFloorPolicy::PerCall => "per-call",
            NoiseFloorPolicy::Session => "session",
        }
    }
}
