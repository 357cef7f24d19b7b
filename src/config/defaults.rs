use super::{NoiseFloorEstimator, NoiseFloorPolicy};

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_MS: u64 = 20;
pub const DEFAULT_CALIBRATION_MS: u64 = 300;
pub const DEFAULT_START_THRESHOLD_FACTOR: f32 = 3.0;
pub const DEFAULT_END_THRESHOLD_FACTOR: f32 = 2.0;
pub const DEFAULT_MIN_THRESHOLD: f32 = 0.002;
pub const DEFAULT_MIN_GATE_MS: u64 = 160;
pub const DEFAULT_END_SILENCE_MS: u64 = 500;
pub const DEFAULT_MAX_WAIT_MS: u64 = 30_000;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_DEBUG_EVERY_FRAMES: usize = 25;
pub const DEFAULT_BARGE_IN_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_BARGE_IN_MIN_SPEECH_MS: u64 = 300;
pub const DEFAULT_TURNS: u32 = 1;

pub(super) const MIN_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_SAMPLE_RATE: u32 = 48_000;
pub(super) const MIN_FRAME_MS: u64 = 10;
pub(super) const MAX_FRAME_MS: u64 = 100;
pub(super) const MAX_CALIBRATION_MS: u64 = 5_000;
pub(super) const MAX_THRESHOLD_FACTOR: f32 = 50.0;
pub(super) const MAX_GATE_MS: u64 = 2_000;
pub(super) const MAX_END_SILENCE_MS: u64 = 5_000;
pub(super) const MIN_MAX_WAIT_MS: u64 = 1_000;
pub(super) const MAX_MAX_WAIT_MS: u64 = 300_000;
pub(super) const MAX_DEBUG_EVERY_FRAMES: usize = 10_000;
pub(super) const MIN_BARGE_IN_TIMEOUT_MS: u64 = 100;
pub(super) const MAX_BARGE_IN_TIMEOUT_MS: u64 = 30_000;
pub(super) const MAX_TURNS: u32 = 1_000;
pub(super) const FORBIDDEN_DEVICE_CHARS: &[char] = &['\n', '\r', '\0'];

pub fn default_noise_floor_estimator() -> NoiseFloorEstimator {
    NoiseFloorEstimator::Median
}

pub fn default_noise_floor_policy() -> NoiseFloorPolicy {
    NoiseFloorPolicy::PerCall
}
