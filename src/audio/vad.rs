//! Voice Activity Detection (VAD) configuration and frame decisions.
//!
//! Durations are configured in milliseconds and converted to whole frame
//! counts here so the state machine only ever counts frames.

use super::TARGET_RATE;
use crate::config::{
    NoiseFloorEstimator, NoiseFloorPolicy, VoicePipelineConfig, DEFAULT_BARGE_IN_MIN_SPEECH_MS,
    DEFAULT_BARGE_IN_TIMEOUT_MS, DEFAULT_CALIBRATION_MS, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_DEBUG_EVERY_FRAMES, DEFAULT_END_SILENCE_MS, DEFAULT_END_THRESHOLD_FACTOR,
    DEFAULT_FRAME_MS, DEFAULT_MAX_WAIT_MS, DEFAULT_MIN_GATE_MS, DEFAULT_MIN_THRESHOLD,
    DEFAULT_START_THRESHOLD_FACTOR,
};

/// Configuration for one listening session.
#[derive(Debug, Clone)]
pub struct VadConfig {
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

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_RATE,
            frame_ms: DEFAULT_FRAME_MS,
            calibration_ms: DEFAULT_CALIBRATION_MS,
            noise_floor_estimator: NoiseFloorEstimator::Median,
            noise_floor_policy: NoiseFloorPolicy::PerCall,
            start_threshold_factor: DEFAULT_START_THRESHOLD_FACTOR,
            end_threshold_factor: DEFAULT_END_THRESHOLD_FACTOR,
            min_threshold: DEFAULT_MIN_THRESHOLD,
            min_gate_ms: DEFAULT_MIN_GATE_MS,
            end_silence_ms: DEFAULT_END_SILENCE_MS,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            debug_every_frames: DEFAULT_DEBUG_EVERY_FRAMES,
            barge_in_timeout_ms: DEFAULT_BARGE_IN_TIMEOUT_MS,
            barge_in_min_speech_ms: DEFAULT_BARGE_IN_MIN_SPEECH_MS,
        }
    }
}

impl From<&VoicePipelineConfig> for VadConfig {
    fn from(cfg: &VoicePipelineConfig) -> Self {
        Self {
            sample_rate: cfg.sample_rate,
            frame_ms: cfg.frame_ms,
            calibration_ms: cfg.calibration_ms,
            noise_floor_estimator: cfg.noise_floor_estimator,
            noise_floor_policy: cfg.noise_floor_policy,
            start_threshold_factor: cfg.start_threshold_factor,
            end_threshold_factor: cfg.end_threshold_factor,
            min_threshold: cfg.min_threshold,
            min_gate_ms: cfg.min_gate_ms,
            end_silence_ms: cfg.end_silence_ms,
            max_wait_ms: cfg.max_wait_ms,
            channel_capacity: cfg.channel_capacity,
            debug_every_frames: cfg.debug_every_frames,
            barge_in_timeout_ms: cfg.barge_in_timeout_ms,
            barge_in_min_speech_ms: cfg.barge_in_min_speech_ms,
        }
    }
}

impl VadConfig {
    /// Samples per frame at the session rate, e.g. 20 ms @ 16 kHz = 320.
    pub fn frame_samples(&self) -> usize {
        ((u64::from(self.sample_rate) * self.frame_ms) / 1000).max(1) as usize
    }

    /// Number of frames observed before listening starts. Zero is allowed.
    pub fn calibration_frames(&self) -> usize {
        (self.calibration_ms / self.frame_ms.max(1)) as usize
    }

    /// Consecutive speech frames needed to lock an utterance.
    pub fn gate_frames(&self) -> usize {
        self.frames_for(self.min_gate_ms)
    }

    /// Consecutive silence frames that end a locked utterance.
    pub fn end_silence_frames(&self) -> usize {
        self.frames_for(self.end_silence_ms)
    }

    pub fn barge_in_frames(&self) -> usize {
        self.frames_for(self.barge_in_min_speech_ms)
    }

    fn frames_for(&self, duration_ms: u64) -> usize {
        (duration_ms / self.frame_ms.max(1)).max(1) as usize
    }
}

/// Per-frame verdict of the energy classifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        matches!(self, VadDecision::Speech)
    }
}
