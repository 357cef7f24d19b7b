use super::defaults::{
    FORBIDDEN_DEVICE_CHARS, MAX_BARGE_IN_TIMEOUT_MS, MAX_CALIBRATION_MS, MAX_DEBUG_EVERY_FRAMES,
    MAX_END_SILENCE_MS, MAX_FRAME_MS, MAX_GATE_MS, MAX_MAX_WAIT_MS, MAX_SAMPLE_RATE,
    MAX_THRESHOLD_FACTOR, MAX_TURNS, MIN_BARGE_IN_TIMEOUT_MS, MIN_FRAME_MS, MIN_MAX_WAIT_MS,
    MIN_SAMPLE_RATE,
};
use super::{AppConfig, VoicePipelineConfig};
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values against the ranges the capture loop supports.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {}",
                self.sample_rate
            );
        }
        if !(MIN_FRAME_MS..=MAX_FRAME_MS).contains(&self.frame_ms) {
            bail!(
                "--frame-ms must be between {MIN_FRAME_MS} and {MAX_FRAME_MS}, got {}",
                self.frame_ms
            );
        }
        if !(MIN_MAX_WAIT_MS..=MAX_MAX_WAIT_MS).contains(&self.max_wait_ms) {
            bail!(
                "--max-wait-ms must be between {MIN_MAX_WAIT_MS} and {MAX_MAX_WAIT_MS}, got {}",
                self.max_wait_ms
            );
        }
        if self.calibration_ms > MAX_CALIBRATION_MS || self.calibration_ms >= self.max_wait_ms {
            bail!(
                "--calibration-ms must be <= {MAX_CALIBRATION_MS} and below --max-wait-ms ({}), got {}",
                self.max_wait_ms,
                self.calibration_ms
            );
        }

        // Factors must be finite: clap happily parses "NaN" and "inf".
        if !self.start_threshold_factor.is_finite()
            || !(1.0..=MAX_THRESHOLD_FACTOR).contains(&self.start_threshold_factor)
        {
            bail!(
                "--start-threshold-factor must be between 1.0 and {MAX_THRESHOLD_FACTOR}, got {}",
                self.start_threshold_factor
            );
        }
        if !self.end_threshold_factor.is_finite()
            || !(1.0..=self.start_threshold_factor).contains(&self.end_threshold_factor)
        {
            bail!(
                "--end-threshold-factor must be between 1.0 and --start-threshold-factor ({}), got {}",
                self.start_threshold_factor,
                self.end_threshold_factor
            );
        }
        if !self.min_threshold.is_finite() || self.min_threshold <= 0.0 || self.min_threshold > 1.0
        {
            bail!(
                "--min-threshold must be in (0, 1], got {}",
                self.min_threshold
            );
        }

        if self.min_gate_ms < self.frame_ms || self.min_gate_ms > MAX_GATE_MS {
            bail!(
                "--min-gate-ms must be between --frame-ms ({}) and {MAX_GATE_MS}, got {}",
                self.frame_ms,
                self.min_gate_ms
            );
        }
        if self.end_silence_ms < self.frame_ms || self.end_silence_ms > MAX_END_SILENCE_MS {
            bail!(
                "--end-silence-ms must be between --frame-ms ({}) and {MAX_END_SILENCE_MS}, got {}",
                self.frame_ms,
                self.end_silence_ms
            );
        }
        if !(8..=1024).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between 8 and 1024, got {}",
                self.channel_capacity
            );
        }
        if !(1..=MAX_DEBUG_EVERY_FRAMES).contains(&self.debug_every_frames) {
            bail!(
                "--debug-every-frames must be between 1 and {MAX_DEBUG_EVERY_FRAMES}, got {}",
                self.debug_every_frames
            );
        }
        if !(MIN_BARGE_IN_TIMEOUT_MS..=MAX_BARGE_IN_TIMEOUT_MS).contains(&self.barge_in_timeout_ms)
        {
            bail!(
                "--barge-in-timeout-ms must be between {MIN_BARGE_IN_TIMEOUT_MS} and {MAX_BARGE_IN_TIMEOUT_MS}, got {}",
                self.barge_in_timeout_ms
            );
        }
        if self.barge_in_min_speech_ms < self.frame_ms
            || self.barge_in_min_speech_ms > self.barge_in_timeout_ms
        {
            bail!(
                "--barge-in-min-speech-ms must be between --frame-ms ({}) and --barge-in-timeout-ms ({}), got {}",
                self.frame_ms,
                self.barge_in_timeout_ms,
                self.barge_in_min_speech_ms
            );
        }
        if self.turns > MAX_TURNS {
            bail!("--turns must be at most {MAX_TURNS}, got {}", self.turns);
        }
        if self.calibrate && self.barge_in {
            bail!("--calibrate and --barge-in are mutually exclusive");
        }

        if let Some(device) = &self.input_device {
            if device.trim().is_empty()
                || device.len() > 256
                || device
                    .chars()
                    .any(|ch| FORBIDDEN_DEVICE_CHARS.contains(&ch))
            {
                bail!("--input-device must be 1-256 characters with no control characters");
            }
        }
        if let Some(path) = &self.input_wav {
            if !path.is_file() {
                bail!("--input-wav {} is not a readable file", path.display());
            }
        }
        if let Some(dir) = &self.output_dir {
            if dir.exists() && !dir.is_dir() {
                bail!("--output-dir {} exists and is not a directory", dir.display());
            }
        }

        Ok(())
    }

    /// Snapshot the CLI-controlled capture settings for downstream consumers.
    pub fn voice_pipeline_config(&self) -> VoicePipelineConfig {
        VoicePipelineConfig {
            sample_rate: self.sample_rate,
            frame_ms: self.frame_ms,
            calibration_ms: self.calibration_ms,
            noise_floor_estimator: self.noise_floor_estimator,
            noise_floor_policy: self.noise_floor_policy,
            start_threshold_factor: self.start_threshold_factor,
            end_threshold_factor: self.end_threshold_factor,
            min_threshold: self.min_threshold,
            min_gate_ms: self.min_gate_ms,
            end_silence_ms: self.end_silence_ms,
            max_wait_ms: self.max_wait_ms,
            channel_capacity: self.channel_capacity,
            debug_every_frames: self.debug_every_frames,
            barge_in_timeout_ms: self.barge_in_timeout_ms,
            barge_in_min_speech_ms: self.barge_in_min_speech_ms,
        }
    }
}
