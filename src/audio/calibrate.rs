//! Noise floor estimation from the first frames of a listen.

use super::frame::FrameSource;
use super::vad::VadConfig;
use crate::config::{NoiseFloorEstimator, NoiseFloorPolicy};
use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Floor reported when calibration saw no frames at all.
pub const FALLBACK_NOISE_FLOOR: f32 = 1e-6;

/// Baseline energy of the room, in the same RMS units as [`super::frame_energy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NoiseFloor(f32);

impl NoiseFloor {
    pub fn new(value: f32) -> Self {
        Self(value)
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for NoiseFloor {
    fn default() -> Self {
        Self(FALLBACK_NOISE_FLOOR)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NoiseCalibrator {
    frames: usize,
    estimator: NoiseFloorEstimator,
}

impl NoiseCalibrator {
    pub fn new(frames: usize, estimator: NoiseFloorEstimator) -> Self {
        Self { frames, estimator }
    }

    pub fn from_config(cfg: &VadConfig) -> Self {
        Self::new(cfg.calibration_frames(), cfg.noise_floor_estimator)
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Read up to `frames` frames from `source` and reduce their energies.
    /// A source that ends early contributes whatever it produced.
    pub fn calibrate(&self, source: &mut dyn FrameSource) -> Result<NoiseFloor> {
        info!(
            frames = self.frames,
            estimator = self.estimator.label(),
            "calibrating noise floor"
        );
        let mut energies = Vec::with_capacity(self.frames);
        while energies.len() < self.frames {
            let Some(read) = source.read_frame()? else {
                debug!(
                    observed = energies.len(),
                    "source ended during calibration"
                );
                break;
            };
            if read.overflowed {
                warn!(frame = energies.len() + 1, "input overflow during calibration");
            }
            energies.push(read.frame.energy());
        }
        let floor = self.estimate(&energies);
        info!(
            noise_floor = floor.value(),
            frames = energies.len(),
            "noise floor measured"
        );
        Ok(floor)
    }

    pub fn estimate(&self, energies: &[f32]) -> NoiseFloor {
        if energies.is_empty() {
            return NoiseFloor::default();
        }
        let value = match self.estimator {
            NoiseFloorEstimator::Median => median(energies),
            NoiseFloorEstimator::Mean => energies.iter().sum::<f32>() / energies.len() as f32,
        };
        NoiseFloor::new(value)
    }
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Noise floor state owned by one listening session.
///
/// `PerCall` measures on every [`NoiseFloorCache::resolve`]; `Session`
/// measures once and reuses the value until [`NoiseFloorCache::invalidate`].
#[derive(Debug, Clone)]
pub struct NoiseFloorCache {
    policy: NoiseFloorPolicy,
    floor: Option<NoiseFloor>,
}

impl NoiseFloorCache {
    pub fn new(policy: NoiseFloorPolicy) -> Self {
        Self {
            policy,
            floor: None,
        }
    }

    /// Caller-supplied floor that is never recalibrated.
    pub fn fixed(floor: NoiseFloor) -> Self {
        Self {
            policy: NoiseFloorPolicy::Session,
            floor: Some(floor),
        }
    }

    pub fn policy(&self) -> NoiseFloorPolicy {
        self.policy
    }

    /// Most recent floor, measured or supplied.
    pub fn last(&self) -> Option<NoiseFloor> {
        self.floor
    }

    pub fn invalidate(&mut self) {
        self.floor = None;
    }

    pub fn store(&mut self, floor: NoiseFloor) {
        self.floor = Some(floor);
    }

    pub fn resolve(
        &mut self,
        source: &mut dyn FrameSource,
        calibrator: &NoiseCalibrator,
    ) -> Result<NoiseFloor> {
        if let (NoiseFloorPolicy::Session, Some(floor)) = (self.policy, self.floor) {
            debug!(noise_floor = floor.value(), "reusing session noise floor");
            return Ok(floor);
        }
        let floor = calibrator.calibrate(source)?;
        self.floor = Some(floor);
        Ok(floor)
    }
}
