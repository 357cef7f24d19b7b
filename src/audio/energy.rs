//! Frame energy and the hysteresis thresholds derived from the noise floor.

use super::calibrate::NoiseFloor;
use super::vad::{VadConfig, VadDecision};
use serde::Serialize;

/// Added to every RMS value so silent frames never report exactly zero.
pub const ENERGY_EPSILON: f32 = 1e-9;

const SILENT_DB: f32 = -120.0;

/// Root-mean-square energy plus [`ENERGY_EPSILON`]. Empty input yields the epsilon.
pub fn frame_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return ENERGY_EPSILON;
    }
    let power: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    power.sqrt() + ENERGY_EPSILON
}

/// Energy expressed in dBFS, only used for human-readable traces.
pub(crate) fn energy_db(energy: f32) -> f32 {
    if energy <= ENERGY_EPSILON {
        return SILENT_DB;
    }
    (20.0 * energy.log10()).max(SILENT_DB)
}

/// Start/end energy thresholds. `end <= start` gives the classifier hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub start: f32,
    pub end: f32,
}

impl Thresholds {
    pub fn from_noise_floor(
        floor: NoiseFloor,
        start_factor: f32,
        end_factor: f32,
        min_threshold: f32,
    ) -> Self {
        let start = (floor.value() * start_factor).max(min_threshold);
        let end = (floor.value() * end_factor).max(min_threshold).min(start);
        Self { start, end }
    }

    pub fn for_config(floor: NoiseFloor, cfg: &VadConfig) -> Self {
        Self::from_noise_floor(
            floor,
            cfg.start_threshold_factor,
            cfg.end_threshold_factor,
            cfg.min_threshold,
        )
    }

    /// Single threshold for both directions.
    pub fn fixed(threshold: f32) -> Self {
        Self {
            start: threshold,
            end: threshold,
        }
    }

    /// Frames must clear `start` to become speech and `end` to stay speech.
    pub fn classify(&self, energy: f32, locked: bool) -> VadDecision {
        let threshold = if locked { self.end } else { self.start };
        if energy > threshold {
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_of_empty_frame_is_epsilon() {
        assert_eq!(frame_energy(&[]), ENERGY_EPSILON);
    }

    #[test]
    fn energy_of_constant_frame_is_its_amplitude() {
        let energy = frame_energy(&[0.5; 320]);
        assert!((energy - 0.5).abs() < 1e-6);
        let energy = frame_energy(&[-0.25; 160]);
        assert!((energy - 0.25).abs() < 1e-6);
    }

    #[test]
    fn zero_frame_is_strictly_positive() {
        assert!(frame_energy(&[0.0; 320]) > 0.0);
    }

    #[test]
    fn db_is_clamped_for_silence() {
        assert_eq!(energy_db(ENERGY_EPSILON), SILENT_DB);
        assert!((energy_db(1.0) - 0.0).abs() < 1e-4);
    }

    #[test]
    fn min_threshold_bounds_both_thresholds() {
        let t = Thresholds::from_noise_floor(NoiseFloor::new(0.0001), 3.0, 2.0, 0.002);
        assert_eq!(t.start, 0.002);
        assert_eq!(t.end, 0.002);
    }

    #[test]
    fn end_threshold_never_exceeds_start() {
        let t = Thresholds::from_noise_floor(NoiseFloor::new(0.01), 2.0, 4.0, 0.002);
        assert!(t.end <= t.start);
    }

    #[test]
    fn locked_classification_uses_lower_threshold() {
        let t = Thresholds::from_noise_floor(NoiseFloor::new(0.01), 3.0, 2.0, 0.002);
        assert_eq!(t.classify(0.025, false), VadDecision::Silence);
        assert_eq!(t.classify(0.025, true), VadDecision::Speech);
        assert_eq!(t.classify(0.02, true), VadDecision::Silence);
    }
}
