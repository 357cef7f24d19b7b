//! Listening session that ties a device to the capture pipeline.
//!
//! Each call opens its own stream and drops it before returning, so the device
//! is released on every exit path, errors included. The noise floor cache is
//! the only state carried between calls.

use crate::audio::{
    capture_utterance, detect_barge_in, CaptureResult, MonotonicClock, NoiseCalibrator,
    NoiseFloor, NoiseFloorCache, StreamOpener, StreamSettings, Thresholds, VadConfig,
};
use anyhow::{Context, Result};
use std::sync::atomic::AtomicBool;
use tracing::info;

pub struct VoiceListener<O: StreamOpener> {
    opener: O,
    cfg: VadConfig,
    noise: NoiseFloorCache,
    stop_flag: Option<&'static AtomicBool>,
}

impl<O: StreamOpener> VoiceListener<O> {
    pub fn new(opener: O, cfg: VadConfig) -> Self {
        let noise = NoiseFloorCache::new(cfg.noise_floor_policy);
        Self {
            opener,
            cfg,
            noise,
            stop_flag: None,
        }
    }

    /// Observe `flag` once per frame and stop listening when it is set.
    pub fn with_stop_flag(mut self, flag: &'static AtomicBool) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn config(&self) -> &VadConfig {
        &self.cfg
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Last measured floor, if any call has calibrated yet.
    pub fn noise_floor(&self) -> Option<NoiseFloor> {
        self.noise.last()
    }

    /// Capture one utterance. The wait budget starts before the device opens.
    pub fn listen(&mut self) -> Result<CaptureResult> {
        let clock = MonotonicClock::start();
        let mut stream = self.open()?;
        capture_utterance(
            &mut stream,
            &self.cfg,
            &mut self.noise,
            &clock,
            self.stop_flag,
        )
    }

    /// Measure the room without listening for speech and remember the result.
    pub fn calibrate(&mut self) -> Result<NoiseFloor> {
        let mut stream = self.open()?;
        let floor = NoiseCalibrator::from_config(&self.cfg).calibrate(&mut stream)?;
        self.noise.store(floor);
        Ok(floor)
    }

    /// Short barge-in check against the start threshold of the known floor,
    /// calibrating first if nothing has been measured yet.
    pub fn wait_for_speech(&mut self) -> Result<bool> {
        let mut stream = self.open()?;
        let floor = match self.noise.last() {
            Some(floor) => floor,
            None => {
                let floor = NoiseCalibrator::from_config(&self.cfg).calibrate(&mut stream)?;
                self.noise.store(floor);
                floor
            }
        };
        let threshold = Thresholds::for_config(floor, &self.cfg).start;
        let clock = MonotonicClock::start();
        let detected = detect_barge_in(&mut stream, threshold, &self.cfg, &clock, self.stop_flag)?;
        info!(detected, threshold, "barge-in check finished");
        Ok(detected)
    }

    fn open(&self) -> Result<O::Stream> {
        self.opener
            .open_stream(&StreamSettings::from(&self.cfg))
            .context("failed to open audio input")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{FrameRead, FrameSource, PcmFrameSource, StopReason};
    use crate::config::NoiseFloorPolicy;
    use anyhow::bail;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    const FRAME: usize = 320;

    fn frames(amplitude: f32, count: usize) -> Vec<f32> {
        vec![amplitude; count * FRAME]
    }

    fn concat(parts: &[Vec<f32>]) -> Vec<f32> {
        parts.concat()
    }

    /// Stream that counts how often it was dropped.
    struct TrackedStream {
        inner: PcmFrameSource,
        released: Rc<Cell<usize>>,
        fail_after: Option<usize>,
        reads: usize,
    }

    impl FrameSource for TrackedStream {
        fn read_frame(&mut self) -> Result<Option<FrameRead>> {
            self.reads += 1;
            if self.fail_after.is_some_and(|limit| self.reads > limit) {
                bail!("stream failed");
            }
            self.inner.read_frame()
        }
    }

    impl Drop for TrackedStream {
        fn drop(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    /// Hands out one scripted recording per open.
    struct ScriptedOpener {
        takes: RefCell<VecDeque<Vec<f32>>>,
        released: Rc<Cell<usize>>,
        fail_after: Option<usize>,
    }

    impl ScriptedOpener {
        fn new(takes: Vec<Vec<f32>>) -> Self {
            Self {
                takes: RefCell::new(takes.into()),
                released: Rc::new(Cell::new(0)),
                fail_after: None,
            }
        }
    }

    impl StreamOpener for ScriptedOpener {
        type Stream = TrackedStream;

        fn open_stream(&self, settings: &StreamSettings) -> Result<TrackedStream> {
            let Some(samples) = self.takes.borrow_mut().pop_front() else {
                bail!("no device");
            };
            Ok(TrackedStream {
                inner: PcmFrameSource::new(samples, settings.frame_samples()),
                released: self.released.clone(),
                fail_after: self.fail_after,
                reads: 0,
            })
        }
    }

    fn config(policy: NoiseFloorPolicy) -> VadConfig {
        VadConfig {
            end_silence_ms: 300,
            noise_floor_policy: policy,
            ..VadConfig::default()
        }
    }

    #[test]
    fn listen_captures_and_releases_stream() {
        let take = concat(&[frames(0.001, 15), frames(0.1, 8), frames(0.001, 20)]);
        let opener = ScriptedOpener::new(vec![take]);
        let mut listener = VoiceListener::new(opener, config(NoiseFloorPolicy::PerCall));

        let result = listener.listen().unwrap();
        let utterance = result.outcome.utterance().unwrap();
        assert_eq!(utterance.samples.len(), 23 * FRAME);
        assert_eq!(listener.opener().released.get(), 1);
        assert!(listener.noise_floor().is_some());
    }

    #[test]
    fn session_policy_skips_calibration_on_later_calls() {
        let first = concat(&[frames(0.001, 15), frames(0.1, 8), frames(0.001, 15)]);
        // No calibration prefix: the session floor is reused.
        let second = concat(&[frames(0.1, 8), frames(0.001, 15)]);
        let opener = ScriptedOpener::new(vec![first, second]);
        let mut listener = VoiceListener::new(opener, config(NoiseFloorPolicy::Session));

        assert!(listener.listen().unwrap().outcome.is_speech());
        let result = listener.listen().unwrap();
        assert_eq!(result.metrics.end_frame, Some(23));
        assert_eq!(listener.opener().released.get(), 2);
    }

    #[test]
    fn per_call_policy_recalibrates() {
        let first = concat(&[frames(0.001, 15), frames(0.001, 5)]);
        // A louder room raises the thresholds above the 0.01 chatter.
        let second = concat(&[frames(0.01, 15), frames(0.01, 30)]);
        let opener = ScriptedOpener::new(vec![first, second]);
        let mut listener = VoiceListener::new(opener, config(NoiseFloorPolicy::PerCall));

        assert!(!listener.listen().unwrap().outcome.is_speech());
        let result = listener.listen().unwrap();
        assert!(!result.outcome.is_speech());
        assert!((result.metrics.noise_floor - 0.01).abs() < 1e-6);
    }

    #[test]
    fn stream_is_released_when_reading_fails() {
        let mut opener = ScriptedOpener::new(vec![frames(0.001, 40)]);
        opener.fail_after = Some(20);
        let mut listener = VoiceListener::new(opener, config(NoiseFloorPolicy::PerCall));

        let err = listener.listen().unwrap_err();
        assert!(err.to_string().contains("stream failed"));
        assert_eq!(listener.opener().released.get(), 1);
    }

    #[test]
    fn open_failure_is_reported() {
        let opener = ScriptedOpener::new(Vec::new());
        let mut listener = VoiceListener::new(opener, config(NoiseFloorPolicy::PerCall));
        let err = listener.listen().unwrap_err();
        assert!(format!("{err:#}").contains("no device"));
    }

    #[test]
    fn barge_in_reuses_calibrated_floor() {
        let calibration = frames(0.001, 15);
        let barge = concat(&[frames(0.001, 3), frames(0.1, 20)]);
        let opener = ScriptedOpener::new(vec![calibration, barge]);
        let mut listener = VoiceListener::new(opener, config(NoiseFloorPolicy::Session));

        let floor = listener.calibrate().unwrap();
        assert!((floor.value() - 0.001).abs() < 1e-6);
        assert!(listener.wait_for_speech().unwrap());
        assert_eq!(listener.opener().released.get(), 2);
    }

    #[test]
    fn barge_in_calibrates_when_no_floor_known() {
        let take = concat(&[frames(0.001, 15), frames(0.001, 30)]);
        let opener = ScriptedOpener::new(vec![take]);
        let mut listener = VoiceListener::new(opener, config(NoiseFloorPolicy::PerCall));

        assert!(!listener.wait_for_speech().unwrap());
        assert!(listener.noise_floor().is_some());
    }

    #[test]
    fn stop_flag_ends_listen() {
        static STOP: AtomicBool = AtomicBool::new(true);
        let take = concat(&[frames(0.001, 15), frames(0.1, 30)]);
        let opener = ScriptedOpener::new(vec![take]);
        let mut listener =
            VoiceListener::new(opener, config(NoiseFloorPolicy::PerCall)).with_stop_flag(&STOP);

        let result = listener.listen().unwrap();
        assert_eq!(result.metrics.stop_reason, StopReason::Interrupted);
        assert_eq!(listener.opener().released.get(), 1);
    }
}
