//! Utterance capture state machine with energy-based voice activity detection.
//!
//! Drives the listening loop: calibrates a noise floor, labels each frame
//! against hysteresis thresholds, gates short bursts, and stops once a locked
//! utterance is followed by enough trailing silence or the wait budget runs out.

use super::calibrate::{NoiseCalibrator, NoiseFloorCache};
use super::clock::{Clock, StepClock};
use super::energy::{energy_db, Thresholds};
use super::frame::{Frame, FrameSource, PcmFrameSource};
use super::vad::VadConfig;
use crate::config::NoiseFloorPolicy;
use anyhow::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a listen currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceState {
    PreSpeech,
    Gating,
    SpeechLocked,
    Ended,
    TimedOutNoSpeech,
}

impl UtteranceState {
    pub fn label(self) -> &'static str {
        match self {
            UtteranceState::PreSpeech => "pre_speech",
            UtteranceState::Gating => "gating",
            UtteranceState::SpeechLocked => "speech_locked",
            UtteranceState::Ended => "ended",
            UtteranceState::TimedOutNoSpeech => "timed_out_no_speech",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UtteranceState::Ended | UtteranceState::TimedOutNoSpeech
        )
    }
}

/// Frame-counting state machine shared by utterance capture and barge-in.
///
/// Frames are numbered from 1 in the order they are fed. A run of
/// `gate_frames` consecutive speech frames locks the utterance; once locked,
/// `end_silence_frames` consecutive silent frames end it.
#[derive(Debug, Clone)]
pub struct UtteranceStateMachine {
    gate_frames: usize,
    end_silence_frames: usize,
    state: UtteranceState,
    gate_run: usize,
    silence_run: usize,
    frames_seen: usize,
    gate_start: Option<usize>,
    speech_start_frame: Option<usize>,
    lock_frame: Option<usize>,
    end_frame: Option<usize>,
}

impl UtteranceStateMachine {
    pub fn new(gate_frames: usize, end_silence_frames: usize) -> Self {
        Self {
            gate_frames: gate_frames.max(1),
            end_silence_frames: end_silence_frames.max(1),
            state: UtteranceState::PreSpeech,
            gate_run: 0,
            silence_run: 0,
            frames_seen: 0,
            gate_start: None,
            speech_start_frame: None,
            lock_frame: None,
            end_frame: None,
        }
    }

    pub fn from_config(cfg: &VadConfig) -> Self {
        Self::new(cfg.gate_frames(), cfg.end_silence_frames())
    }

    pub fn state(&self) -> UtteranceState {
        self.state
    }

    /// True once the gate has been passed, even if the utterance has since ended.
    pub fn has_locked(&self) -> bool {
        self.lock_frame.is_some()
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    pub fn gate_run(&self) -> usize {
        self.gate_run
    }

    pub fn silence_run(&self) -> usize {
        self.silence_run
    }

    /// First frame of the run that locked the utterance.
    pub fn speech_start_frame(&self) -> Option<usize> {
        self.speech_start_frame
    }

    pub fn lock_frame(&self) -> Option<usize> {
        self.lock_frame
    }

    pub fn end_frame(&self) -> Option<usize> {
        self.end_frame
    }

    /// Feed one frame's energy. Terminal states ignore further frames.
    pub fn on_frame(&mut self, energy: f32, thresholds: &Thresholds) -> UtteranceState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.frames_seen += 1;
        let frame = self.frames_seen;
        let locked = self.state == UtteranceState::SpeechLocked;
        let speech = thresholds.classify(energy, locked).is_speech();
        let current = self.state;

        self.state = match current {
            UtteranceState::PreSpeech | UtteranceState::Gating if speech => {
                if current == UtteranceState::PreSpeech {
                    self.gate_start = Some(frame);
                    self.gate_run = 0;
                }
                self.gate_run += 1;
                if self.gate_run >= self.gate_frames {
                    self.speech_start_frame = self.gate_start;
                    self.lock_frame = Some(frame);
                    self.silence_run = 0;
                    UtteranceState::SpeechLocked
                } else {
                    UtteranceState::Gating
                }
            }
            UtteranceState::PreSpeech => UtteranceState::PreSpeech,
            UtteranceState::Gating => {
                self.gate_run = 0;
                self.gate_start = None;
                UtteranceState::PreSpeech
            }
            UtteranceState::SpeechLocked if speech => {
                self.silence_run = 0;
                UtteranceState::SpeechLocked
            }
            UtteranceState::SpeechLocked => {
                self.silence_run += 1;
                if self.silence_run >= self.end_silence_frames {
                    self.end_frame = Some(frame);
                    UtteranceState::Ended
                } else {
                    UtteranceState::SpeechLocked
                }
            }
            terminal @ (UtteranceState::Ended | UtteranceState::TimedOutNoSpeech) => terminal,
        };
        self.state
    }

    /// Deadline reached. Only a machine that never locked times out; a locked
    /// one keeps its state so the caller can still return the audio.
    pub fn expire(&mut self) -> UtteranceState {
        if matches!(
            self.state,
            UtteranceState::PreSpeech | UtteranceState::Gating
        ) {
            self.gate_run = 0;
            self.gate_start = None;
            self.state = UtteranceState::TimedOutNoSpeech;
        }
        self.state
    }
}

/// Explains why a listen stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    EndOfUtterance { silence_ms: u64 },
    Timeout,
    SourceExhausted,
    Interrupted,
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::EndOfUtterance { .. } => "end_of_utterance",
            StopReason::Timeout => "timeout",
            StopReason::SourceExhausted => "source_exhausted",
            StopReason::Interrupted => "interrupted",
        }
    }
}

/// Metrics collected during a listen for logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureMetrics {
    pub noise_floor: f32,
    pub start_threshold: f32,
    pub end_threshold: f32,
    pub frames_processed: usize,
    pub frames_overflowed: usize,
    pub speech_frames: usize,
    pub capture_ms: u64,
    pub speech_start_frame: Option<usize>,
    pub lock_frame: Option<usize>,
    pub end_frame: Option<usize>,
    pub stop_reason: StopReason,
}

impl CaptureMetrics {
    fn new(noise_floor: f32, thresholds: &Thresholds) -> Self {
        Self {
            noise_floor,
            start_threshold: thresholds.start,
            end_threshold: thresholds.end,
            frames_processed: 0,
            frames_overflowed: 0,
            speech_frames: 0,
            capture_ms: 0,
            speech_start_frame: None,
            lock_frame: None,
            end_frame: None,
            stop_reason: StopReason::SourceExhausted,
        }
    }
}

/// Captured mono PCM ready for speech-to-text.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Utterance {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / u64::from(self.sample_rate)
    }
}

/// Either an utterance or an explicit "nobody spoke" answer.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Speech(Utterance),
    NoSpeech { sample_rate: u32 },
}

impl CaptureOutcome {
    pub fn is_speech(&self) -> bool {
        matches!(self, CaptureOutcome::Speech(_))
    }

    pub fn sample_rate(&self) -> u32 {
        match self {
            CaptureOutcome::Speech(utterance) => utterance.sample_rate,
            CaptureOutcome::NoSpeech { sample_rate } => *sample_rate,
        }
    }

    pub fn utterance(&self) -> Option<&Utterance> {
        match self {
            CaptureOutcome::Speech(utterance) => Some(utterance),
            CaptureOutcome::NoSpeech { .. } => None,
        }
    }

    pub fn into_utterance(self) -> Option<Utterance> {
        match self {
            CaptureOutcome::Speech(utterance) => Some(utterance),
            CaptureOutcome::NoSpeech { .. } => None,
        }
    }
}

/// Caller-facing result: the outcome plus metrics for observability.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub outcome: CaptureOutcome,
    pub metrics: CaptureMetrics,
}

/// Append-only frame buffer flattened once the listen finishes.
#[derive(Debug, Default)]
pub(super) struct FrameAccumulator {
    frames: Vec<Frame>,
    total_samples: usize,
}

impl FrameAccumulator {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn push_frame(&mut self, frame: Frame) {
        self.total_samples = self.total_samples.saturating_add(frame.len());
        self.frames.push(frame);
    }

    pub(super) fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub(super) fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub(super) fn into_samples(self) -> Vec<f32> {
        let mut samples = Vec::with_capacity(self.total_samples);
        for frame in self.frames {
            samples.extend(frame.into_samples());
        }
        samples
    }
}

/// Listen on `source` until one utterance is captured or the wait budget expires.
///
/// The noise floor is resolved through `noise` first, so calibration time counts
/// against `cfg.max_wait_ms`. The deadline and `stop_flag` are checked once per
/// frame; the overrun is therefore bounded by one frame duration.
pub fn capture_utterance(
    source: &mut dyn FrameSource,
    cfg: &VadConfig,
    noise: &mut NoiseFloorCache,
    clock: &dyn Clock,
    stop_flag: Option<&AtomicBool>,
) -> Result<CaptureResult> {
    let max_wait = Duration::from_millis(cfg.max_wait_ms);
    let floor = noise.resolve(source, &NoiseCalibrator::from_config(cfg))?;
    let thresholds = Thresholds::for_config(floor, cfg);
    info!(
        source = source.name(),
        noise_floor = floor.value(),
        start_threshold = thresholds.start,
        end_threshold = thresholds.end,
        "listening for speech"
    );

    let mut machine = UtteranceStateMachine::from_config(cfg);
    let mut accumulator = FrameAccumulator::new();
    let mut metrics = CaptureMetrics::new(floor.value(), &thresholds);
    let debug_every = cfg.debug_every_frames.max(1);

    let stop_reason = loop {
        if stop_flag.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            break StopReason::Interrupted;
        }
        if clock.elapsed() > max_wait {
            break StopReason::Timeout;
        }
        let Some(read) = source.read_frame()? else {
            break StopReason::SourceExhausted;
        };
        metrics.frames_processed += 1;
        if read.overflowed {
            metrics.frames_overflowed += 1;
            warn!(frame = metrics.frames_processed, "input overflow, audio was dropped");
        }

        let energy = read.frame.energy();
        let previous = machine.state();
        let state = machine.on_frame(energy, &thresholds);
        accumulator.push_frame(read.frame);
        let speech = match state {
            UtteranceState::Gating => true,
            UtteranceState::SpeechLocked => machine.silence_run() == 0,
            _ => false,
        };
        if speech {
            metrics.speech_frames += 1;
        }

        if state != previous {
            log_transition(previous, state, &machine, energy);
        }
        if metrics.frames_processed % debug_every == 0 {
            debug!(
                frame = metrics.frames_processed,
                energy,
                db = energy_db(energy),
                state = state.label(),
                gate_run = machine.gate_run(),
                silence_run = machine.silence_run(),
                "vad frame"
            );
        }
        if state == UtteranceState::Ended {
            break StopReason::EndOfUtterance {
                silence_ms: machine.silence_run() as u64 * cfg.frame_ms,
            };
        }
    };

    debug_assert_eq!(accumulator.frame_count(), metrics.frames_processed);
    metrics.capture_ms = metrics.frames_processed as u64 * cfg.frame_ms;
    metrics.speech_start_frame = machine.speech_start_frame();
    metrics.lock_frame = machine.lock_frame();
    metrics.end_frame = machine.end_frame();
    metrics.stop_reason = stop_reason;

    if !machine.has_locked() {
        if metrics.stop_reason == StopReason::Timeout {
            machine.expire();
        }
        info!(
            listened_ms = metrics.capture_ms,
            reason = metrics.stop_reason.label(),
            state = machine.state().label(),
            "no speech detected"
        );
        return Ok(CaptureResult {
            outcome: CaptureOutcome::NoSpeech {
                sample_rate: cfg.sample_rate,
            },
            metrics,
        });
    }

    let total_samples = accumulator.total_samples();
    let samples = accumulator.into_samples();
    debug_assert_eq!(samples.len(), total_samples);
    let utterance = Utterance {
        samples,
        sample_rate: cfg.sample_rate,
    };
    info!(
        duration_ms = utterance.duration_ms(),
        frames = metrics.frames_processed,
        reason = metrics.stop_reason.label(),
        "utterance captured"
    );
    Ok(CaptureResult {
        outcome: CaptureOutcome::Speech(utterance),
        metrics,
    })
}

fn log_transition(
    from: UtteranceState,
    to: UtteranceState,
    machine: &UtteranceStateMachine,
    energy: f32,
) {
    match to {
        UtteranceState::SpeechLocked => info!(
            frame = machine.frames_seen(),
            speech_start_frame = machine.speech_start_frame(),
            energy,
            "speech locked"
        ),
        UtteranceState::Ended => info!(
            frame = machine.frames_seen(),
            silence_frames = machine.silence_run(),
            "end of utterance"
        ),
        _ => debug!(
            frame = machine.frames_seen(),
            from = from.label(),
            to = to.label(),
            energy,
            "vad state change"
        ),
    }
}

/// Run the full capture loop over in-memory PCM with a frame-stepped clock.
///
/// Used by the CLI for WAV input and by tests, so segmentation can be checked
/// without a microphone. Time is audio time: calibration frames are charged to
/// the wait budget up front and every loop frame advances the clock one frame.
pub fn offline_capture_from_pcm(samples: &[f32], cfg: &VadConfig) -> Result<CaptureResult> {
    let mut source = PcmFrameSource::new(samples.to_vec(), cfg.frame_samples());
    let mut noise = NoiseFloorCache::new(NoiseFloorPolicy::PerCall);
    let calibration = Duration::from_millis(cfg.calibration_frames() as u64 * cfg.frame_ms);
    let clock = StepClock::per_frame(cfg.frame_ms).starting_at(calibration);
    capture_utterance(&mut source, cfg, &mut noise, &clock, None)
}
