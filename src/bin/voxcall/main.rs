//! voxcall: listen for caller utterances on a microphone or a WAV file and
//! report how each one was segmented.

mod cli_utils;
mod report;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use voxcall::audio::{
    self, offline_capture_from_pcm, CaptureResult, Recorder, StopReason, StreamOpener, Thresholds,
    VadConfig,
};
use voxcall::config::AppConfig;
use voxcall::{init_tracing, signal, AudioInput, VoiceListener};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    if config.list_input_devices {
        return cli_utils::list_input_devices();
    }

    init_tracing(&config);
    let vad = VadConfig::from(&config.voice_pipeline_config());

    if let Some(path) = config.input_wav.as_deref() {
        return run_offline(path, &vad, &config);
    }

    signal::install_interrupt_handler()?;
    let recorder = Recorder::new(config.input_device.as_deref())?;
    info!(device = %recorder.device_name(), "using input device");
    let mut listener = VoiceListener::new(recorder, vad).with_stop_flag(signal::interrupt_flag());

    if config.calibrate {
        let floor = listener.calibrate()?;
        let thresholds = Thresholds::for_config(floor, listener.config());
        return report::print_calibration(floor, thresholds, config.json);
    }
    if config.barge_in {
        let detected = listener.wait_for_speech()?;
        return report::print_barge_in(detected, config.json);
    }
    run_turns(&mut listener, &config)
}

/// Listen turn by turn until the configured count is reached or Ctrl-C.
fn run_turns<O: StreamOpener>(listener: &mut VoiceListener<O>, config: &AppConfig) -> Result<()> {
    let mut turn = 0u32;
    while config.turns == 0 || turn < config.turns {
        if signal::interrupted() {
            break;
        }
        turn += 1;
        let result = listener
            .listen()
            .with_context(|| format!("turn {turn} failed"))?;
        let saved = save_utterance(&result, turn, config.output_dir.as_deref())?;
        report::print_capture(turn, &result, saved.as_deref(), config.json)?;
        if result.metrics.stop_reason == StopReason::Interrupted {
            break;
        }
    }
    Ok(())
}

fn run_offline(path: &Path, vad: &VadConfig, config: &AppConfig) -> Result<()> {
    if config.calibrate || config.barge_in {
        warn!("--calibrate and --barge-in need a live device; running a capture instead");
    }
    let (samples, rate) = audio::read_wav(path)?;
    let samples = audio::resample_buffer(&samples, rate, vad.sample_rate);
    let result = offline_capture_from_pcm(&samples, vad)?;
    let saved = save_utterance(&result, 1, config.output_dir.as_deref())?;
    report::print_capture(1, &result, saved.as_deref(), config.json)
}

/// Write a captured utterance to `output_dir/utterance-NNN.wav`.
fn save_utterance(
    result: &CaptureResult,
    turn: u32,
    output_dir: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let (Some(dir), Some(utterance)) = (output_dir, result.outcome.utterance()) else {
        return Ok(None);
    };
    let target = dir.join(format!("utterance-{turn:03}.wav"));
    match AudioInput::from_utterance(utterance.clone()).into_file_reference(&target)? {
        AudioInput::FileReference { path } => Ok(Some(path)),
        AudioInput::InMemory { .. } => Ok(None),
    }
}
