//! Human and JSON renderings of listen results for stdout.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use voxcall::audio::{CaptureMetrics, CaptureOutcome, CaptureResult, NoiseFloor, Thresholds};

#[derive(Debug, Serialize)]
struct CaptureReport<'a> {
    turn: u32,
    outcome: &'static str,
    sample_rate: u32,
    samples: usize,
    duration_ms: u64,
    wav: Option<&'a Path>,
    metrics: &'a CaptureMetrics,
}

fn capture_report<'a>(
    turn: u32,
    result: &'a CaptureResult,
    wav: Option<&'a Path>,
) -> CaptureReport<'a> {
    let (outcome, samples, duration_ms) = match &result.outcome {
        CaptureOutcome::Speech(utterance) => {
            ("speech", utterance.samples.len(), utterance.duration_ms())
        }
        CaptureOutcome::NoSpeech { .. } => ("no_speech", 0, 0),
    };
    CaptureReport {
        turn,
        outcome,
        sample_rate: result.outcome.sample_rate(),
        samples,
        duration_ms,
        wav,
        metrics: &result.metrics,
    }
}

pub(crate) fn format_capture_line(turn: u32, result: &CaptureResult, wav: Option<&Path>) -> String {
    let metrics = &result.metrics;
    let mut line = match &result.outcome {
        CaptureOutcome::Speech(utterance) => format!(
            "turn {turn}: speech {} ms ({} frames, lock at frame {}, stop: {})",
            utterance.duration_ms(),
            metrics.frames_processed,
            metrics.lock_frame.unwrap_or_default(),
            metrics.stop_reason.label()
        ),
        CaptureOutcome::NoSpeech { .. } => format!(
            "turn {turn}: no speech (listened {} ms, stop: {})",
            metrics.capture_ms,
            metrics.stop_reason.label()
        ),
    };
    if let Some(path) = wav {
        line.push_str(&format!(" -> {}", path.display()));
    }
    line
}

pub(crate) fn print_capture(
    turn: u32,
    result: &CaptureResult,
    wav: Option<&Path>,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&capture_report(turn, result, wav))?);
    } else {
        println!("{}", format_capture_line(turn, result, wav));
    }
    Ok(())
}

pub(crate) fn print_calibration(floor: NoiseFloor, thresholds: Thresholds, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "noise_floor": floor,
            "start_threshold": thresholds.start,
            "end_threshold": thresholds.end,
        });
        println!("{value}");
    } else {
        println!(
            "noise floor {:.6} (start threshold {:.6}, end threshold {:.6})",
            floor.value(),
            thresholds.start,
            thresholds.end
        );
    }
    Ok(())
}

pub(crate) fn print_barge_in(detected: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::json!({ "barge_in": detected }));
    } else if detected {
        println!("barge-in: detected");
    } else {
        println!("barge-in: none");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxcall::audio::{offline_capture_from_pcm, VadConfig};

    fn result(segments: &[(f32, usize)]) -> CaptureResult {
        let samples: Vec<f32> = segments
            .iter()
            .flat_map(|&(amplitude, frames)| std::iter::repeat(amplitude).take(frames * 320))
            .collect();
        let cfg = VadConfig {
            end_silence_ms: 300,
            ..VadConfig::default()
        };
        offline_capture_from_pcm(&samples, &cfg).unwrap()
    }

    #[test]
    fn speech_line_mentions_lock_and_wav() {
        let result = result(&[(0.001, 15), (0.1, 8), (0.001, 20)]);
        let line = format_capture_line(2, &result, Some(Path::new("out/utterance-002.wav")));
        assert_eq!(
            line,
            "turn 2: speech 460 ms (23 frames, lock at frame 8, stop: end_of_utterance) -> out/utterance-002.wav"
        );
    }

    #[test]
    fn no_speech_line_reports_listened_time() {
        let result = result(&[(0.001, 15), (0.001, 10)]);
        assert_eq!(
            format_capture_line(1, &result, None),
            "turn 1: no speech (listened 200 ms, stop: source_exhausted)"
        );
    }

    #[test]
    fn json_report_tags_stop_reason() {
        let result = result(&[(0.001, 15), (0.1, 8), (0.001, 20)]);
        let value = serde_json::to_value(capture_report(1, &result, None)).unwrap();
        assert_eq!(value["outcome"], "speech");
        assert_eq!(value["samples"], 23 * 320);
        assert_eq!(value["metrics"]["stop_reason"]["kind"], "end_of_utterance");
        assert_eq!(value["metrics"]["stop_reason"]["silence_ms"], 300);
        assert_eq!(value["metrics"]["end_frame"], 23);
        assert!(value["wav"].is_null());
    }
}
