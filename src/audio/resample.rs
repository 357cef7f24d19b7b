//! Sample-rate conversion from device or file rates to the session rate.
//!
//! With `high-quality-audio` the sinc resampler from rubato is used; the FIR +
//! linear path is the fallback and the only path without the feature.

#[cfg(feature = "high-quality-audio")]
use anyhow::{anyhow, Result};
#[cfg(feature = "high-quality-audio")]
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};
use std::cmp::Ordering as CmpOrdering;
use std::f32::consts::PI;
use tracing::warn;

pub(super) const MIN_RATE: u32 = 2_000;
pub(super) const MAX_RATE: u32 = 384_000;
const MAX_FIR_TAPS: usize = 129;
#[cfg(feature = "high-quality-audio")]
const SINC_CHUNK: usize = 256;

pub(super) fn rate_supported(rate: u32) -> bool {
    (MIN_RATE..=MAX_RATE).contains(&rate)
}

/// Convert a whole buffer from `from_rate` to `to_rate`.
///
/// Unsupported rates return the input untouched; the caller has already
/// validated the session rate, so that only happens for odd file headers.
pub fn resample_buffer(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == to_rate {
        return input.to_vec();
    }
    if !rate_supported(from_rate) || !rate_supported(to_rate) {
        warn!(from_rate, to_rate, "sample rate outside resampler range, passing through");
        return input.to_vec();
    }

    #[cfg(feature = "high-quality-audio")]
    match resample_sinc_buffer(input, from_rate, to_rate) {
        Ok(output) => return output,
        Err(err) => warn!(%err, "sinc resampler failed, using basic path"),
    }

    resample_basic(input, from_rate, to_rate)
}

#[cfg(feature = "high-quality-audio")]
fn sinc_resampler(from_rate: u32, to_rate: u32, chunk: usize) -> Result<SincFixedIn<f32>> {
    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let params = InterpolationParameters {
        sinc_len: 64,
        f_cutoff: 0.90,
        interpolation: InterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    SincFixedIn::<f32>::new(ratio, 2.0, params, chunk, 1)
        .map_err(|e| anyhow!("failed to construct sinc resampler: {e:?}"))
}

#[cfg(feature = "high-quality-audio")]
fn resample_sinc_buffer(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    let mut resampler = sinc_resampler(from_rate, to_rate, SINC_CHUNK)?;
    let expected = expected_len(input.len(), from_rate, to_rate);
    let mut out = Vec::with_capacity(expected + SINC_CHUNK);

    let mut segment = vec![0.0f32; SINC_CHUNK];
    for chunk in input.chunks(SINC_CHUNK) {
        // Hold the last sample across the padding so the tail does not click.
        let pad = chunk.last().copied().unwrap_or(0.0);
        segment.fill(pad);
        segment[..chunk.len()].copy_from_slice(chunk);
        let produced = resampler
            .process(std::slice::from_ref(&segment), None)
            .map_err(|e| anyhow!("resampler process failed: {e:?}"))?;
        if let Some(channel) = produced.into_iter().next() {
            out.extend(channel);
        }
    }
    Ok(fit_length(out, expected))
}

fn expected_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    ((input_len as u64 * u64::from(to_rate)) / u64::from(from_rate.max(1))) as usize
}

/// FIR low-pass (when decimating) followed by linear interpolation.
pub(super) fn resample_basic(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == 0 || from_rate == to_rate {
        return input.to_vec();
    }
    let filtered = if from_rate > to_rate {
        let taps = fir_tap_count(from_rate, to_rate);
        low_pass_fir(input, from_rate, to_rate, taps)
    } else {
        input.to_vec()
    };
    let ratio = to_rate as f32 / from_rate as f32;
    resample_linear(&filtered, ratio)
}

/// Linear interpolation by `ratio` (output rate / input rate).
pub(super) fn resample_linear(input: &[f32], ratio: f32) -> Vec<f32> {
    let output_len = (input.len() as f32 * ratio).round() as usize;
    let last = input.last().copied().unwrap_or(0.0);
    (0..output_len)
        .map(|i| {
            let position = i as f32 / ratio;
            let idx = position.floor() as usize;
            let frac = position - idx as f32;
            match (input.get(idx), input.get(idx + 1)) {
                (Some(a), Some(b)) => a * (1.0 - frac) + b * frac,
                _ => last,
            }
        })
        .collect()
}

/// Longer filters for steeper decimation, always odd and capped.
pub(super) fn fir_tap_count(from_rate: u32, to_rate: u32) -> usize {
    let decimation = from_rate as f32 / to_rate.max(1) as f32;
    let mut taps = (decimation * 4.0).ceil().max(11.0) as usize;
    if taps % 2 == 0 {
        taps += 1;
    }
    taps.min(MAX_FIR_TAPS)
}

/// Hamming-windowed sinc low-pass with its cutoff at the target Nyquist.
pub(super) fn low_pass_fir(input: &[f32], from_rate: u32, to_rate: u32, taps: usize) -> Vec<f32> {
    if input.is_empty() || taps <= 1 {
        return input.to_vec();
    }
    let cutoff = (to_rate as f32 * 0.5 / from_rate as f32).min(0.499);
    let coeffs = design_low_pass(cutoff, taps);
    let half = taps / 2;

    (0..input.len())
        .map(|n| {
            coeffs
                .iter()
                .enumerate()
                .filter_map(|(k, coeff)| {
                    (n + k)
                        .checked_sub(half)
                        .and_then(|idx| input.get(idx))
                        .map(|sample| sample * coeff)
                })
                .sum::<f32>()
        })
        .collect()
}

/// Normalized taps; they sum to 1 so DC passes unchanged.
pub(super) fn design_low_pass(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let m = taps.saturating_sub(1) as f32;
    let mut coeffs: Vec<f32> = (0..taps)
        .map(|n| {
            let centered = n as f32 - m / 2.0;
            let x = 2.0 * PI * normalized_cutoff * centered;
            let sinc = if centered == 0.0 {
                2.0 * normalized_cutoff
            } else {
                (2.0 * normalized_cutoff * x.sin()) / x
            };
            let window = if taps <= 1 {
                1.0
            } else {
                0.54 - 0.46 * ((2.0 * PI * n as f32) / m).cos()
            };
            sinc * window
        })
        .collect();

    let sum: f32 = coeffs.iter().sum();
    if sum != 0.0 {
        coeffs.iter_mut().for_each(|coeff| *coeff /= sum);
    }
    coeffs
}

/// Truncate or hold-pad `data` to exactly `desired` samples.
pub(super) fn fit_length(mut data: Vec<f32>, desired: usize) -> Vec<f32> {
    match data.len().cmp(&desired) {
        CmpOrdering::Greater => data.truncate(desired),
        CmpOrdering::Less => {
            let pad = data.last().copied().unwrap_or(0.0);
            data.resize(desired, pad);
        }
        CmpOrdering::Equal => {}
    }
    data
}

/// Per-stream converter from device frames to session frames.
///
/// Keeps one sinc resampler alive for the whole stream so filter state carries
/// across frame boundaries. Falls back to the basic path for good if the sinc
/// resampler cannot be built or fails once.
pub(super) struct FrameResampler {
    from_rate: u32,
    to_rate: u32,
    target_len: usize,
    #[cfg(feature = "high-quality-audio")]
    sinc: Option<SincFixedIn<f32>>,
}

impl FrameResampler {
    pub(super) fn new(from_rate: u32, to_rate: u32, input_len: usize, target_len: usize) -> Self {
        #[cfg(feature = "high-quality-audio")]
        let sinc = if from_rate != to_rate && rate_supported(from_rate) && rate_supported(to_rate)
        {
            match sinc_resampler(from_rate, to_rate, input_len.max(1)) {
                Ok(resampler) => Some(resampler),
                Err(err) => {
                    warn!(%err, "sinc resampler unavailable, using basic path");
                    None
                }
            }
        } else {
            None
        };
        #[cfg(not(feature = "high-quality-audio"))]
        let _ = input_len;

        Self {
            from_rate,
            to_rate,
            target_len,
            #[cfg(feature = "high-quality-audio")]
            sinc,
        }
    }

    pub(super) fn is_passthrough(&self) -> bool {
        self.from_rate == self.to_rate
    }

    pub(super) fn convert(&mut self, frame: Vec<f32>) -> Vec<f32> {
        if self.is_passthrough() {
            return fit_length(frame, self.target_len);
        }

        #[cfg(feature = "high-quality-audio")]
        if let Some(resampler) = self.sinc.as_mut() {
            match resampler.process(std::slice::from_ref(&frame), None) {
                Ok(produced) => {
                    if let Some(channel) = produced.into_iter().next() {
                        return fit_length(channel, self.target_len);
                    }
                }
                Err(err) => {
                    warn!(error = ?err, "sinc resampler failed, switching to basic path");
                    self.sinc = None;
                }
            }
        }

        fit_length(
            resample_basic(&frame, self.from_rate, self.to_rate),
            self.target_len,
        )
    }
}
