//! WAV encoding for handing utterances to file-based STT backends.

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Write mono f32 samples as 16-bit PCM. Samples are clamped to [-1, 1].
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer
            .write_sample(scaled)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    writer
        .finalize()
        .with_context(|| format!("failed to finalize {}", path.display()))?;
    Ok(())
}

/// Read any PCM or float WAV, downmixed to mono f32. Returns samples and rate.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        bail!("{} declares zero channels", path.display());
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            if !(1..=32).contains(&spec.bits_per_sample) {
                bail!(
                    "{} uses unsupported bit depth {}",
                    path.display(),
                    spec.bits_per_sample
                );
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("failed to decode {}", path.display()))?
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("failed to decode {}", path.display()))?,
    };

    let channels = usize::from(spec.channels);
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|group| group.iter().sum::<f32>() / group.len() as f32)
            .collect()
    };
    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("voxcall-wav-{}-{name}.wav", std::process::id()))
    }

    #[test]
    fn writes_mono_sixteen_bit_pcm() {
        let path = temp_path("spec");
        write_wav(&path, &[0.0, 0.5, -0.5], 16_000).unwrap();
        let reader = WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.sample_format, SampleFormat::Int);
        assert_eq!(reader.len(), 3);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn clamps_out_of_range_samples() {
        let path = temp_path("clamp");
        write_wav(&path, &[2.0, -2.0], 8_000).unwrap();
        let mut reader = WavReader::open(&path).unwrap();
        let values: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(values, vec![i16::MAX, -i16::MAX]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn read_downmixes_stereo() {
        let path = temp_path("stereo");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for (left, right) in [(16_384i16, 0i16), (-16_384, -16_384)] {
            writer.write_sample(left).unwrap();
            writer.write_sample(right).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate) = read_wav(&path).unwrap();
        assert_eq!(rate, 22_050);
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.25).abs() < 1e-4);
        assert!((samples[1] + 0.5).abs() < 1e-4);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn read_reports_missing_file_path() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);
        let err = read_wav(&path).unwrap_err();
        assert!(format!("{err:#}").contains("voxcall-wav-"));
    }
}
