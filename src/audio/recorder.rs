//! System microphone access via CPAL.
//!
//! Handles device enumeration, format conversion, and sample rate
//! normalization. Every stream delivers fixed-size mono frames at the
//! session rate regardless of the hardware layout.

use super::dispatch::FrameSlicer;
use super::frame::{Frame, FrameRead, FrameSource};
use super::resample::FrameResampler;
use super::vad::VadConfig;
use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A read that waits this long without a frame treats the device as stalled.
pub const DEVICE_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Shape of the frames a stream must deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub sample_rate: u32,
    pub frame_ms: u64,
    pub channel_capacity: usize,
}

impl StreamSettings {
    pub fn frame_samples(&self) -> usize {
        ((u64::from(self.sample_rate) * self.frame_ms) / 1000).max(1) as usize
    }
}

impl From<&VadConfig> for StreamSettings {
    fn from(cfg: &VadConfig) -> Self {
        Self {
            sample_rate: cfg.sample_rate,
            frame_ms: cfg.frame_ms,
            channel_capacity: cfg.channel_capacity,
        }
    }
}

/// Anything that can open a fresh frame stream for one listening call.
pub trait StreamOpener {
    type Stream: FrameSource;

    fn open_stream(&self, settings: &StreamSettings) -> Result<Self::Stream>;
}

/// Audio input device wrapper.
pub struct Recorder {
    device: cpal::Device,
}

impl Recorder {
    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    /// Create a recorder for a named device, or the host default.
    pub fn new(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .with_context(|| format!("no default input device available. {}", mic_permission_hint()))?,
        };
        Ok(Self { device })
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }
}

impl StreamOpener for Recorder {
    type Stream = DeviceStream;

    /// Open the device with its native config and start it. Frames are
    /// downmixed and sliced on the callback thread, then resampled to the
    /// session rate when read.
    fn open_stream(&self, settings: &StreamSettings) -> Result<DeviceStream> {
        let default_config = self
            .device
            .default_input_config()
            .context("failed to query default input config")?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let device_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));
        let device_frame_samples =
            ((u64::from(device_rate) * settings.frame_ms) / 1000).max(1) as usize;
        let device_name = self.device_name();

        let (sender, receiver) = bounded::<Vec<f32>>(settings.channel_capacity.max(1));
        let overflow = Arc::new(AtomicUsize::new(0));
        let mut slicer = FrameSlicer::new(device_frame_samples, channels, sender, overflow.clone());
        let err_fn = |err: cpal::StreamError| warn!(error = %err, "audio stream error");

        let stream = match format {
            SampleFormat::F32 => self.device.build_input_stream(
                &device_config,
                move |data: &[f32], _| slicer.push(data, |sample| sample),
                err_fn,
                None,
            ),
            SampleFormat::I16 => self.device.build_input_stream(
                &device_config,
                move |data: &[i16], _| slicer.push(data, |sample| f32::from(sample) / 32_768.0),
                err_fn,
                None,
            ),
            SampleFormat::U16 => self.device.build_input_stream(
                &device_config,
                move |data: &[u16], _| {
                    slicer.push(data, |sample| (f32::from(sample) - 32_768.0) / 32_768.0)
                },
                err_fn,
                None,
            ),
            other => bail!("unsupported sample format: {other:?}"),
        }
        .with_context(|| format!("failed to open input stream on '{device_name}'"))?;

        stream
            .play()
            .with_context(|| format!("failed to start input stream on '{device_name}'"))?;
        info!(
            device = %device_name,
            ?format,
            device_rate,
            channels,
            target_rate = settings.sample_rate,
            "input stream opened"
        );

        Ok(DeviceStream {
            stream,
            receiver,
            overflow,
            overflow_seen: 0,
            resampler: FrameResampler::new(
                device_rate,
                settings.sample_rate,
                device_frame_samples,
                settings.frame_samples(),
            ),
            device_name,
        })
    }
}

/// A live input stream. Dropping it pauses and releases the device.
pub struct DeviceStream {
    stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    overflow: Arc<AtomicUsize>,
    overflow_seen: usize,
    resampler: FrameResampler,
    device_name: String,
}

impl FrameSource for DeviceStream {
    fn read_frame(&mut self) -> Result<Option<FrameRead>> {
        let raw = match self.receiver.recv_timeout(DEVICE_STALL_TIMEOUT) {
            Ok(raw) => raw,
            Err(RecvTimeoutError::Timeout) => bail!(
                "no audio from '{}' for {} ms; check microphone permissions and availability. {}",
                self.device_name,
                DEVICE_STALL_TIMEOUT.as_millis(),
                mic_permission_hint()
            ),
            Err(RecvTimeoutError::Disconnected) => return Ok(None),
        };

        let dropped = self.overflow.load(Ordering::Relaxed);
        let overflowed = dropped > self.overflow_seen;
        self.overflow_seen = dropped;

        let samples = self.resampler.convert(raw);
        Ok(Some(FrameRead {
            frame: Frame::new(samples),
            overflowed,
        }))
    }

    fn name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        if let Err(err) = self.stream.pause() {
            debug!(error = %err, "failed to pause input stream");
        }
        debug!(
            device = %self.device_name,
            overflowed_frames = self.overflow.load(Ordering::Relaxed),
            "input stream released"
        );
    }
}

fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}
