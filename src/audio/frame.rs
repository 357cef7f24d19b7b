//! Fixed-size audio frames and the sources that produce them.

use super::energy::frame_energy;
use anyhow::Result;

/// One fixed-duration block of mono samples. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Vec<f32>,
}

impl Frame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// RMS energy of the frame, see [`frame_energy`].
    pub fn energy(&self) -> f32 {
        frame_energy(&self.samples)
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// A frame plus whether the producer lost audio before it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRead {
    pub frame: Frame,
    pub overflowed: bool,
}

impl FrameRead {
    pub fn clean(frame: Frame) -> Self {
        Self {
            frame,
            overflowed: false,
        }
    }
}

/// Blocking producer of fixed-size mono frames.
///
/// `Ok(None)` signals that a finite source is exhausted; live sources only
/// return `None` once their stream is gone.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Option<FrameRead>>;

    fn name(&self) -> &str {
        "unknown_source"
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<Option<FrameRead>> {
        (**self).read_frame()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Frames over an in-memory PCM buffer. The last partial frame is zero padded.
#[derive(Debug, Clone)]
pub struct PcmFrameSource {
    samples: Vec<f32>,
    frame_samples: usize,
    cursor: usize,
}

impl PcmFrameSource {
    pub fn new(samples: Vec<f32>, frame_samples: usize) -> Self {
        Self {
            samples,
            frame_samples: frame_samples.max(1),
            cursor: 0,
        }
    }

    /// Build a source from a sequence of pre-cut frames.
    pub fn from_frames<I>(frames: I, frame_samples: usize) -> Self
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        let samples = frames.into_iter().flatten().collect();
        Self::new(samples, frame_samples)
    }

    pub fn remaining_frames(&self) -> usize {
        self.samples
            .len()
            .saturating_sub(self.cursor)
            .div_ceil(self.frame_samples)
    }
}

impl FrameSource for PcmFrameSource {
    fn read_frame(&mut self) -> Result<Option<FrameRead>> {
        if self.cursor >= self.samples.len() {
            return Ok(None);
        }
        let end = (self.cursor + self.frame_samples).min(self.samples.len());
        let mut frame = self.samples[self.cursor..end].to_vec();
        frame.resize(self.frame_samples, 0.0);
        self.cursor = end;
        Ok(Some(FrameRead::clean(Frame::new(frame))))
    }

    fn name(&self) -> &str {
        "pcm"
    }
}
