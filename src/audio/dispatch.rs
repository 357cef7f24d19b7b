use crossbeam_channel::{Sender, TrySendError};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Average interleaved channels into mono, converting each sample to f32.
/// A trailing partial group is averaged over the samples it has.
pub(super) fn downmix_into<T, F>(out: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        out.extend(data.iter().map(|&sample| convert(sample)));
        return;
    }
    out.extend(data.chunks(channels).map(|group| {
        let sum: f32 = group.iter().map(|&sample| convert(sample)).sum();
        sum / group.len() as f32
    }));
}

/// Runs on the device callback thread. Buffers mono samples and forwards whole
/// device-rate frames to the capture loop without blocking; when the channel
/// is full the frame is dropped and the overflow counter bumped.
pub(super) struct FrameSlicer {
    frame_samples: usize,
    channels: usize,
    pending: Vec<f32>,
    sender: Sender<Vec<f32>>,
    overflow: Arc<AtomicUsize>,
}

impl FrameSlicer {
    pub(super) fn new(
        frame_samples: usize,
        channels: usize,
        sender: Sender<Vec<f32>>,
        overflow: Arc<AtomicUsize>,
    ) -> Self {
        let frame_samples = frame_samples.max(1);
        Self {
            frame_samples,
            channels: channels.max(1),
            pending: Vec::with_capacity(frame_samples * 2),
            sender,
            overflow,
        }
    }

    pub(super) fn push<T, F>(&mut self, data: &[T], convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        downmix_into(&mut self.pending, data, self.channels, convert);

        let mut offset = 0;
        while self.pending.len() - offset >= self.frame_samples {
            let frame = self.pending[offset..offset + self.frame_samples].to_vec();
            offset += self.frame_samples;
            match self.sender.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.overflow.fetch_add(1, Ordering::Relaxed);
                }
                // Capture loop is gone; nothing left to feed.
                Err(TrySendError::Disconnected(_)) => {
                    self.pending.clear();
                    return;
                }
            }
        }
        self.pending.drain(..offset);
    }
}
