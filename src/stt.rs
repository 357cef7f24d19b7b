//! Speech-to-text hand-off.
//!
//! The STT engine itself lives outside this crate. Backends differ in what they
//! accept (raw PCM or a WAV path), so captured audio travels as an
//! [`AudioInput`] and is converted to the form a backend wants exactly once.

use crate::audio::{read_wav, write_wav, Utterance};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Audio handed to a transcriber.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioInput {
    /// Mono f32 PCM at `sample_rate`.
    InMemory { samples: Vec<f32>, sample_rate: u32 },
    /// Mono 16-bit PCM WAV on disk.
    FileReference { path: PathBuf },
}

impl AudioInput {
    pub fn from_utterance(utterance: Utterance) -> Self {
        AudioInput::InMemory {
            samples: utterance.samples,
            sample_rate: utterance.sample_rate,
        }
    }

    /// Materialize in-memory audio as a WAV at `path`. A file reference is
    /// returned unchanged.
    pub fn into_file_reference(self, path: &Path) -> Result<Self> {
        match self {
            AudioInput::InMemory {
                samples,
                sample_rate,
            } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                write_wav(path, &samples, sample_rate)?;
                debug!(path = %path.display(), samples = samples.len(), "utterance written");
                Ok(AudioInput::FileReference {
                    path: path.to_path_buf(),
                })
            }
            reference @ AudioInput::FileReference { .. } => Ok(reference),
        }
    }

    /// Resolve to PCM samples and their rate, decoding the WAV if needed.
    pub fn into_samples(self) -> Result<(Vec<f32>, u32)> {
        match self {
            AudioInput::InMemory {
                samples,
                sample_rate,
            } => Ok((samples, sample_rate)),
            AudioInput::FileReference { path } => read_wav(&path),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AudioInput::InMemory { .. } => "in_memory",
            AudioInput::FileReference { .. } => "file",
        }
    }
}

impl From<Utterance> for AudioInput {
    fn from(utterance: Utterance) -> Self {
        Self::from_utterance(utterance)
    }
}

/// Speech-to-text collaborator.
pub trait Transcriber {
    fn transcribe(&mut self, input: AudioInput) -> Result<String>;

    fn name(&self) -> &'static str {
        "unknown_stt"
    }
}
