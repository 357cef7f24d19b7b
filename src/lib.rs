//! Energy-based voice activity detection and utterance segmentation for
//! voice-call agents.
//!
//! [`VoiceListener`] opens an input stream per call, calibrates a noise floor,
//! and returns one utterance (or an explicit no-speech outcome) ready for the
//! speech-to-text hand-off in [`stt`].

pub mod audio;
pub mod config;
pub mod signal;
pub mod stt;
pub mod telemetry;
pub mod voice;

pub use stt::{AudioInput, Transcriber};
pub use telemetry::init_tracing;
pub use voice::VoiceListener;
