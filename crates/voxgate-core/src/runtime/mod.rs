//! Runtime orchestration layer.
//!
//! [`Gateway`] is the explicitly constructed context every request handler
//! receives: configuration, the backend registry, the accelerator lock and
//! the chat dispatcher. The STT and TTS request lifecycles are implemented
//! as `impl Gateway` blocks in their own modules.

pub mod gpu;
pub mod scratch;
mod service;
mod stt;
mod tts;
mod types;

pub use gpu::{GpuGuard, GpuLock};
pub use scratch::ScratchFile;
pub use service::Gateway;
pub use types::{HealthReport, SpeechAudio, Transcript};
