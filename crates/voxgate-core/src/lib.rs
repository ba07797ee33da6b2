//! Voxgate Core - local speech, synthesis and chat gateway
//!
//! This crate holds everything behind the HTTP surface of the gateway:
//! speech-to-text and text-to-speech backends hosted in long-lived engine
//! workers, the process-wide accelerator lock that serializes them, WAV
//! framing, and the chat gateway that normalizes vendor-style requests for
//! a local or remote completion provider.
//!
//! # Example
//!
//! ```ignore
//! use voxgate_core::{Gateway, GatewayConfig};
//!
//! let gateway = Gateway::new(GatewayConfig::from_env())?;
//! let transcript = gateway.transcribe(&clip, Some("audio/webm")).await?;
//! let speech = gateway.synthesize("Hello there.", None).await?;
//! ```

pub mod audio;
pub mod backends;
pub mod config;
pub mod error;
pub mod llm;
pub mod runtime;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use llm::{ChatPayload, ChatResponse, StreamRecord, Usage};
pub use runtime::{Gateway, HealthReport, SpeechAudio, Transcript};
