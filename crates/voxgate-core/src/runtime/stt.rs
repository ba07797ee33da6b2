//! STT runtime methods.

use std::ffi::OsStr;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::audio::{AudioKind, STT_SAMPLE_RATE};
use crate::error::Result;
use crate::runtime::scratch::{run_tool, ScratchFile};
use crate::runtime::service::Gateway;
use crate::runtime::types::Transcript;

impl Gateway {
    /// Transcribe one uploaded clip.
    ///
    /// Clips below the configured size floor, and clips the decoder rejects
    /// or times out on, yield [`Transcript::empty`] instead of an error.
    pub async fn transcribe(&self, audio: &[u8], mime_type: Option<&str>) -> Result<Transcript> {
        let language = self.config.stt.language.as_str();
        if audio.len() < self.config.stt.min_audio_bytes {
            info!(
                "STT input of {} bytes below {} byte floor, returning empty transcript",
                audio.len(),
                self.config.stt.min_audio_bytes
            );
            return Ok(Transcript::empty(language));
        }

        let started = Instant::now();
        let kind = AudioKind::from_mime(mime_type);
        let upload =
            ScratchFile::write(&self.config.scratch_dir, "stt-", kind.file_suffix(), audio).await?;

        let backend = self.registry.ensure_stt().await?;

        let normalized = if backend.requires_normalized_input() && kind != AudioKind::Wav {
            let target = upload.sibling(".stt.wav");
            let rate = STT_SAMPLE_RATE.to_string();
            let decoded = run_tool(
                &self.config.tools.ffmpeg,
                [
                    OsStr::new("-y"),
                    OsStr::new("-i"),
                    upload.path().as_os_str(),
                    OsStr::new("-ar"),
                    OsStr::new(&rate),
                    OsStr::new("-ac"),
                    OsStr::new("1"),
                    target.path().as_os_str(),
                ],
                Duration::from_secs(self.config.stt.decode_timeout_secs),
            )
            .await;
            match decoded {
                Ok(()) => Some(target),
                Err(err) if err.is_process_outcome() => {
                    warn!("STT decode failed ({}), returning empty transcript", err);
                    return Ok(Transcript::empty(language));
                }
                Err(err) => return Err(err),
            }
        } else {
            None
        };

        // The scratch files travel with the call so they outlive an abandoned request.
        let call = {
            let backend = backend.clone();
            let hint = language.to_string();
            async move {
                let input = normalized.as_ref().unwrap_or(&upload);
                backend.transcribe(input.path(), &hint).await
            }
        };
        let result = self.gpu.run_exclusive("stt", call).await?;

        let text = result.text.trim().to_string();
        info!(
            "STT {} transcribed in {}ms: {}",
            backend.name(),
            started.elapsed().as_millis(),
            text.chars().take(80).collect::<String>()
        );

        Ok(Transcript {
            text,
            language: result
                .language
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| language.to_string()),
            probability: result.probability.unwrap_or(1.0),
        })
    }
}
