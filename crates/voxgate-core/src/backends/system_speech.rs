//! Platform speech utility fallback (`say` + `afconvert`).

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::audio::{read_wav_spec, PLATFORM_TTS_SAMPLE_RATE};
use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use crate::runtime::scratch::{run_tool, ScratchFile};

const SAY_TIMEOUT: Duration = Duration::from_secs(12);
const CONVERT_TIMEOUT: Duration = Duration::from_secs(6);

/// Synthesizes through OS utilities; never touches the accelerator.
#[derive(Debug, Clone)]
pub struct PlatformSpeech {
    say: String,
    afconvert: String,
}

impl PlatformSpeech {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            say: tools.say.clone(),
            afconvert: tools.afconvert.clone(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        PLATFORM_TTS_SAMPLE_RATE
    }

    /// Render `text` to a 16-bit PCM WAV. Both intermediates live in
    /// `scratch_dir` and are removed before returning.
    pub async fn synthesize(&self, text: &str, scratch_dir: &Path) -> Result<Vec<u8>> {
        let aiff = ScratchFile::reserve(scratch_dir, "realtime_tts_", ".aiff");
        let wav = aiff.sibling(".wav");

        let aiff_arg = path_arg(aiff.path());
        let wav_arg = path_arg(wav.path());
        run_tool(&self.say, ["-o", aiff_arg.as_str(), text], SAY_TIMEOUT).await?;

        let rate = PLATFORM_TTS_SAMPLE_RATE.to_string();
        run_tool(
            &self.afconvert,
            [
                "-f",
                "WAVE",
                "-d",
                "LEI16",
                "-r",
                rate.as_str(),
                aiff_arg.as_str(),
                wav_arg.as_str(),
            ],
            CONVERT_TIMEOUT,
        )
        .await?;

        if !wav.exists() {
            return Err(Error::InferenceError("TTS conversion failed".to_string()));
        }
        let bytes = tokio::fs::read(wav.path()).await?;
        if bytes.is_empty() {
            return Err(Error::InferenceError("TTS conversion failed".to_string()));
        }

        let spec = read_wav_spec(&bytes)?;
        info!(
            "System speech produced {} bytes ({} ch @ {} Hz)",
            bytes.len(),
            spec.channels,
            spec.sample_rate
        );
        Ok(bytes)
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn tools(say: String, afconvert: String) -> ToolsConfig {
        ToolsConfig {
            say,
            afconvert,
            ..ToolsConfig::default()
        }
    }

    fn scratch_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn failing_say_is_reported_and_cleaned_up() {
        let bin = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        // Writes its output file, then fails.
        let say = script(bin.path(), "say", r#"echo partial > "$2"; exit 1"#);
        let speech = PlatformSpeech::new(&tools(say, "true".to_string()));

        let err = speech.synthesize("hello", scratch.path()).await.unwrap_err();
        assert!(matches!(err, Error::ProcessFailed { .. }));
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn converted_wav_is_returned_and_intermediates_removed() {
        let bin = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let fixture = bin.path().join("fixture.wav");
        let wav = crate::audio::encode_pcm16(&[0, 100, -100], 22_050).unwrap();
        std::fs::write(&fixture, wav).unwrap();

        let say = script(bin.path(), "say", r#"echo aiff > "$2""#);
        // afconvert args: -f WAVE -d LEI16 -r 22050 <in> <out>
        let afconvert = script(
            bin.path(),
            "afconvert",
            &format!(r#"cp "{}" "$8""#, fixture.display()),
        );
        let speech = PlatformSpeech::new(&tools(say, afconvert));

        let bytes = speech.synthesize("hello", scratch.path()).await.unwrap();
        let info = crate::audio::WavInfo::parse(&bytes).unwrap();
        assert_eq!(info.sample_rate, 22_050);
        assert_eq!(info.sample_count(), 3);
        assert_eq!(scratch_entries(scratch.path()), 0);
    }
}
