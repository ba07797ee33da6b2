//! Request-scoped scratch files and bounded subprocess execution.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// A uniquely named path inside the scratch directory.
///
/// The file (if anything created it) is removed when the guard drops, so
/// every exit path of a handler cleans up after itself.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserve a fresh name; nothing is created on disk yet.
    pub fn reserve(dir: &Path, prefix: &str, suffix: &str) -> Self {
        let name = format!("{prefix}{}{suffix}", Uuid::new_v4().simple());
        Self {
            path: dir.join(name),
        }
    }

    /// Reserve a name and write `bytes` to it.
    pub async fn write(dir: &Path, prefix: &str, suffix: &str, bytes: &[u8]) -> Result<Self> {
        let file = Self::reserve(dir, prefix, suffix);
        tokio::fs::write(&file.path, bytes).await?;
        Ok(file)
    }

    /// Sibling path sharing this file's stem, e.g. `clip.webm` -> `clip.stt.wav`.
    pub fn sibling(&self, suffix: &str) -> Self {
        let stem = self
            .path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("scratch");
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        Self {
            path: parent.join(format!("{stem}{suffix}")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed scratch file {:?}", self.path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!("Failed to remove scratch file {:?}: {}", self.path, err),
        }
    }
}

/// Run an external tool to completion under a wall-clock limit.
///
/// The child is killed if the limit elapses. Non-zero exit becomes
/// [`Error::ProcessFailed`] carrying the tail of stderr.
pub async fn run_tool<I, S>(program: &str, args: I, timeout: Duration) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {} (timeout {}s)", program, timeout.as_secs());

    let child = command.spawn().map_err(|e| {
        Error::InferenceError(format!("Failed to start {program}: {e}"))
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            return Err(Error::ProcessTimeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            })
        }
    };

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr
        .trim()
        .lines()
        .rev()
        .take(3)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join(" | ");
    Err(Error::ProcessFailed {
        program: program.to_string(),
        status: output
            .status
            .code()
            .map(|code| format!("code={code}"))
            .unwrap_or_else(|| "signal".to_string()),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scratch_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let file = ScratchFile::write(dir.path(), "clip-", ".webm", b"abc")
                .await
                .unwrap();
            assert!(file.exists());
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn reserved_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = ScratchFile::reserve(dir.path(), "tts-", ".aiff");
        let b = ScratchFile::reserve(dir.path(), "tts-", ".aiff");
        assert_ne!(a.path(), b.path());
        assert!(!a.exists());
    }

    #[test]
    fn sibling_shares_stem() {
        let file = ScratchFile {
            path: PathBuf::from("/tmp/voxgate/stt-abc.webm"),
        };
        let wav = file.sibling(".stt.wav");
        assert_eq!(wav.path(), Path::new("/tmp/voxgate/stt-abc.stt.wav"));
        std::mem::forget(file);
        std::mem::forget(wav);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let err = run_tool("sh", ["-c", "echo boom >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            Error::ProcessFailed { status, detail, .. } => {
                assert_eq!(status, "code=3");
                assert_eq!(detail, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tool_times_out() {
        let err = run_tool("sleep", ["5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProcessTimeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_tool_returns_ok() {
        run_tool("true", std::iter::empty::<&str>(), Duration::from_secs(5))
            .await
            .unwrap();
    }
}
