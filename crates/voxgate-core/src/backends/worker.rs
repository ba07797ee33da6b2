//! Long-lived engine worker speaking newline-delimited JSON.
//!
//! The speech engines run inside a helper process (see `scripts/`). The
//! worker prints `{"ready": true}` once its model is loaded, then answers
//! each request line with one or more reply lines. Every request carries an
//! `id` that replies echo back; a multi-line reply ends with `{"done": true}`.
//! Any reply may instead carry `{"error": "..."}`, which ends that request.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use futures::stream::BoxStream;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// How to launch a worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub program: String,
    pub script: PathBuf,
    pub args: Vec<String>,
    /// Upper bound on spawn + model load.
    pub load_timeout: Duration,
}

pub struct WorkerProcess {
    name: String,
    io: Mutex<WorkerIo>,
}

struct WorkerIo {
    // Held so the child is killed when the worker is dropped.
    _child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

impl WorkerProcess {
    /// Spawn the worker and wait until it reports its model as loaded.
    pub async fn spawn(name: &str, spec: &WorkerSpec) -> Result<Self> {
        let load_error = |reason: String| Error::BackendLoadError {
            backend: name.to_string(),
            reason,
        };

        info!(
            "Starting {} worker: {} {:?} {:?}",
            name, spec.program, spec.script, spec.args
        );

        let mut child = Command::new(&spec.program)
            .arg(&spec.script)
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| load_error(format!("failed to start worker: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| load_error("worker stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| load_error("worker stdout unavailable".to_string()))?;

        let mut io = WorkerIo {
            _child: child,
            stdin,
            lines: BufReader::new(stdout).lines(),
        };

        let ready = tokio::time::timeout(spec.load_timeout, io.next_message(name, None))
            .await
            .map_err(|_| {
                load_error(format!(
                    "model not ready within {}s",
                    spec.load_timeout.as_secs()
                ))
            })?
            .map_err(|e| load_error(e.to_string()))?;

        if ready.get("ready").and_then(Value::as_bool) != Some(true) {
            return Err(load_error(format!("unexpected handshake: {ready}")));
        }

        info!("{} worker ready", name);
        Ok(Self {
            name: name.to_string(),
            io: Mutex::new(io),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send one request and return its single reply.
    pub async fn request(&self, mut request: Value) -> Result<Value> {
        let id = tag_request(&mut request);
        let mut io = self.io.lock().await;
        io.send(&self.name, &request).await?;
        io.next_message(&self.name, Some(&id)).await
    }

    /// Send one request and stream its replies up to the terminating
    /// `{"done": true}` line.
    ///
    /// The stream owns the worker's I/O for its whole lifetime, so replies of
    /// different requests never interleave.
    pub fn request_stream(&self, mut request: Value) -> BoxStream<'_, Result<Value>> {
        Box::pin(async_stream::try_stream! {
            let id = tag_request(&mut request);
            let mut io = self.io.lock().await;
            io.send(&self.name, &request).await?;
            loop {
                let message = io.next_message(&self.name, Some(&id)).await?;
                if message.get("done").and_then(Value::as_bool) == Some(true) {
                    break;
                }
                yield message;
            }
        })
    }
}

fn tag_request(request: &mut Value) -> String {
    let id = Uuid::new_v4().simple().to_string();
    if let Value::Object(map) = request {
        map.insert("id".to_string(), Value::String(id.clone()));
    }
    id
}

impl WorkerIo {
    async fn send(&mut self, name: &str, request: &Value) -> Result<()> {
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.stdin.write_all(&line).await.map_err(|e| {
            Error::InferenceError(format!("{name} worker is not accepting requests: {e}"))
        })?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Next reply line addressed to `id`. Lines left over from an abandoned
    /// request carry a different id and are skipped.
    async fn next_message(&mut self, name: &str, id: Option<&str>) -> Result<Value> {
        loop {
            let line = self.lines.next_line().await?.ok_or_else(|| {
                Error::InferenceError(format!("{name} worker exited unexpectedly"))
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: Value = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(_) => {
                    debug!("{} worker: {}", name, line);
                    continue;
                }
            };

            if let Some(expected) = id {
                let reply_id = message.get("id").and_then(Value::as_str);
                if reply_id != Some(expected) {
                    warn!("{} worker: discarding stale reply {:?}", name, reply_id);
                    continue;
                }
            }

            if let Some(error) = message.get("error").and_then(Value::as_str) {
                return Err(Error::InferenceError(format!("{name}: {error}")));
            }
            return Ok(message);
        }
    }
}
