//! Process-boundary binding to the real models.
//!
//! The acoustic model and vocoder live in a long-running sidecar process
//! (see `scripts/model_bridge.py`). We talk to it over its stdin/stdout with
//! one JSON object per line:
//!
//! ```text
//! -> {"op":"load"}                          <- {"ok":true}
//! -> {"op":"predict","text":"..."}          <- {"ok":true,"outputs":{"mel-output":<tensor>,...}}
//! -> {"op":"synthesize","mel":<tensor>}     <- {"ok":true,"waveform":<tensor>}
//!                                           <- {"ok":false,"error":"..."}
//! ```
//!
//! A tensor is `{"shape":[...],"data":"<base64 of little-endian f32>"}`.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use base64::{engine::general_purpose, Engine as _};
use ndarray::{ArrayD, ArrayView2, IxDyn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{AcousticModel, AcousticOutput, Vocoder};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireTensor {
    pub shape: Vec<usize>,
    pub data: String,
}

impl WireTensor {
    pub fn from_slice(shape: &[usize], values: impl IntoIterator<Item = f32>) -> Self {
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Self {
            shape: shape.to_vec(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn into_array(self) -> anyhow::Result<ArrayD<f32>> {
        let bytes = general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .context("tensor data is not valid base64")?;
        if bytes.len() % 4 != 0 {
            bail!("tensor data length {} is not a multiple of 4", bytes.len());
        }
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let expected: usize = self.shape.iter().product();
        if values.len() != expected {
            bail!(
                "tensor shape {:?} needs {} values, got {}",
                self.shape,
                expected,
                values.len()
            );
        }
        ArrayD::from_shape_vec(IxDyn(&self.shape), values)
            .map_err(|e| anyhow!("tensor shape {:?}: {e}", self.shape))
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum BridgeRequest<'a> {
    Load,
    Predict { text: &'a str },
    Synthesize { mel: WireTensor },
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    outputs: Option<std::collections::BTreeMap<String, WireTensor>>,
    #[serde(default)]
    waveform: Option<WireTensor>,
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// How long a call waits for the sidecar while another call is in flight.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// A sidecar process hosting both models, loaded once.
///
/// The sidecar answers one request at a time. A call that cannot get the
/// channel within `lock_timeout` fails instead of parking its thread behind a
/// request that may never finish.
pub struct ModelBridge {
    program: String,
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    lock_timeout: Duration,
}

impl std::fmt::Debug for ModelBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBridge")
            .field("program", &self.program)
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

impl ModelBridge {
    /// Spawn the sidecar from a shell-style command line and wait until it
    /// reports both models loaded.
    pub fn spawn(command_line: &str) -> anyhow::Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("model bridge command is empty"))?
            .to_string();
        let args: Vec<&str> = parts.collect();

        info!("Starting model bridge: {}", command_line);
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to spawn model bridge '{program}'"))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("model bridge stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("model bridge stdout unavailable"))?;

        let bridge = Self {
            program,
            io: Mutex::new(BridgeIo {
                stdin,
                stdout: BufReader::new(stdout),
            }),
            child: Mutex::new(child),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        };
        bridge
            .call(&BridgeRequest::Load)
            .context("model bridge failed to load models")?;
        info!("Model bridge ready");
        Ok(bridge)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn call(&self, request: &BridgeRequest<'_>) -> anyhow::Result<BridgeResponse> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');

        let mut io = self.io.try_lock_for(self.lock_timeout).ok_or_else(|| {
            anyhow!(
                "model bridge busy: no reply to the previous request after {:?}",
                self.lock_timeout
            )
        })?;
        io.stdin
            .write_all(line.as_bytes())
            .context("model bridge closed its input")?;
        io.stdin.flush().context("model bridge closed its input")?;

        let mut reply = String::new();
        let n = io
            .stdout
            .read_line(&mut reply)
            .context("failed to read from model bridge")?;
        if n == 0 {
            bail!("model bridge exited unexpectedly");
        }
        drop(io);

        parse_response(&reply)
    }
}

fn parse_response(reply: &str) -> anyhow::Result<BridgeResponse> {
    let response: BridgeResponse = serde_json::from_str(reply.trim_end())
        .with_context(|| format!("malformed model bridge reply: {}", reply.trim_end()))?;
    if !response.ok {
        bail!(
            "{}",
            response
                .error
                .as_deref()
                .unwrap_or("model bridge reported an unspecified error")
        );
    }
    Ok(response)
}

impl AcousticModel for ModelBridge {
    fn predict(&self, text: &str) -> anyhow::Result<AcousticOutput> {
        let response = self.call(&BridgeRequest::Predict { text })?;
        let outputs = response
            .outputs
            .ok_or_else(|| anyhow!("model bridge predict reply has no 'outputs'"))?;
        outputs
            .into_iter()
            .map(|(slot, tensor)| {
                let array = tensor
                    .into_array()
                    .with_context(|| format!("acoustic output slot '{slot}'"))?;
                Ok::<_, anyhow::Error>((slot, array))
            })
            .collect()
    }
}

impl Vocoder for ModelBridge {
    fn synthesize(&self, mel: ArrayView2<'_, f32>) -> anyhow::Result<Vec<f32>> {
        let wire = WireTensor::from_slice(mel.shape(), mel.iter().copied());
        debug!(shape = ?mel.shape(), "sending spectrogram to vocoder");
        let response = self.call(&BridgeRequest::Synthesize { mel: wire })?;
        let waveform = response
            .waveform
            .ok_or_else(|| anyhow!("model bridge synthesize reply has no 'waveform'"))?
            .into_array()
            .context("vocoder waveform")?;
        if waveform.ndim() != 1 {
            bail!(
                "vocoder returned shape {:?}, expected one dimension",
                waveform.shape()
            );
        }
        Ok(waveform.into_raw_vec_and_offset().0)
    }
}

impl Drop for ModelBridge {
    fn drop(&mut self) {
        let child = self.child.get_mut();
        if let Err(e) = child.kill() {
            warn!("failed to stop model bridge: {e}");
        }
        let _ = child.wait();
    }
}
