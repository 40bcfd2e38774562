// Snapshot camera: one JPEG frame per request, Base64-encoded for the HTTP layer

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::process::Command;
use tracing::{debug, info};

/// JPEG start-of-image marker
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("Camera command is empty")]
    EmptyCommand,

    #[error("Could not run camera command '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Camera command exited with {status}: {stderr}")]
    CaptureFailed { status: String, stderr: String },

    #[error("Camera did not deliver a frame within {0:?}")]
    Timeout(Duration),

    #[error("Could not read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Frame is not a JPEG image ({0} bytes)")]
    NotJpeg(usize),
}

/// Where a frame comes from
#[derive(Debug, Clone)]
pub enum CameraSource {
    /// Run a capture program that writes a JPEG to stdout
    Command { argv: Vec<String>, timeout: Duration },
    /// Read a JPEG that something else keeps up to date
    File(PathBuf),
}

impl CameraSource {
    /// Build a command source from a whitespace-separated command line
    pub fn command(command_line: &str, timeout: Duration) -> Self {
        CameraSource::Command {
            argv: command_line.split_whitespace().map(str::to_string).collect(),
            timeout,
        }
    }

    /// Grab one JPEG frame
    pub async fn capture(&self) -> Result<Vec<u8>, CameraError> {
        let frame = match self {
            CameraSource::Command { argv, timeout } => run_capture(argv, *timeout).await?,
            CameraSource::File(path) => {
                tokio::fs::read(path).await.map_err(|source| CameraError::Read {
                    path: path.clone(),
                    source,
                })?
            }
        };

        if !frame.starts_with(&JPEG_SOI) {
            return Err(CameraError::NotJpeg(frame.len()));
        }
        debug!("Captured {} byte frame", frame.len());
        Ok(frame)
    }

    /// Grab one frame and return it as standard Base64
    pub async fn capture_base64(&self) -> Result<String, CameraError> {
        let frame = self.capture().await?;
        Ok(STANDARD.encode(frame))
    }
}

async fn run_capture(argv: &[String], timeout: Duration) -> Result<Vec<u8>, CameraError> {
    let (program, args) = argv.split_first().ok_or(CameraError::EmptyCommand)?;
    info!("Capturing frame with {}", program);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CameraError::Spawn {
            program: program.clone(),
            source,
        })?;

    // On timeout the future is dropped and kill_on_drop reaps the child
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| CameraError::Timeout(timeout))?
        .map_err(|source| CameraError::Spawn {
            program: program.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(CameraError::CaptureFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}
