// Actuation channel: the exclusive UART link to the rover's ESP32 sub-controller
//
// Wire format (fixed firmware): one JSON object per line
//   {"T":"1","L":<left>,"R":<right>}\n
// T=1 is "set wheel speeds"; L/R are wheel speed set-points.

use std::io::Write;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::BAUD_RATE;
use crate::messages::WheelCommand;

/// Write timeout for the sub-controller link
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Command type discriminator for "set wheel speeds"
const CMD_SET_WHEEL_SPEEDS: &str = "1";

/// Error types for the serial link
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Unavailable(String),

    #[error("Serial communication error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Partial write: {written} of {expected} bytes accepted")]
    PartialWrite { written: usize, expected: usize },

    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Serialize)]
struct SetWheelSpeeds {
    #[serde(rename = "T")]
    kind: &'static str,
    #[serde(rename = "L")]
    left: f32,
    #[serde(rename = "R")]
    right: f32,
}

/// Encode a command as one newline-terminated JSON line
pub fn encode_command(command: &WheelCommand) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(&SetWheelSpeeds {
        kind: CMD_SET_WHEEL_SPEEDS,
        left: command.left,
        right: command.right,
    })?;
    line.push(b'\n');
    Ok(line)
}

/// Exclusive handle to the motor controller link.
///
/// Either open (holding the transport) or closed (holding the reason every
/// send fails). Dropping an open channel sends Stop before closing.
pub struct ActuationChannel {
    name: String,
    port: Option<Box<dyn Write + Send>>,
    closed_reason: String,
}

impl ActuationChannel {
    /// Open the serial device at the firmware's fixed baud rate
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, BAUD_RATE)
    }

    /// Open with custom baudrate
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        info!("Opening serial port {} at {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()
            .map_err(|e| TransportError::Unavailable(describe_open_error(port_name, &e)))?;

        Ok(Self::from_writer(port_name, Box::new(port)))
    }

    /// Wrap an already-open transport
    pub fn from_writer(name: impl Into<String>, port: Box<dyn Write + Send>) -> Self {
        Self {
            name: name.into(),
            port: Some(port),
            closed_reason: String::new(),
        }
    }

    /// A channel that never opened; every send fails with `reason`
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: None,
            closed_reason: reason.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Send one "set wheel speeds" command with a single write
    pub fn send(&mut self, command: WheelCommand) -> Result<()> {
        let Some(port) = self.port.as_mut() else {
            return Err(TransportError::Unavailable(self.closed_reason.clone()));
        };

        let line = encode_command(&command)?;
        let written = port.write(&line)?;
        if written != line.len() {
            return Err(TransportError::PartialWrite {
                written,
                expected: line.len(),
            });
        }
        port.flush()?;

        info!(
            "Command sent via UART: {}",
            String::from_utf8_lossy(&line[..line.len() - 1])
        );
        Ok(())
    }

    /// Close the transport. Closing a closed channel does nothing.
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            self.closed_reason = format!("Serial port {} is closed", self.name);
            info!("Serial port {} closed", self.name);
        }
    }

    /// Stop the robot, then close
    pub fn shutdown(&mut self) {
        if !self.is_open() {
            return;
        }
        info!("Stopping robot before closing {}", self.name);
        if let Err(e) = self.send(WheelCommand::STOP) {
            warn!("Failed to stop robot on shutdown: {}", e);
        }
        self.close();
    }
}

impl Drop for ActuationChannel {
    fn drop(&mut self) {
        // Covers every exit path, including panics
        self.shutdown();
    }
}

/// Human-readable cause for a failed open
fn describe_open_error(port_name: &str, err: &serialport::Error) -> String {
    use serialport::ErrorKind;

    let hint = match err.kind() {
        ErrorKind::NoDevice => "device not found or already in use",
        ErrorKind::Io(std::io::ErrorKind::NotFound) => "device not found",
        ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            "permission denied (is the user in the 'dialout' group?)"
        }
        ErrorKind::Io(std::io::ErrorKind::ResourceBusy) => "port is in use",
        _ => "check the port name and that the UART is enabled",
    };
    format!("Failed to open serial port {}: {} ({})", port_name, err, hint)
}
