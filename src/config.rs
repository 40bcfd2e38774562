// Serial link, calibration, HTTP and camera configuration
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

// Serial port for the ESP32 sub-controller (Raspberry Pi UART)
pub const SERIAL_PORT: &str = "/dev/ttyAMA0";
pub const BAUD_RATE: u32 = 115_200;

// The ESP32 resets when the port opens; give it time before the first command
pub const SETTLE_DELAY: Duration = Duration::from_millis(2000);

// HTTP listen address
pub const BIND_ADDR: &str = "0.0.0.0:5000";

// Calibration: measure these on the actual robot and floor surface
pub const LINEAR_CM_PER_SEC: f64 = 10.0; // at NOMINAL_SPEED
pub const TURN_SECS_PER_DEGREE: f64 = 0.01; // at NOMINAL_SPEED
pub const NOMINAL_SPEED: f32 = 0.3;
pub const MAX_SPEED: f32 = 0.5; // firmware accepts -0.5..=0.5

// Camera
pub const CAMERA_COMMAND: &str = "libcamera-still -n -t 1 --width 640 --height 480 -e jpg -o -";
pub const CAMERA_TIMEOUT: Duration = Duration::from_secs(5);
pub const SNAPSHOT_FILE: &str = "snapshot.jpg";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid calibration: {0}")]
    Calibration(String),
}

/// Command line options
#[derive(Debug, Clone, Parser)]
#[command(name = "rover-serial-bridge", version, about = "HTTP to UART bridge for a wheeled rover")]
pub struct Args {
    /// Serial device connected to the motor controller
    #[arg(long, default_value = SERIAL_PORT)]
    pub port: String,

    #[arg(long, default_value_t = BAUD_RATE)]
    pub baud: u32,

    /// Address the HTTP server listens on
    #[arg(long, default_value = BIND_ADDR)]
    pub bind: String,

    /// Delay after opening the serial port, in milliseconds
    #[arg(long, default_value_t = SETTLE_DELAY.as_millis() as u64)]
    pub settle_ms: u64,

    /// Distance covered per second at the nominal speed
    #[arg(long, default_value_t = LINEAR_CM_PER_SEC)]
    pub linear_cm_per_sec: f64,

    /// Seconds of in-place rotation per degree at the nominal speed
    #[arg(long, default_value_t = TURN_SECS_PER_DEGREE)]
    pub turn_secs_per_degree: f64,

    /// Wheel speed used for timed moves and turns
    #[arg(long, default_value_t = NOMINAL_SPEED)]
    pub nominal_speed: f32,

    /// Largest wheel speed magnitude accepted by /drive
    #[arg(long, default_value_t = MAX_SPEED)]
    pub max_speed: f32,

    /// Capture command for /camera; must write a JPEG to stdout
    #[arg(long, default_value = CAMERA_COMMAND)]
    pub camera_command: String,

    #[arg(long, default_value_t = CAMERA_TIMEOUT.as_millis() as u64)]
    pub camera_timeout_ms: u64,

    /// JPEG served by /camera2
    #[arg(long, default_value = SNAPSHOT_FILE)]
    pub snapshot_file: PathBuf,
}

impl Args {
    pub fn calibration(&self) -> Result<Calibration, ConfigError> {
        Calibration::new(
            self.linear_cm_per_sec,
            self.turn_secs_per_degree,
            self.nominal_speed,
            self.max_speed,
        )
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn camera_timeout(&self) -> Duration {
        Duration::from_millis(self.camera_timeout_ms)
    }
}

/// Open-loop calibration constants. Read-only once constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    linear_cm_per_sec: f64,
    turn_secs_per_degree: f64,
    nominal_speed: f32,
    max_speed: f32,
}

impl Calibration {
    pub fn new(
        linear_cm_per_sec: f64,
        turn_secs_per_degree: f64,
        nominal_speed: f32,
        max_speed: f32,
    ) -> Result<Self, ConfigError> {
        if !(linear_cm_per_sec.is_finite() && linear_cm_per_sec > 0.0) {
            return Err(ConfigError::Calibration(format!(
                "linear ratio must be positive, got {} cm/s",
                linear_cm_per_sec
            )));
        }
        if !(turn_secs_per_degree.is_finite() && turn_secs_per_degree > 0.0) {
            return Err(ConfigError::Calibration(format!(
                "turn ratio must be positive, got {} s/deg",
                turn_secs_per_degree
            )));
        }
        if !(max_speed.is_finite() && max_speed > 0.0) {
            return Err(ConfigError::Calibration(format!(
                "max speed must be positive, got {}",
                max_speed
            )));
        }
        if !(nominal_speed.is_finite() && nominal_speed > 0.0 && nominal_speed <= max_speed) {
            return Err(ConfigError::Calibration(format!(
                "nominal speed must be in (0, {}], got {}",
                max_speed, nominal_speed
            )));
        }

        Ok(Self {
            linear_cm_per_sec,
            turn_secs_per_degree,
            nominal_speed,
            max_speed,
        })
    }

    pub fn linear_cm_per_sec(&self) -> f64 {
        self.linear_cm_per_sec
    }

    pub fn turn_secs_per_degree(&self) -> f64 {
        self.turn_secs_per_degree
    }

    pub fn nominal_speed(&self) -> f32 {
        self.nominal_speed
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            linear_cm_per_sec: LINEAR_CM_PER_SEC,
            turn_secs_per_degree: TURN_SECS_PER_DEGREE,
            nominal_speed: NOMINAL_SPEED,
            max_speed: MAX_SPEED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let args = Args::parse_from(["rover-serial-bridge"]);
        assert_eq!(args.port, SERIAL_PORT);
        assert_eq!(args.baud, BAUD_RATE);
        assert_eq!(BAUD_RATE, 115_200);
        assert_eq!(args.settle_delay(), SETTLE_DELAY);
        assert_eq!(args.calibration().unwrap(), Calibration::default());
    }

    #[test]
    fn test_overrides_parse() {
        let args = Args::parse_from([
            "rover-serial-bridge",
            "--port",
            "/dev/ttyS0",
            "--linear-cm-per-sec",
            "12.5",
            "--settle-ms",
            "0",
        ]);
        assert_eq!(args.port, "/dev/ttyS0");
        assert_eq!(args.settle_delay(), Duration::ZERO);
        assert_eq!(args.calibration().unwrap().linear_cm_per_sec(), 12.5);
    }

    #[test]
    fn test_rejects_bad_calibration() {
        assert!(Calibration::new(0.0, 0.01, 0.3, 0.5).is_err());
        assert!(Calibration::new(10.0, -1.0, 0.3, 0.5).is_err());
        assert!(Calibration::new(10.0, 0.01, 0.6, 0.5).is_err());
        assert!(Calibration::new(f64::NAN, 0.01, 0.3, 0.5).is_err());
        assert!(Calibration::new(10.0, 0.01, 0.3, 0.5).is_ok());
    }
}
