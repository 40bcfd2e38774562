// Message types flowing from the HTTP layer to the motor controller

use std::fmt;

/// A motion request produced by the HTTP layer.
/// Distances are in centimeters, angles in degrees, speeds in wheel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionRequest {
    Forward(f64),
    Backward(f64),
    TurnLeft(f64),
    TurnRight(f64),
    DirectDrive { left: f32, right: f32 },
    Stop,
}

impl MotionRequest {
    /// Past-tense summary used in the success message
    pub fn describe(&self) -> String {
        match *self {
            MotionRequest::Forward(cm) => format!("Moved forward {} cm", cm),
            MotionRequest::Backward(cm) => format!("Moved backward {} cm", cm),
            MotionRequest::TurnLeft(deg) => format!("Turned left {} degrees", deg),
            MotionRequest::TurnRight(deg) => format!("Turned right {} degrees", deg),
            MotionRequest::DirectDrive { left, right } => {
                format!("Driving with L={}, R={}", left, right)
            }
            MotionRequest::Stop => "Robot stopped".to_string(),
        }
    }
}

impl fmt::Display for MotionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MotionRequest::Forward(cm) => write!(f, "forward {} cm", cm),
            MotionRequest::Backward(cm) => write!(f, "backward {} cm", cm),
            MotionRequest::TurnLeft(deg) => write!(f, "left {} deg", deg),
            MotionRequest::TurnRight(deg) => write!(f, "right {} deg", deg),
            MotionRequest::DirectDrive { left, right } => write!(f, "drive L={} R={}", left, right),
            MotionRequest::Stop => write!(f, "stop"),
        }
    }
}

/// Wheel speed set-points for one "set wheel speeds" command
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelCommand {
    pub left: f32,
    pub right: f32,
}

impl WheelCommand {
    pub const STOP: WheelCommand = WheelCommand {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    pub fn is_stop(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

impl fmt::Display for WheelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L={}, R={}", self.left, self.right)
    }
}
