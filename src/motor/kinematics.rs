// Open-loop motion planning for the differential-drive rover
// Converts a motion request into a wheel command and a hold duration.

use std::time::Duration;

use crate::config::Calibration;
use crate::messages::{MotionRequest, WheelCommand};

/// What the sequencer has to do for one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionPlan {
    /// Send `start`, hold for `hold`, then send Stop
    Timed { start: WheelCommand, hold: Duration },
    /// Send a single command and return
    Immediate(WheelCommand),
}

/// Reasons a request is rejected before touching the hardware
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidMotion {
    #[error("Distance must be positive, got {0} cm")]
    NonPositiveDistance(f64),

    #[error("Angle must not be negative, got {0} degrees")]
    NegativeAngle(f64),

    #[error("Wheel speed {speed} is outside the safe range -{max}..={max}")]
    SpeedOutOfRange { speed: f32, max: f32 },

    #[error("Move of {0:.1} s is too long to schedule")]
    HoldTooLong(f64),
}

/// Plan a request against the calibration
///
/// Distance 0 is rejected for straight moves while angle 0 is accepted for
/// turns (start immediately followed by stop).
pub fn plan(request: &MotionRequest, calibration: &Calibration) -> Result<MotionPlan, InvalidMotion> {
    let nominal = calibration.nominal_speed();

    match *request {
        MotionRequest::Forward(cm) | MotionRequest::Backward(cm) => {
            // NaN fails this comparison too
            if !(cm > 0.0) {
                return Err(InvalidMotion::NonPositiveDistance(cm));
            }
            let hold = hold_for(cm / calibration.linear_cm_per_sec())?;
            let speed = if matches!(request, MotionRequest::Forward(_)) {
                nominal
            } else {
                -nominal
            };
            Ok(MotionPlan::Timed {
                start: WheelCommand::new(speed, speed),
                hold,
            })
        }
        MotionRequest::TurnLeft(deg) | MotionRequest::TurnRight(deg) => {
            if !(deg >= 0.0) {
                return Err(InvalidMotion::NegativeAngle(deg));
            }
            let hold = hold_for(deg * calibration.turn_secs_per_degree())?;
            // In-place rotation: wheels spin in opposite directions
            let start = if matches!(request, MotionRequest::TurnLeft(_)) {
                WheelCommand::new(-nominal, nominal)
            } else {
                WheelCommand::new(nominal, -nominal)
            };
            Ok(MotionPlan::Timed { start, hold })
        }
        MotionRequest::DirectDrive { left, right } => {
            let max = calibration.max_speed();
            for speed in [left, right] {
                if !(speed.abs() <= max) {
                    return Err(InvalidMotion::SpeedOutOfRange { speed, max });
                }
            }
            Ok(MotionPlan::Immediate(WheelCommand::new(left, right)))
        }
        MotionRequest::Stop => Ok(MotionPlan::Immediate(WheelCommand::STOP)),
    }
}

fn hold_for(secs: f64) -> Result<Duration, InvalidMotion> {
    Duration::try_from_secs_f64(secs).map_err(|_| InvalidMotion::HoldTooLong(secs))
}
