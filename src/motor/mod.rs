// Motor control for the differential-drive rover
//
// Provides:
// - UART actuation channel speaking the sub-controller's JSON line protocol
// - Open-loop motion planning from calibrated constants
// - Timed-motion sequencer (start -> hold -> stop, one request at a time)

pub mod channel;
pub mod kinematics;
mod sequencer;

pub use channel::{ActuationChannel, TransportError};
pub use kinematics::{InvalidMotion, MotionPlan, plan};
pub use sequencer::{MotionError, MotionErrorKind, MotionReport, Sequencer};
