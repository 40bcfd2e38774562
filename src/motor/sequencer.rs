// Timed-motion sequencer
//
// Turns one motion request into start -> hold -> stop on the actuation
// channel. The channel lock is held for the whole sequence so requests never
// interleave their commands.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use super::channel::{ActuationChannel, TransportError};
use super::kinematics::{InvalidMotion, MotionPlan, plan};
use crate::config::Calibration;
use crate::messages::{MotionRequest, WheelCommand};

/// Outcome category, mapped onto HTTP status codes by the web layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionErrorKind {
    InvalidArgument,
    TransportUnavailable,
    StartFailed,
    StopFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error(transparent)]
    InvalidArgument(#[from] InvalidMotion),

    #[error("Serial port not open: {0}")]
    TransportUnavailable(String),

    #[error("Failed to start: {0}")]
    StartFailed(#[source] TransportError),

    #[error("Failed to stop, robot may still be in motion: {0}")]
    StopFailed(#[source] TransportError),
}

impl MotionError {
    pub fn kind(&self) -> MotionErrorKind {
        match self {
            MotionError::InvalidArgument(_) => MotionErrorKind::InvalidArgument,
            MotionError::TransportUnavailable(_) => MotionErrorKind::TransportUnavailable,
            MotionError::StartFailed(_) => MotionErrorKind::StartFailed,
            MotionError::StopFailed(_) => MotionErrorKind::StopFailed,
        }
    }

    fn start_failed(err: TransportError) -> Self {
        match err {
            TransportError::Unavailable(cause) => MotionError::TransportUnavailable(cause),
            other => MotionError::StartFailed(other),
        }
    }
}

/// A completed request
#[derive(Debug, Clone, PartialEq)]
pub struct MotionReport {
    pub description: String,
    /// Time between the start and stop commands
    pub held: Duration,
    /// The hold was cut short by a stop request
    pub preempted: bool,
}

/// Serializes motion requests onto the actuation channel
pub struct Sequencer {
    channel: Mutex<ActuationChannel>,
    calibration: Calibration,
    preempt: watch::Sender<u64>,
}

impl Sequencer {
    pub fn new(channel: ActuationChannel, calibration: Calibration) -> Self {
        let (preempt, _) = watch::channel(0);
        Self {
            channel: Mutex::new(channel),
            calibration,
            preempt,
        }
    }

    /// Run one request to completion
    pub async fn execute(&self, request: MotionRequest) -> Result<MotionReport, MotionError> {
        // Validation never touches the hardware
        let plan = plan(&request, &self.calibration).inspect_err(|e| {
            warn!("Rejected {}: {}", request, e);
        })?;
        debug!("Planned {}: {:?}", request, plan);

        if request == MotionRequest::Stop {
            // Wake any in-flight hold before queuing behind it
            self.preempt();
        }

        match plan {
            MotionPlan::Timed { start, hold } => self.run_timed(&request, start, hold).await,
            MotionPlan::Immediate(command) => self.run_immediate(&request, command).await,
        }
    }

    async fn run_timed(
        &self,
        request: &MotionRequest,
        start: WheelCommand,
        hold: Duration,
    ) -> Result<MotionReport, MotionError> {
        // Subscribe before queuing: a stop issued while this move waits for
        // the lock, or holds it, ends the hold
        let mut preempt = self.preempt.subscribe();
        let mut channel = self.channel.lock().await;

        if let Err(e) = channel.send(start) {
            error!("Failed to start {}: {}", request, e);
            return Err(MotionError::start_failed(e));
        }
        let mut guard = HoldGuard {
            channel,
            armed: true,
        };

        info!("Holding {} for {:.2} s", request, hold.as_secs_f64());
        let started = Instant::now();
        let preempted = tokio::select! {
            _ = sleep(hold) => false,
            changed = preempt.changed() => changed.is_ok(),
        };
        let held = started.elapsed();

        guard.armed = false;
        if let Err(e) = guard.channel.send(WheelCommand::STOP) {
            error!("Failed to stop after {}: {}", request, e);
            return Err(MotionError::StopFailed(e));
        }

        let description = if preempted {
            info!("{} interrupted by stop after {:.2} s", request, held.as_secs_f64());
            format!(
                "{} interrupted by stop after {:.2} s",
                capitalize(&request.to_string()),
                held.as_secs_f64()
            )
        } else {
            request.describe()
        };

        Ok(MotionReport {
            description,
            held,
            preempted,
        })
    }

    async fn run_immediate(
        &self,
        request: &MotionRequest,
        command: WheelCommand,
    ) -> Result<MotionReport, MotionError> {
        let mut channel = self.channel.lock().await;

        if let Err(e) = channel.send(command) {
            error!("Failed to send {}: {}", request, e);
            return Err(match e {
                TransportError::Unavailable(cause) => MotionError::TransportUnavailable(cause),
                other if command.is_stop() => MotionError::StopFailed(other),
                other => MotionError::StartFailed(other),
            });
        }

        Ok(MotionReport {
            description: request.describe(),
            held: Duration::ZERO,
            preempted: false,
        })
    }

    /// End the hold of every timed move that is running or queued.
    /// Each one still sends its own Stop.
    pub fn preempt(&self) {
        self.preempt.send_modify(|generation| *generation += 1);
    }

    /// Stop the robot and close the channel. Waits for any in-flight
    /// request, after preempting its hold.
    pub async fn shutdown(&self) {
        self.preempt();
        let mut channel = self.channel.lock().await;
        channel.shutdown();
    }
}

/// Sends Stop if a timed move is dropped mid-hold
struct HoldGuard<'a> {
    channel: MutexGuard<'a, ActuationChannel>,
    armed: bool,
}

impl Drop for HoldGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Timed move abandoned during hold, stopping robot");
        if let Err(e) = self.channel.send(WheelCommand::STOP) {
            error!("Failed to stop abandoned move: {}", e);
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
