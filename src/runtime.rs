// Process lifecycle: open the serial link, serve HTTP, stop the robot on exit
//
// The serial channel is opened once. If it cannot be opened the server still
// starts (camera routes keep working) and every motion request fails fast
// until the operator fixes the device and restarts.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::time::sleep;
use tracing::{error, info};

use crate::camera::CameraSource;
use crate::config::Args;
use crate::motor::{ActuationChannel, Sequencer};
use crate::web::api::{AppState, AppStateInner, create_router};

pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let calibration = args.calibration()?;
    info!(
        "Calibration: {} cm/s, {} s/deg at speed {} (max {})",
        calibration.linear_cm_per_sec(),
        calibration.turn_secs_per_degree(),
        calibration.nominal_speed(),
        calibration.max_speed()
    );

    let channel = match ActuationChannel::open_with_baudrate(&args.port, args.baud) {
        Ok(channel) => {
            info!("Serial port {} opened successfully", args.port);
            // Let the sub-controller finish booting
            sleep(args.settle_delay()).await;
            channel
        }
        Err(e) => {
            error!("{}", e);
            error!("Motion requests will fail until the serial port is fixed and the server restarted");
            ActuationChannel::unavailable(&args.port, e.to_string())
        }
    };

    let state = Arc::new(AppStateInner {
        sequencer: Sequencer::new(channel, calibration),
        camera: CameraSource::command(&args.camera_command, args.camera_timeout()),
        snapshot: CameraSource::File(args.snapshot_file.clone()),
    });

    let listener = TcpListener::bind(&args.bind).await?;
    info!("Rover serial bridge listening on {}", listener.local_addr()?);

    serve_until(listener, state, shutdown_signal()).await?;
    Ok(())
}

/// Serve HTTP until `signal` resolves, then stop the robot and close the link.
///
/// The signal preempts any hold before the server drains open requests, so a
/// timed move in flight stops right away instead of running out its hold.
pub async fn serve_until<F>(listener: TcpListener, state: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let preempt_state = state.clone();
    let served = axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(async move {
            signal.await;
            info!("Shutdown requested, stopping any timed move");
            preempt_state.sequencer.preempt();
        })
        .await;

    // Runs on both clean and failed server exits
    info!("Shutting down");
    state.sequencer.shutdown().await;

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use crate::config::Calibration;

    #[derive(Clone, Default)]
    struct RecordingPort {
        sent: Arc<Mutex<Vec<(Instant, String)>>>,
    }

    impl Write for RecordingPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let line = String::from_utf8_lossy(buf).trim_end().to_string();
            self.sent.lock().unwrap().push((Instant::now(), line));
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl RecordingPort {
        fn sent(&self) -> Vec<(Instant, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    const STOP: &str = r#"{"T":"1","L":0.0,"R":0.0}"#;

    #[tokio::test]
    async fn test_shutdown_signal_stops_timed_move_promptly() {
        let port = RecordingPort::default();
        let channel = ActuationChannel::from_writer("recording", Box::new(port.clone()));
        let state = Arc::new(AppStateInner {
            sequencer: Sequencer::new(channel, Calibration::new(10.0, 0.01, 0.3, 0.5).unwrap()),
            camera: CameraSource::command("true", Duration::from_secs(1)),
            snapshot: CameraSource::File("/nonexistent/snapshot.jpg".into()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (signal_tx, signal_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_until(listener, state, async move {
            let _ = signal_rx.await;
        }));

        // 30 cm at 10 cm/s holds for 3 s
        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"POST /forward/30 HTTP/1.1\r\nHost: rover\r\nConnection: close\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            let mut response = Vec::new();
            let _ = stream.read_to_end(&mut response).await;
            String::from_utf8_lossy(&response).to_string()
        });

        while port.sent().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let signalled = Instant::now();
        signal_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("server did not shut down promptly")
            .unwrap()
            .unwrap();

        let sent = port.sent();
        let lines: Vec<&str> = sent.iter().map(|(_, line)| line.as_str()).collect();
        assert_eq!(lines, vec![r#"{"T":"1","L":0.3,"R":0.3}"#, STOP, STOP]);
        assert!(sent[1].0.duration_since(signalled) < Duration::from_millis(500));

        let response = client.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("interrupted by stop"));
    }
}
