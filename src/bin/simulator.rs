use irrisim::state::TelemetryEvent;
use irrisim::{Broker, IrrigationController, SimulatorConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const TCP_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = SimulatorConfig::default();
    let broker = Broker::new(config.broker_address.clone());
    let controller = Arc::new(IrrigationController::start(&config, &broker)?);

    println!("💧 Irrigation Controller Simulator");
    println!("==================================");
    println!("   Device state: ✓ (moisture=100%, pump=OFF, mode=Manual)");
    println!("   Telemetry simulator: ✓ ({}s tick)", config.tick_period.as_secs());
    println!("   Command ingest: ✓");
    println!("🌐 Control surface on TCP port {}", TCP_PORT);

    let shutdown = CancellationToken::new();
    let server_controller = Arc::clone(&controller);
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        if let Err(e) = run_control_server(server_controller, server_shutdown).await {
            error!("control server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    // Stop new ticks and commands first, then tear down the front-end seam.
    shutdown.cancel();
    controller.shutdown().await;
    server.abort();

    println!("💧 Irrigation Controller Simulator stopped");
    Ok(())
}

async fn run_control_server(
    controller: Arc<IrrigationController>,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(("127.0.0.1", TCP_PORT)).await?;
    info!("control server listening on port {}", TCP_PORT);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("front end connected: {}", addr);
                    let client_controller = Arc::clone(&controller);
                    tokio::spawn(async move {
                        if let Err(e) = handle_front_end(stream, client_controller).await {
                            warn!("front end {} error: {}", addr, e);
                        }
                        info!("front end {} disconnected", addr);
                    });
                }
                Err(e) => error!("failed to accept connection: {}", e),
            }
        }
    }
    Ok(())
}

/// Line-oriented control protocol consumed by remote front ends:
/// `STATUS` returns a JSON snapshot, `PUMP ON|OFF` and `MODE Manual|Automatic`
/// publish on the command topics, `WATCH` streams JSON telemetry events.
async fn handle_front_end(
    stream: TcpStream,
    controller: Arc<IrrigationController>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let request = line.trim();
        if request.is_empty() {
            continue;
        }

        if request == "WATCH" {
            return stream_telemetry(&controller, &mut writer).await;
        }

        let reply = handle_request(&controller, request);
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    Ok(())
}

fn handle_request(controller: &IrrigationController, request: &str) -> String {
    let mut parts = request.splitn(2, ' ');
    let verb = parts.next().unwrap_or("");
    let argument = parts.next().unwrap_or("").trim();

    match verb {
        "STATUS" => serde_json::to_string(&controller.snapshot())
            .unwrap_or_else(|e| format!("ERR {}", e)),
        "PUMP" => match argument.parse() {
            Ok(pump) => match controller.issue_pump_command(pump) {
                Ok(()) => "OK".to_string(),
                Err(e) => format!("ERR {}", e),
            },
            Err(_) => "ERR expected ON or OFF".to_string(),
        },
        "MODE" => match argument.parse() {
            Ok(mode) => match controller.issue_mode_command(mode) {
                Ok(()) => "OK".to_string(),
                Err(e) => format!("ERR {}", e),
            },
            Err(_) => "ERR expected Manual or Automatic".to_string(),
        },
        _ => "ERR unknown command".to_string(),
    }
}

async fn stream_telemetry(
    controller: &IrrigationController,
    writer: &mut (impl AsyncWriteExt + Unpin),
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut events = controller.subscribe_telemetry();

    loop {
        match events.recv().await {
            Ok(event) => {
                let json = serde_json::to_string::<TelemetryEvent>(&event)?;
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
            }
            // Lagged receivers just resume from the most recent event.
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
    Ok(())
}
