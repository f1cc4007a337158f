use clap::{App, AppSettings, Arg, SubCommand};
use colored::*;
use irrisim::state::{Snapshot, TelemetryEvent};
use irrisim::{Mode, PumpState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("irrisim")
        .version("0.1.0")
        .author("Irrigation Systems Engineering Team")
        .about("💧 Irrigation Controller Simulator - remote control surface")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator control port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("status")
                .about("📊 Show current moisture, pump state, and operating mode"),
        )
        .subcommand(
            SubCommand::with_name("pump")
                .about("🚰 Manual pump override (applies in any mode)")
                .arg(
                    Arg::with_name("state")
                        .help("Pump state")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("mode")
                .about("🔁 Switch between manual and automatic operation")
                .arg(
                    Arg::with_name("mode")
                        .help("Operating mode")
                        .required(true)
                        .possible_values(&["manual", "automatic"]),
                ),
        )
        .subcommand(SubCommand::with_name("watch").about("📡 Stream live telemetry readings"))
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").unwrap_or(DEFAULT_PORT);
    let address = format!("{}:{}", host, port);

    match matches.subcommand() {
        ("status", _) => {
            let reply = request(&address, "STATUS").await?;
            print_status(&reply);
        }
        ("pump", Some(sub)) => {
            let pump = match sub.value_of("state") {
                Some("on") => PumpState::On,
                _ => PumpState::Off,
            };
            let reply = request(&address, &format!("PUMP {}", pump.as_payload())).await?;
            print_ack(&reply, &format!("pump {}", pump));
        }
        ("mode", Some(sub)) => {
            let mode = match sub.value_of("mode") {
                Some("automatic") => Mode::Automatic,
                _ => Mode::Manual,
            };
            let reply = request(&address, &format!("MODE {}", mode.as_payload())).await?;
            print_ack(&reply, &format!("mode {}", mode));
        }
        ("watch", _) => watch(&address).await?,
        _ => unreachable!("subcommand required by clap settings"),
    }

    Ok(())
}

async fn request(address: &str, line: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stream = TcpStream::connect(address).await?;
    let (reader, mut writer) = stream.into_split();
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    let mut reply = String::new();
    BufReader::new(reader).read_line(&mut reply).await?;
    Ok(reply.trim().to_string())
}

async fn watch(address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stream = TcpStream::connect(address).await?;
    let (reader, mut writer) = stream.into_split();
    writer.write_all(b"WATCH\n").await?;

    println!("{}", "📡 Streaming telemetry (Ctrl-C to stop)".bold());
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        match serde_json::from_str::<TelemetryEvent>(&line) {
            Ok(event) => println!(
                "  moisture {} (was {}%)  pump {}",
                moisture_label(event.moisture),
                event.previous,
                pump_label(event.pump),
            ),
            Err(_) => println!("  {}", line),
        }
    }
    Ok(())
}

fn print_status(reply: &str) {
    match serde_json::from_str::<Snapshot>(reply) {
        Ok(snapshot) => {
            println!("{}", "💧 Irrigation Controller Status".bold());
            println!("  Soil moisture : {}", moisture_label(snapshot.moisture));
            println!("  Pump state    : {}", pump_label(snapshot.pump));
            println!("  Mode          : {}", snapshot.mode.to_string().cyan());
        }
        Err(_) => println!("{} {}", "error:".red().bold(), reply),
    }
}

fn print_ack(reply: &str, action: &str) {
    if reply == "OK" {
        println!("{} {}", "✓".green().bold(), action);
    } else {
        println!("{} {}", "✗".red().bold(), reply);
    }
}

fn moisture_label(moisture: u8) -> ColoredString {
    let text = format!("{}%", moisture);
    if moisture <= 30 {
        text.red()
    } else if moisture <= 40 {
        text.yellow()
    } else {
        text.green()
    }
}

fn pump_label(pump: PumpState) -> ColoredString {
    match pump {
        PumpState::On => "ON".green().bold(),
        PumpState::Off => "OFF".red(),
    }
}
