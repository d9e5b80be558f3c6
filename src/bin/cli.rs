//! Makcu CLI - Command-line interface
//!
//! Find the controller, watch its buttons, and send moves and clicks.

use clap::{Parser, Subcommand, ValueEnum};
use makcu_core::cli::{parse_report_bytes, CliResult, ExitCodes};
use makcu_core::config::{self, AppConfig};
use makcu_core::core::discovery::{PortEnumerator, SystemPorts};
use makcu_core::core::logger::{generate_log_filename, LogFormat, WireLog, WireLogger};
use makcu_core::{ButtonEvent, MemoryChannel, MemoryProbe, Session, SessionEvent, StopReason};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// CLI output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format for scripting
    Json,
}

/// Makcu CLI
#[derive(Parser, Debug)]
#[command(
    name = "makcu",
    version,
    about = "Drive a MAKCU USB-serial input controller",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (defaults to the per-user config.toml)
    #[arg(short, long, env = "MAKCU_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Serial port; skips discovery
    #[arg(short, long, env = "MAKCU_PORT", global = true)]
    port: Option<String>,

    /// Write a wire trace to this file
    #[arg(long, global = true)]
    wire_log: Option<PathBuf>,

    /// Write a timestamped wire trace into the data directory
    #[arg(long, global = true)]
    trace: bool,

    /// Wire trace format (text, hex, jsonl)
    #[arg(long, global = true)]
    wire_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports with their hardware ids
    ListPorts,

    /// Print the controller's port path
    Find,

    /// Print button edges until interrupted
    Monitor {
        /// Stop after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Decode these hex report bytes over an in-memory line instead of hardware
        #[arg(long, value_name = "HEX")]
        simulate: Option<String>,
    },

    /// Relative pointer move
    Move {
        /// Horizontal delta
        #[arg(allow_hyphen_values = true)]
        dx: f64,

        /// Vertical delta
        #[arg(allow_hyphen_values = true)]
        dy: f64,
    },

    /// Primary button click
    Click,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the default config file path
    Path,
    /// Write the default configuration to the config file
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match run(&cli).await {
        Ok(result) => result,
        Err(e) => CliResult::error(ExitCodes::ERROR, format!("{e:#}")),
    };

    match &result {
        CliResult::Success(Some(msg)) if !cli.quiet => println!("{msg}"),
        CliResult::Error(code, msg) => {
            eprintln!("Error: {msg}");
            tracing::debug!("Exiting with code {}", code);
        }
        CliResult::Success(_) => {}
    }
    result.to_exit_code()
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: &Cli) -> anyhow::Result<CliResult> {
    let mut app = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(port) = &cli.port {
        app.device.port = Some(port.clone());
    }
    if let Some(path) = &cli.wire_log {
        app.logging.wire_log = Some(path.clone());
    }
    if let Some(format) = cli.wire_format {
        app.logging.format = format;
    }
    if cli.trace && app.logging.wire_log.is_none() {
        let dir = config::log_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine log directory"))?;
        std::fs::create_dir_all(&dir)?;
        app.logging.wire_log = Some(dir.join(generate_log_filename("wire", app.logging.format)));
    }

    match &cli.command {
        Commands::ListPorts => list_ports(cli, &app),
        Commands::Find => find(cli, &app),
        Commands::Monitor { timeout, simulate } => {
            monitor(cli, &app, *timeout, simulate.as_deref()).await
        }
        Commands::Move { dx, dy } => {
            #[allow(clippy::cast_possible_truncation)]
            let (dx, dy) = (*dx as i32, *dy as i32);
            with_session(&app, |session| session.move_relative(dx, dy)).await
        }
        Commands::Click => with_session(&app, Session::click).await,
        Commands::Config { action } => config_action(cli, &app, action),
    }
}

fn list_ports(cli: &Cli, app: &AppConfig) -> anyhow::Result<CliResult> {
    let ports = SystemPorts.ports()?;

    if ports.is_empty() {
        return Ok(CliResult::success_with_message("No serial ports found."));
    }

    match cli.format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = ports
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "path": p.path,
                        "hardware_id": p.hardware_id,
                        "controller": p.matches(&app.device.signature),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            for port in &ports {
                let mark = if port.matches(&app.device.signature) { '*' } else { ' ' };
                println!("{} {:<20} {}", mark, port.path, port.hardware_id);
            }
        }
    }
    Ok(CliResult::success())
}

fn find(cli: &Cli, app: &AppConfig) -> anyhow::Result<CliResult> {
    match makcu_core::core::discovery::resolve(&SystemPorts, &app.device.signature) {
        Ok(path) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "path": path }));
                Ok(CliResult::success())
            } else {
                Ok(CliResult::success_with_message(path))
            }
        }
        Err(e) => Ok(CliResult::from(e)),
    }
}

fn open_wire_log(app: &AppConfig) -> anyhow::Result<Option<WireLog>> {
    match &app.logging.wire_log {
        Some(path) => Ok(Some(WireLogger::shared(path, app.logging.format)?)),
        None => Ok(None),
    }
}

async fn open_session(app: &AppConfig) -> anyhow::Result<Result<Session, CliResult>> {
    let wire_log = open_wire_log(app)?;
    match Session::open_with(&SystemPorts, app.session_config(), wire_log).await {
        Ok(session) => Ok(Ok(session)),
        Err(e) => Ok(Err(CliResult::from(e))),
    }
}

async fn with_session<F>(app: &AppConfig, action: F) -> anyhow::Result<CliResult>
where
    F: FnOnce(&Session),
{
    let session = match open_session(app).await? {
        Ok(session) => session,
        Err(result) => return Ok(result),
    };

    action(&session);
    let connected = session.is_connected();
    session.close().await;

    if connected {
        Ok(CliResult::success())
    } else {
        Ok(CliResult::error(
            ExitCodes::CONNECTION_FAILED,
            "Controller went away while sending",
        ))
    }
}

async fn monitor(
    cli: &Cli,
    app: &AppConfig,
    timeout: Option<u64>,
    simulate: Option<&str>,
) -> anyhow::Result<CliResult> {
    match simulate {
        Some(hex_bytes) => {
            let bytes = match parse_report_bytes(hex_bytes) {
                Ok(bytes) => bytes,
                Err(result) => return Ok(result),
            };
            let config = app.session_config();
            let (channel, probe) = MemoryChannel::new(config.bootstrap_baud);
            let session =
                Session::establish_with_log(Box::new(channel), config, open_wire_log(app)?)
                    .await?;
            run_monitor(cli, session, timeout, Some((probe, bytes))).await
        }
        None => match open_session(app).await? {
            Ok(session) => run_monitor(cli, session, timeout, None).await,
            Err(result) => Ok(result),
        },
    }
}

async fn run_monitor(
    cli: &Cli,
    session: Session,
    timeout: Option<u64>,
    simulated: Option<(MemoryProbe, Vec<u8>)>,
) -> anyhow::Result<CliResult> {
    let mut rx = session.subscribe();
    if let Some((probe, bytes)) = &simulated {
        probe.push(bytes);
    }
    if !cli.quiet {
        eprintln!("Monitoring {} (Ctrl+C to stop)", session.connection_info());
    }

    let deadline = async {
        match timeout {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let drained = async {
        match &simulated {
            Some((_, bytes)) => {
                let total = bytes.len() as u64;
                loop {
                    let stats = session.stats();
                    if stats.frames_accepted + stats.frames_rejected >= total {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(drained);

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break CliResult::error(ExitCodes::CANCELLED, "Interrupted"),
            () = &mut deadline => break CliResult::success(),
            () = &mut drained => {
                // every frame is decoded, so its edges are already queued
                while let Ok(event) = rx.try_recv() {
                    if let SessionEvent::Button(edge) = event {
                        print_edge(cli, &edge)?;
                    }
                }
                break CliResult::success();
            }
            event = rx.recv() => match event {
                Ok(SessionEvent::Button(edge)) => print_edge(cli, &edge)?,
                Ok(SessionEvent::ListenerStopped(StopReason::ReadError(msg))) => {
                    break CliResult::error(ExitCodes::CHANNEL_LOST, msg);
                }
                Ok(
                    SessionEvent::ListenerStopped(StopReason::Closed | StopReason::Disconnected)
                    | SessionEvent::Disconnected,
                ) => {
                    break CliResult::error(ExitCodes::CONNECTION_FAILED, "Controller disconnected");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Dropped {} button events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break CliResult::success(),
            },
        }
    };

    let stats = session.stats();
    tracing::info!(
        "Frames accepted {}, rejected {}",
        stats.frames_accepted,
        stats.frames_rejected
    );
    session.close().await;
    Ok(result)
}

fn print_edge(cli: &Cli, edge: &ButtonEvent) -> anyhow::Result<()> {
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(edge)?),
        OutputFormat::Text => println!("{edge}"),
    }
    Ok(())
}

fn config_action(cli: &Cli, app: &AppConfig, action: &ConfigAction) -> anyhow::Result<CliResult> {
    match action {
        ConfigAction::Show => {
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(app)?),
                OutputFormat::Text => print!("{}", toml::to_string_pretty(app)?),
            }
            Ok(CliResult::success())
        }
        ConfigAction::Path => match cli.config.clone().or_else(config::config_file) {
            Some(path) => Ok(CliResult::success_with_message(path.display().to_string())),
            None => Ok(CliResult::error(
                ExitCodes::CONFIG_ERROR,
                "Could not determine config directory",
            )),
        },
        ConfigAction::Init => {
            let Some(path) = cli.config.clone().or_else(config::config_file) else {
                return Ok(CliResult::error(
                    ExitCodes::CONFIG_ERROR,
                    "Could not determine config directory",
                ));
            };
            if path.exists() {
                return Ok(CliResult::error(
                    ExitCodes::CONFIG_ERROR,
                    format!("{} already exists", path.display()),
                ));
            }
            AppConfig::default().save_to(&path)?;
            Ok(CliResult::success_with_message(format!(
                "Wrote {}",
                path.display()
            )))
        }
    }
}
