//! MFA Bridge CLI
//!
//! Command-line bridge between a train simulator and the physical MFA
//! indicator panel. It uses the mfa-bridge library and adds:
//! - Configuration and profile file loading (TOML)
//! - Serial port ownership and autodetection
//! - The source thread / resolution loop wiring
//! - Reconnect with backoff and fail-safe shutdown

use anyhow::{bail, Context, Result};
use clap::Parser;
use mfa_bridge::source::http::{HttpConfig, HttpSource};
use mfa_bridge::source::stream::{StreamConfig, StreamSource};
use mfa_bridge::{Profile, SignalSource};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod bridge;
mod config;
mod serial;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 31270;
const DEFAULT_STREAM_PORT: u16 = 1436;

/// Telemetry transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum SourceKind {
    /// Polling HTTP API
    Http,
    /// Framed binary TCP stream
    Stream,
}

/// MFA Bridge - drive a physical MFA panel from simulator telemetry
#[derive(Parser, Debug)]
#[command(name = "mfa-bridge")]
#[command(about = "Bridge simulator cab telemetry to the MFA LED panel", long_about = None)]
#[command(version)]
struct Args {
    /// Telemetry source
    #[arg(long, value_enum, default_value_t = SourceKind::Http)]
    source: SourceKind,

    /// Simulator host
    #[arg(long)]
    host: Option<String>,

    /// Simulator port (default: 31270 http, 1436 stream)
    #[arg(long)]
    port: Option<u16>,

    /// API key for the HTTP source (default: env or the simulator's key file)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Mapping profile file; skips vehicle autodetection
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serial device of the panel (default: autodetect by USB id)
    #[arg(long, value_name = "PORT")]
    serial_port: Option<String>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// List built-in profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    log::info!("MFA Bridge CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using bridge library v{}", mfa_bridge::VERSION);

    if args.list_ports {
        return list_ports_mode();
    }
    if args.list_profiles {
        return list_profiles_mode();
    }
    bridge_mode(&args)
}

/// Print every serial port with its USB identity
fn list_ports_mode() -> Result<()> {
    let ports = serial::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for (name, description) in ports {
        println!("{:<20} {}", name, description);
    }
    if let Some(detected) = serial::find_panel_port() {
        println!("\nAutodetected panel: {}", detected);
    }
    Ok(())
}

/// Print the built-in profile table
fn list_profiles_mode() -> Result<()> {
    for profile in mfa_bridge::profiles::builtin_profiles() {
        println!(
            "{:<24} {:>3} mappings  [{}]",
            profile.name,
            profile.mappings.len(),
            profile.vehicle_classes.join(", ")
        );
        if !profile.description.is_empty() {
            println!("{:<24} {}", "", profile.description);
        }
    }
    Ok(())
}

/// The main mode: connect, bridge, reconnect until Ctrl-C
fn bridge_mode(args: &Args) -> Result<()> {
    let app_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::AppConfig::default(),
    };

    let host = args
        .host
        .clone()
        .or(app_config.connection.host.clone())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = args.port.or(app_config.connection.port).unwrap_or(match args.source {
        SourceKind::Http => DEFAULT_HTTP_PORT,
        SourceKind::Stream => DEFAULT_STREAM_PORT,
    });

    // Profiles: built-ins, then config files, then the explicit one
    let mut profiles = mfa_bridge::profiles::builtin_profiles();
    for path in &app_config.profiles {
        profiles.push(config::load_profile(path)?);
    }
    let explicit_profile = args
        .profile
        .as_ref()
        .map(|path| config::load_profile(path))
        .transpose()?;

    // The panel port is independent of the telemetry source and opened
    // exactly once; the bridge owns it for the whole run
    let serial_name = args
        .serial_port
        .clone()
        .or(app_config.connection.serial_port.clone())
        .or_else(serial::find_panel_port);
    let Some(serial_name) = serial_name else {
        bail!("No panel found: no Arduino-class serial device, and --serial-port not given");
    };
    let mut panel = serial::PanelPort::open(&serial_name)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("Shutdown requested");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let api_key = match args.source {
        SourceKind::Http => {
            let key = config::find_api_key(
                args.api_key
                    .as_deref()
                    .or(app_config.connection.api_key.as_deref()),
            );
            match key {
                Some(k) => k,
                None => bail!(
                    "No API key found. Pass --api-key, set MFA_BRIDGE_API_KEY, \
                     or start the simulator once with its HTTP API enabled."
                ),
            }
        }
        SourceKind::Stream => String::new(),
    };

    // Connect / run / reconnect until shutdown
    let mut attempt: u32 = 0;
    while !shutdown.load(Ordering::SeqCst) {
        let session = connect_session(
            args.source,
            &host,
            port,
            &api_key,
            &profiles,
            explicit_profile.as_ref(),
        );
        let (source, profile) = match session {
            Ok(pair) => pair,
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }
                attempt += 1;
                let backoff = Duration::from_secs(u64::from(attempt.min(5)) * 2);
                log::warn!("Connect failed ({:#}), retrying in {:?}", e, backoff);
                interruptible_sleep(backoff, &shutdown);
                continue;
            }
        };
        attempt = 0;

        match bridge::run(source, &profile, &mut panel, &shutdown)? {
            bridge::SessionEnd::Shutdown => break,
            bridge::SessionEnd::SourceLost(e) => {
                log::warn!("Source lost ({}), reconnecting", e);
                interruptible_sleep(Duration::from_secs(2), &shutdown);
            }
        }
    }

    log::info!("Bridge stopped, panel dark");
    Ok(())
}

/// Build a source and pick the profile for one session
fn connect_session(
    kind: SourceKind,
    host: &str,
    port: u16,
    api_key: &str,
    profiles: &[Profile],
    explicit: Option<&Profile>,
) -> Result<(Box<dyn SignalSource + Send>, Profile)> {
    match kind {
        SourceKind::Http => {
            let http_config = HttpConfig::new(host, port, api_key);

            // First contact without endpoints: identify the vehicle
            let probe = HttpSource::connect(&http_config, Vec::new())?;
            let profile = match explicit {
                Some(p) => p.clone(),
                None => {
                    let vehicle = probe.detect_vehicle()?;
                    let Some(vehicle) = vehicle else {
                        bail!("Simulator reachable but no vehicle is being driven yet")
                    };
                    match mfa_bridge::mapping::select_profile(profiles, &vehicle) {
                        Some(p) => p.clone(),
                        None => bail!(
                            "No profile for vehicle '{}'; pass --profile or add one to the config",
                            vehicle
                        ),
                    }
                }
            };

            let endpoints = profile.referenced_signals();
            let source = HttpSource::connect(&http_config, endpoints)?;
            Ok((Box::new(source), profile))
        }
        SourceKind::Stream => {
            let profile = explicit
                .cloned()
                .unwrap_or_else(mfa_bridge::profiles::stream_profile);
            let source = StreamSource::connect(&StreamConfig::new(host, port))?;
            Ok((Box::new(source), profile))
        }
    }
}

/// Whether a session-connect failure should be retried
fn is_retryable(e: &anyhow::Error) -> bool {
    match e.downcast_ref::<mfa_bridge::BridgeError>() {
        Some(bridge_err) => bridge_err.is_retryable(),
        // "no vehicle yet" and similar soft failures are retryable;
        // config/profile mistakes surfaced earlier are not reached here
        None => true,
    }
}

fn interruptible_sleep(total: Duration, shutdown: &AtomicBool) {
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;
    while slept < total && !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(step);
        slept += step;
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
