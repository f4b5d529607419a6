use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use portlink_transport::{LinkStream, SerialConfig, SerialLink, UnixDomainSocket, DEFAULT_BAUD_RATE};

use crate::exit::{transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod ports;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Emulate a device: accept frames, echo payload bytes, print port state.
    Serve(ServeArgs),
    /// Apply one frame to a device and verify its echo.
    Send(SendArgs),
    /// Run a byte stream through a receiver offline and show every transition.
    Decode(DecodeArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where the link lives: a Unix socket path, or a serial device with `--serial`.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Socket path, or serial device when --serial is given.
    pub path: String,
    /// Treat PATH as a serial device (e.g. /dev/ttyUSB0, COM3).
    #[arg(long)]
    pub serial: bool,
    /// Serial line rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Exit after N applied frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Four port values, decimal or 0x-prefixed hex.
    #[arg(num_args = 4, required = true, value_name = "BYTE", value_parser = parse_byte)]
    pub payload: Vec<u8>,
    /// How long to wait for the echo on each attempt (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Total attempts before giving up.
    #[arg(long, default_value_t = 3)]
    pub attempts: u32,
    /// Pause between attempts (e.g. 200ms).
    #[arg(long, default_value = "200ms")]
    pub backoff: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes, optionally 0x-prefixed (e.g. aa 01 02 03 04 55).
    #[arg(required = true, value_name = "HEX", value_parser = parse_hex_byte)]
    pub bytes: Vec<u8>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Decimal (`170`) or hex (`0xAA`).
pub fn parse_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|_| format!("not a byte (0-255 or 0x00-0xFF): {input}"))
}

/// Hex with or without `0x`.
pub fn parse_hex_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    u8::from_str_radix(digits, 16).map_err(|_| format!("not a hex byte: {input}"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

/// Open the host end of a link.
pub fn connect_link(args: &LinkArgs) -> CliResult<LinkStream> {
    if args.serial {
        let config = SerialConfig {
            baud_rate: args.baud,
            ..SerialConfig::default()
        };
        SerialLink::open(&args.path, &config).map_err(|err| transport_error("open failed", err))
    } else {
        UnixDomainSocket::connect(&args.path).map_err(|err| transport_error("connect failed", err))
    }
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, std::sync::atomic::Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
