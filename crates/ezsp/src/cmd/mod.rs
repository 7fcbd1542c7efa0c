use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use ezsp_host::{Ezsp, EzspConfig, VersionInfo, DEFAULT_PROTOCOL_VERSION};
use ezsp_transport::options::DEFAULT_BAUD_RATE;
use tracing::debug;

use crate::exit::{ezsp_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod commands;
pub mod decode;
pub mod exec;
pub mod info;
pub mod listen;
pub mod ports;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect, negotiate the protocol version and print NCP details.
    Info(InfoArgs),
    /// Run one EZSP command and print the decoded response.
    Exec(ExecArgs),
    /// Print callbacks as they arrive.
    Listen(ListenArgs),
    /// List the EZSP command table.
    Commands(CommandsArgs),
    /// List serial ports on this host.
    Ports(PortsArgs),
    /// Decode captured ASH frames or EZSP bodies offline.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, format),
        Command::Exec(args) => exec::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Commands(args) => commands::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the NCP.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Serial device (e.g. /dev/ttyUSB0) or tcp://host:port.
    pub path: String,
    /// Serial baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Enable RTS/CTS hardware flow control.
    #[arg(long)]
    pub rtscts: bool,
    /// EZSP protocol version to request.
    #[arg(long, default_value_t = DEFAULT_PROTOCOL_VERSION)]
    pub protocol_version: u8,
    /// Per-command timeout (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
    /// Connection attempts before giving up.
    #[arg(long, default_value_t = 1)]
    pub attempts: u32,
}

impl ConnectArgs {
    pub fn config(&self) -> CliResult<EzspConfig> {
        let mut config = EzspConfig {
            initial_version: self.protocol_version,
            command_timeout: parse_timeout(&self.timeout)?,
            connect_attempts: self.attempts,
            connect_retry_delay: Duration::from_secs(1),
            // One-shot commands do not need keepalives.
            watchdog_period: None,
            ..EzspConfig::default()
        };
        config.serial.baud_rate = self.baud;
        config.serial.rtscts = self.rtscts;
        Ok(config)
    }

    /// Connect and agree on a protocol version with the NCP.
    pub fn connect(&self, config: &EzspConfig) -> CliResult<(Ezsp, VersionInfo)> {
        let ezsp = ezsp_host::connect_with_config(&self.path, config)
            .map_err(|err| ezsp_error("connect failed", err))?;
        let version = ezsp
            .negotiate_version()
            .map_err(|err| ezsp_error("version negotiation failed", err))?;
        debug!(
            protocol = version.protocol,
            stack = %version.stack_version_string(),
            "negotiated protocol version"
        );
        Ok((ezsp, version))
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Command name, e.g. getNodeId.
    pub command: String,
    /// Arguments as a JSON object keyed by field name.
    #[arg(long, value_name = "JSON")]
    pub args: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Exit after printing N callbacks.
    #[arg(long)]
    pub count: Option<usize>,
    /// Send a watchdog nop at this interval (e.g. 10s).
    #[arg(long, value_name = "INTERVAL")]
    pub watchdog: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct CommandsArgs {
    /// Only show commands whose name contains this text (case-insensitive).
    #[arg(long)]
    pub filter: Option<String>,
    /// Only show entries that apply to this protocol version.
    #[arg(long)]
    pub protocol_version: Option<u8>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Layer {
    /// Stuffed ASH frames as captured on the wire.
    #[default]
    Ash,
    /// One EZSP frame (sequence, frame control, frame id, parameters).
    Ezsp,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes; whitespace and ':' separators are ignored.
    pub hex: String,
    /// What the bytes are.
    #[arg(long, value_enum, default_value_t = Layer::Ash)]
    pub layer: Layer,
    /// Decode the bytes as bare response parameters of this frame id.
    #[arg(long, value_name = "ID", value_parser = parse_frame_id, conflicts_with = "layer")]
    pub id: Option<u16>,
    /// Protocol version selecting the frame format and schema entries.
    #[arg(long, default_value_t = DEFAULT_PROTOCOL_VERSION)]
    pub protocol_version: u8,
    /// ASH DATA fields are not randomized.
    #[arg(long)]
    pub no_randomize: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
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
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Frame ids are given as `0x00C4` or decimal.
pub fn parse_frame_id(input: &str) -> Result<u16, String> {
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid frame id: {input}"))
}

/// Parse hex bytes, ignoring whitespace and ':' separators.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let compact = compact
        .strip_prefix("0x")
        .unwrap_or(compact.as_str());
    hex::decode(compact).map_err(|err| CliError::new(USAGE, format!("invalid hex input: {err}")))
}
