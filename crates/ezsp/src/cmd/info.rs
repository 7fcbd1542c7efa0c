use ezsp_host::{Ezsp, VersionInfo};
use serde::Serialize;

use crate::cmd::InfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    path: String,
    ash_version: Option<u8>,
    reset_reason: Option<String>,
    protocol_version: u8,
    stack_type: u8,
    stack_version: String,
    eui64: Option<String>,
    connected: bool,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connect.config()?;
    let (ezsp, version) = args.connect.connect(&config)?;
    let out = collect(&ezsp, &args.connect.path, version);
    ezsp.close();

    print_info(&out, format);
    Ok(SUCCESS)
}

fn collect(ezsp: &Ezsp, path: &str, version: VersionInfo) -> InfoOutput {
    let reset = ezsp.link_info();
    // The EUI64 is informational; older firmware may reject the command.
    let eui64 = ezsp
        .execute("getEui64", &())
        .ok()
        .and_then(|frame| frame.params.get_u64("eui64"))
        .map(|eui64| format!("{eui64:016X}"));

    InfoOutput {
        path: path.to_string(),
        ash_version: reset.map(|info| info.version),
        reset_reason: reset.map(|info| info.code.to_string()),
        protocol_version: version.protocol,
        stack_type: version.stack_type,
        stack_version: version.stack_version_string(),
        eui64,
        connected: true,
    }
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    let unknown = || "unavailable".to_string();
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PROPERTY", "VALUE"]);
            table
                .add_row(vec!["Path".to_string(), out.path.clone()])
                .add_row(vec![
                    "ASH version".to_string(),
                    out.ash_version.map_or_else(unknown, |v| v.to_string()),
                ])
                .add_row(vec![
                    "Reset reason".to_string(),
                    out.reset_reason.clone().unwrap_or_else(unknown),
                ])
                .add_row(vec![
                    "EZSP protocol".to_string(),
                    out.protocol_version.to_string(),
                ])
                .add_row(vec!["Stack type".to_string(), out.stack_type.to_string()])
                .add_row(vec!["Stack version".to_string(), out.stack_version.clone()])
                .add_row(vec![
                    "EUI64".to_string(),
                    out.eui64.clone().unwrap_or_else(unknown),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("NCP Info:");
            println!("  Path:           {}", out.path);
            match out.ash_version {
                Some(v) => println!("  ASH version:    {v}"),
                None => println!("  ASH version:    unavailable"),
            }
            if let Some(reason) = &out.reset_reason {
                println!("  Reset reason:   {reason}");
            }
            println!("  EZSP protocol:  {}", out.protocol_version);
            println!("  Stack version:  {} (type {})", out.stack_version, out.stack_type);
            match &out.eui64 {
                Some(eui64) => println!("  EUI64:          {eui64}"),
                None => println!("  EUI64:          unavailable"),
            }
        }
        OutputFormat::Raw => {
            println!("{}", out.protocol_version);
        }
    }
}
