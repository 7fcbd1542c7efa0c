use ezsp_transport::{list_ports, PortInfo};
use serde::Serialize;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct PortOutput {
    name: String,
    kind: &'static str,
    vid: Option<String>,
    pid: Option<String>,
    manufacturer: Option<String>,
    product: Option<String>,
}

impl From<PortInfo> for PortOutput {
    fn from(port: PortInfo) -> Self {
        Self {
            name: port.name,
            kind: port.kind,
            vid: port.vid.map(|vid| format!("{vid:04x}")),
            pid: port.pid.map(|pid| format!("{pid:04x}")),
            manufacturer: port.manufacturer,
            product: port.product,
        }
    }
}

pub fn run(_args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let ports: Vec<PortOutput> = list_ports()
        .map_err(|err| transport_error("port enumeration failed", err))?
        .into_iter()
        .map(PortOutput::from)
        .collect();

    match format {
        OutputFormat::Json => print_json(&ports),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "KIND", "VID:PID", "MANUFACTURER", "PRODUCT"]);
            for port in &ports {
                let usb_id = match (&port.vid, &port.pid) {
                    (Some(vid), Some(pid)) => format!("{vid}:{pid}"),
                    _ => "-".to_string(),
                };
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    usb_id,
                    port.manufacturer.clone().unwrap_or_default(),
                    port.product.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in &ports {
                println!("{}", port.name);
            }
        }
    }
    Ok(SUCCESS)
}
