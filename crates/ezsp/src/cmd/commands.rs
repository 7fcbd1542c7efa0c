use ezsp_schema::{CommandSchema, Field, SchemaRegistry};
use serde::Serialize;

use crate::cmd::CommandsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct CommandOutput {
    name: &'static str,
    id: u16,
    kind: &'static str,
    min_version: Option<u8>,
    max_version: Option<u8>,
    request: Vec<String>,
    response: Vec<String>,
}

impl From<&CommandSchema> for CommandOutput {
    fn from(command: &CommandSchema) -> Self {
        Self {
            name: command.name,
            id: command.id,
            kind: if command.is_callback() {
                "callback"
            } else {
                "command"
            },
            min_version: command.min_version,
            max_version: command.max_version,
            request: fields(command.request),
            response: fields(command.response),
        }
    }
}

fn fields(fields: &[Field]) -> Vec<String> {
    fields
        .iter()
        .map(|field| format!("{}: {}", field.name, field.ty))
        .collect()
}

fn versions(command: &CommandSchema) -> String {
    match (command.min_version, command.max_version) {
        (None, None) => "all".to_string(),
        (Some(min), None) => format!(">= {min}"),
        (None, Some(max)) => format!("<= {max}"),
        (Some(min), Some(max)) => format!("{min}..={max}"),
    }
}

fn select(registry: &SchemaRegistry, args: &CommandsArgs) -> Vec<&'static CommandSchema> {
    let filter = args.filter.as_deref().map(str::to_lowercase);
    registry
        .iter()
        .filter(|command| {
            filter
                .as_deref()
                .is_none_or(|filter| command.name.to_lowercase().contains(filter))
        })
        .filter(|command| {
            args.protocol_version
                .is_none_or(|version| command.applies_to(version))
        })
        .collect()
}

pub fn run(args: CommandsArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = SchemaRegistry::builtin();
    let selected = select(&registry, &args);

    match format {
        OutputFormat::Json => {
            let out: Vec<CommandOutput> = selected.iter().copied().map(CommandOutput::from).collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["ID", "NAME", "KIND", "VERSIONS", "REQUEST", "RESPONSE"]);
            for command in &selected {
                let out = CommandOutput::from(*command);
                table.add_row(vec![
                    format!("0x{:04X}", command.id),
                    command.name.to_string(),
                    out.kind.to_string(),
                    versions(command),
                    out.request.join("\n"),
                    out.response.join("\n"),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for command in &selected {
                let out = CommandOutput::from(*command);
                println!(
                    "0x{:04X} {} ({}) -> ({})",
                    command.id,
                    command.name,
                    out.request.join(", "),
                    out.response.join(", ")
                );
            }
        }
        OutputFormat::Raw => {
            for command in &selected {
                println!("{}", command.name);
            }
        }
    }
    Ok(SUCCESS)
}
