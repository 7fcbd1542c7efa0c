use ezsp_schema::Record;
use tracing::warn;

use crate::cmd::ExecArgs;
use crate::exit::{ezsp_error, schema_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ExecArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = ezsp_schema::SchemaRegistry::builtin();
    let command = registry
        .command(&args.command)
        .map_err(|err| schema_error("unknown command", err))?;
    // Validate arguments before touching the device.
    let request = parse_args(command, args.args.as_deref())?;

    let config = args.connect.config()?;
    let (ezsp, _) = args.connect.connect(&config)?;
    let result = ezsp.execute(command.name, &request);
    ezsp.close();

    let frame = result.map_err(|err| ezsp_error(command.name, err))?;
    print_frame(&frame, format);

    match frame.status() {
        Some(status) if !status.is_success() => {
            warn!(command = command.name, %status, "command returned non-success status");
            Ok(FAILURE)
        }
        _ => Ok(SUCCESS),
    }
}

fn parse_args(command: &ezsp_schema::CommandSchema, input: Option<&str>) -> CliResult<Record> {
    let json = match input {
        Some(text) => serde_json::from_str(text)
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid --args JSON: {err}")))?,
        None => serde_json::Value::Null,
    };
    command
        .request_from_json(&json)
        .map_err(|err| schema_error(&format!("invalid arguments for {}", command.name), err))
}

#[cfg(test)]
mod tests {
    use ezsp_schema::SchemaRegistry;

    use super::*;

    #[test]
    fn parses_named_arguments() {
        let registry = SchemaRegistry::builtin();
        let command = registry.command("setConfigurationValue").unwrap();
        let record = parse_args(command, Some(r#"{"configId": 1, "value": "0x1234"}"#)).unwrap();
        assert_eq!(record.get_u64("configId"), Some(1));
        assert_eq!(record.get_u64("value"), Some(0x1234));
    }

    #[test]
    fn no_arguments_for_empty_request() {
        let registry = SchemaRegistry::builtin();
        let command = registry.command("getNodeId").unwrap();
        assert!(parse_args(command, None).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_json_and_unknown_fields() {
        let registry = SchemaRegistry::builtin();
        let command = registry.command("setRadioChannel").unwrap();
        assert_eq!(parse_args(command, Some("{")).unwrap_err().code, DATA_INVALID);
        assert!(parse_args(command, Some(r#"{"chanel": 11}"#)).is_err());
        assert!(parse_args(command, None).is_err());
    }
}
