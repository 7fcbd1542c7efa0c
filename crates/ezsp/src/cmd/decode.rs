use std::sync::Arc;

use bytes::BytesMut;
use ezsp_ash::{AshDecoder, Decoded, LinkFrame};
use ezsp_host::{EzspFrame, FrameCodec};
use ezsp_schema::{Record, SchemaRegistry};
use serde::Serialize;
use tracing::warn;

use crate::cmd::{parse_hex, DecodeArgs, Layer};
use crate::exit::{schema_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{new_table, print_frame, print_json, record_text, OutputFormat};

/// One item found in a captured ASH byte stream.
#[derive(Serialize)]
struct LinkOutput {
    kind: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crc_ok: Option<bool>,
    data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ezsp: Option<EzspFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl LinkOutput {
    fn flow_control(kind: &'static str) -> Self {
        Self {
            kind,
            detail: kind.to_string(),
            control: None,
            crc_ok: None,
            data: String::new(),
            ezsp: None,
            error: None,
        }
    }

    fn is_bad(&self) -> bool {
        self.crc_ok == Some(false) || self.error.is_some()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParamsOutput<'a> {
    name: &'static str,
    frame_id: u16,
    params: &'a Record,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let registry = Arc::new(SchemaRegistry::builtin());

    if let Some(id) = args.id {
        let (command, params) = registry
            .decode_response(id, args.protocol_version, &bytes)
            .map_err(|err| schema_error(&format!("cannot decode frame 0x{id:04X}"), err))?;
        print_params(
            &ParamsOutput {
                name: command.name,
                frame_id: id,
                params: &params,
            },
            format,
        );
        return Ok(SUCCESS);
    }

    match args.layer {
        Layer::Ezsp => {
            let mut codec = FrameCodec::new(registry, args.protocol_version);
            let frame = codec
                .decode(&bytes)
                .map_err(|err| CliError::new(DATA_INVALID, format!("invalid EZSP frame: {err}")))?;
            print_frame(&frame, format);
            Ok(SUCCESS)
        }
        Layer::Ash => {
            let codec = FrameCodec::new(registry, args.protocol_version);
            let (items, trailing) = decode_ash(&bytes, codec, !args.no_randomize);
            if trailing > 0 {
                warn!(bytes = trailing, "input ends without a closing flag");
            }
            print_link(&items, format);
            if items.iter().any(LinkOutput::is_bad) {
                Ok(DATA_INVALID)
            } else {
                Ok(SUCCESS)
            }
        }
    }
}

/// Split `bytes` into frames. Returns the items and the count of unterminated trailing bytes.
fn decode_ash(bytes: &[u8], mut codec: FrameCodec, randomized: bool) -> (Vec<LinkOutput>, usize) {
    let mut decoder = AshDecoder::new();
    let mut buf = BytesMut::from(bytes);
    let mut items = Vec::new();

    while let Some(decoded) = decoder.decode(&mut buf) {
        match decoded {
            Decoded::Xon => items.push(LinkOutput::flow_control("XON")),
            Decoded::Xoff => items.push(LinkOutput::flow_control("XOFF")),
            Decoded::Frame(frame) => items.push(describe(&frame, &mut codec, randomized)),
        }
    }
    (items, decoder.pending() + buf.len())
}

fn describe(frame: &LinkFrame, codec: &mut FrameCodec, randomized: bool) -> LinkOutput {
    let kind = frame.kind();
    let crc_ok = frame.verify_crc();
    let is_data = kind.name() == "DATA";
    let payload = if is_data {
        frame.payload(randomized)
    } else {
        frame.payload(false)
    };

    let (ezsp, error) = match (is_data, crc_ok) {
        (true, true) => match codec.decode(&payload) {
            Ok(decoded) => (Some(decoded), None),
            Err(err) => (None, Some(err.to_string())),
        },
        (_, false) => (None, Some("CRC mismatch".to_string())),
        (false, true) => (None, None),
    };

    LinkOutput {
        kind: kind.name(),
        detail: kind.to_string(),
        control: frame.raw().first().map(|control| format!("0x{control:02X}")),
        crc_ok: Some(crc_ok),
        data: hex::encode(&payload),
        ezsp,
        error,
    }
}

fn print_link(items: &[LinkOutput], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for item in items {
                print_json(item);
            }
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["FRAME", "CONTROL", "CRC", "DATA", "EZSP"]);
            for item in items {
                table.add_row(vec![
                    item.detail.clone(),
                    item.control.clone().unwrap_or_default(),
                    match item.crc_ok {
                        Some(true) => "ok".to_string(),
                        Some(false) => "BAD".to_string(),
                        None => String::new(),
                    },
                    item.data.clone(),
                    ezsp_text(item),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for item in items {
                let ezsp = ezsp_text(item);
                if ezsp.is_empty() {
                    println!("{} {}", item.detail, item.data);
                } else {
                    println!("{} {} => {ezsp}", item.detail, item.data);
                }
            }
        }
        OutputFormat::Raw => {
            for item in items {
                println!("{}", item.data);
            }
        }
    }
}

fn ezsp_text(item: &LinkOutput) -> String {
    match (&item.ezsp, &item.error) {
        (Some(frame), _) => format!("{} {}", frame.name(), record_text(&frame.params)),
        (None, Some(error)) => format!("error: {error}"),
        (None, None) => String::new(),
    }
}

fn print_params(out: &ParamsOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            table.add_row(vec![
                "frame".to_string(),
                format!("{} (0x{:04X})", out.name, out.frame_id),
            ]);
            for (name, value) in out.params.iter() {
                table.add_row(vec![name.to_string(), crate::output::value_text(value)]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{} {}", out.name, record_text(out.params)),
        OutputFormat::Raw => println!("{}", record_text(out.params)),
    }
}
