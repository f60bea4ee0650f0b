//! tagwire - Encode and decode Protocol Buffer payloads
//!
//! Message types are taken from compiled descriptor sets
//! (`protoc --descriptor_set_out`). Binary payloads are read and written raw
//! or as hex; the structured side is JSON.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value as JsonValue;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tagwire_core::{
    CodecConfig, IntegerStrategy, MessageCodec, MessageSchema, SchemaRegistry, SchemaResolver, Utf8Policy,
};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// File extensions recognised as encoded descriptor sets
const DESCRIPTOR_EXTENSIONS: [&str; 3] = ["pb", "binpb", "desc"];

/// Encode and decode Protocol Buffer payloads against compiled descriptor sets
#[derive(Parser, Debug)]
#[command(name = "tagwire")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Descriptor set file, or directory searched recursively for .pb/.binpb/.desc files
    #[arg(short, long = "descriptors", required = true, env = "TAGWIRE_DESCRIPTORS")]
    descriptors: Vec<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the message and enum types found in the descriptor sets
    Types,
    /// Decode a binary payload to JSON
    Decode(DecodeArgs),
    /// Encode a JSON document to a binary payload
    Encode(EncodeArgs),
}

#[derive(Args, Debug)]
struct PayloadArgs {
    /// Fully qualified message type, e.g. `demo.Block`
    #[arg(short, long = "type")]
    type_name: String,

    /// Input file (defaults to stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Binary side is hex text instead of raw bytes
    #[arg(long)]
    hex: bool,

    /// Binary side is a stream of varint length-prefixed messages
    #[arg(long)]
    delimited: bool,

    /// Keep full 64-bit integers instead of enforcing the 2^53 - 1 ceiling
    #[arg(long)]
    native_integers: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    #[command(flatten)]
    payload: PayloadArgs,

    /// Fail on invalid UTF-8 instead of substituting U+FFFD
    #[arg(long)]
    strict_utf8: bool,

    /// Emit every declared field, zero values included
    #[arg(long)]
    emit_defaults: bool,

    /// Emit enum codes instead of symbolic names
    #[arg(long)]
    enums_as_numbers: bool,

    /// Pretty-print JSON (ignored with --delimited, which emits one document per line)
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[command(flatten)]
    payload: PayloadArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let registry = load_registry(&cli.descriptors)?;

    match &cli.command {
        Command::Types => list_types(&registry),
        Command::Decode(args) => run_decode(&registry, args),
        Command::Encode(args) => run_encode(&registry, args),
    }
}

/// Whether a path looks like an encoded descriptor set
fn is_descriptor_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DESCRIPTOR_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collect descriptor set files from the given paths
fn collect_descriptor_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            bail!("Descriptor path does not exist: {}", path.display());
        }

        info!("Scanning directory: {}", path.display());
        for entry in WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            // Skip hidden files
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(false)
            {
                continue;
            }

            if !is_descriptor_file(path) {
                trace!("Skipping non-descriptor: {}", path.display());
                continue;
            }
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Build one registry from every descriptor set under the given paths
fn load_registry(paths: &[PathBuf]) -> Result<SchemaRegistry> {
    let files = collect_descriptor_files(paths)?;
    if files.is_empty() {
        bail!("No descriptor sets found");
    }

    let mut sets = Vec::with_capacity(files.len());
    for file in &files {
        debug!("Reading descriptor set {}", file.display());
        let data =
            fs::read(file).with_context(|| format!("Failed to read descriptor set: {}", file.display()))?;
        sets.push(data);
    }

    let registry = SchemaRegistry::from_file_descriptor_sets(sets)
        .with_context(|| format!("Failed to load {} descriptor set(s)", files.len()))?;
    info!("Loaded {} types from {} descriptor set(s)", registry.len(), files.len());
    Ok(registry)
}

fn list_types(registry: &SchemaRegistry) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for name in registry.message_names() {
        writeln!(out, "message {}", name)?;
    }
    for name in registry.enum_names() {
        writeln!(out, "enum {}", name)?;
    }
    Ok(())
}

fn resolve<'r>(registry: &'r SchemaRegistry, type_name: &str) -> Result<&'r MessageSchema> {
    registry
        .resolve_message(type_name)
        .with_context(|| format!("Message type not found in descriptor sets: {}", type_name))
}

fn base_config(payload: &PayloadArgs) -> CodecConfig {
    let integers = if payload.native_integers {
        IntegerStrategy::Native
    } else {
        IntegerStrategy::SafeDouble
    };
    CodecConfig::new().integers(integers)
}

fn decode_config(args: &DecodeArgs) -> CodecConfig {
    let utf8 = if args.strict_utf8 {
        Utf8Policy::Strict
    } else {
        Utf8Policy::Replace
    };
    base_config(&args.payload)
        .utf8(utf8)
        .emit_defaults(args.emit_defaults)
        .enums_as_numbers(args.enums_as_numbers)
}

fn run_decode(registry: &SchemaRegistry, args: &DecodeArgs) -> Result<()> {
    let schema = resolve(registry, &args.payload.type_name)?;
    let codec = MessageCodec::new(registry).with_config(decode_config(args));

    let input = read_input(args.payload.input.as_deref())?;
    let output = decode_payload(&codec, schema, &input, args)?;
    write_output(args.payload.output.as_deref(), &output)
}

fn run_encode(registry: &SchemaRegistry, args: &EncodeArgs) -> Result<()> {
    let schema = resolve(registry, &args.payload.type_name)?;
    let codec = MessageCodec::new(registry).with_config(base_config(&args.payload));

    let input = read_input(args.payload.input.as_deref())?;
    let output = encode_payload(&codec, schema, &input, &args.payload)?;
    write_output(args.payload.output.as_deref(), &output)
}

/// Binary (or hex) input to JSON output
fn decode_payload(
    codec: &MessageCodec<'_>,
    schema: &MessageSchema,
    input: &[u8],
    args: &DecodeArgs,
) -> Result<Vec<u8>> {
    let data = if args.payload.hex {
        parse_hex(input)?
    } else {
        input.to_vec()
    };
    trace!("Decoding {} bytes as {}", data.len(), schema.name());

    let mut out = Vec::new();
    if args.payload.delimited {
        let mut offset = 0;
        while offset < data.len() {
            let (message, used) = codec
                .decode_length_delimited(&data[offset..], schema)
                .with_context(|| format!("Failed to decode frame at offset {}", offset))?;
            let json = codec.to_textual(&message, schema)?;
            serde_json::to_writer(&mut out, &json)?;
            out.push(b'\n');
            offset += used;
        }
        return Ok(out);
    }

    let message = codec
        .decode(&data, schema)
        .with_context(|| format!("Failed to decode {}", schema.name()))?;
    let json = codec.to_textual(&message, schema)?;
    if args.pretty {
        serde_json::to_writer_pretty(&mut out, &json)?;
    } else {
        serde_json::to_writer(&mut out, &json)?;
    }
    out.push(b'\n');
    Ok(out)
}

/// JSON input to binary (or hex) output.
///
/// With `--delimited`, a top-level array is written as one frame per element.
fn encode_payload(
    codec: &MessageCodec<'_>,
    schema: &MessageSchema,
    input: &[u8],
    payload: &PayloadArgs,
) -> Result<Vec<u8>> {
    let document: JsonValue = serde_json::from_slice(input).context("Input is not valid JSON")?;

    let documents = match document {
        JsonValue::Array(items) if payload.delimited => items,
        JsonValue::Array(_) => {
            warn!("Top-level array encoded as a single {}; use --delimited for a stream", schema.name());
            vec![document]
        }
        other => vec![other],
    };

    let mut encoded = Vec::new();
    for (i, document) in documents.iter().enumerate() {
        let message = codec.from_textual(document, schema)?;
        let bytes = if payload.delimited {
            codec.encode_length_delimited(&message, schema)
        } else {
            codec.encode(&message, schema)
        }
        .with_context(|| format!("Failed to encode document {} as {}", i + 1, schema.name()))?;
        encoded.extend_from_slice(&bytes);
    }
    debug!("Encoded {} document(s) into {} bytes", documents.len(), encoded.len());

    if payload.hex {
        let mut text = hex::encode(&encoded).into_bytes();
        text.push(b'\n');
        return Ok(text);
    }
    Ok(encoded)
}

fn parse_hex(input: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(input).context("Hex input is not text")?;
    let digits: String = text.split_whitespace().collect();
    hex::decode(digits).context("Input is not valid hex")
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
        }
        None => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .context("Failed to read stdin")?;
            Ok(data)
        }
    }
}

fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, data).with_context(|| format!("Failed to write file: {}", path.display()))?;
            info!("Wrote {} bytes to {}", data.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            out.write_all(data).context("Failed to write stdout")?;
            out.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message as _;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet};
    use tempfile::TempDir;

    fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            json_name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(ty as i32),
            ..Default::default()
        }
    }

    fn demo_descriptor_set() -> Vec<u8> {
        let block = DescriptorProto {
            name: Some("Block".to_string()),
            field: vec![field("height", 1, Type::Int64), field("hash", 2, Type::Bytes)],
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("demo.proto".to_string()),
            package: Some("demo".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![block],
            ..Default::default()
        };
        FileDescriptorSet { file: vec![file] }.encode_to_vec()
    }

    fn descriptor_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("demo.binpb"), demo_descriptor_set()).unwrap();
        fs::write(dir.path().join("README.md"), "not a descriptor").unwrap();
        fs::write(dir.path().join(".hidden.pb"), "junk").unwrap();
        dir
    }

    fn payload(hex: bool, delimited: bool) -> PayloadArgs {
        PayloadArgs {
            type_name: "demo.Block".to_string(),
            input: None,
            output: None,
            hex,
            delimited,
            native_integers: false,
        }
    }

    fn decode_args(hex: bool, delimited: bool) -> DecodeArgs {
        DecodeArgs {
            payload: payload(hex, delimited),
            strict_utf8: false,
            emit_defaults: false,
            enums_as_numbers: false,
            pretty: false,
        }
    }

    #[test]
    fn test_is_descriptor_file() {
        assert!(is_descriptor_file(Path::new("/tmp/api.pb")));
        assert!(is_descriptor_file(Path::new("/tmp/api.BINPB")));
        assert!(is_descriptor_file(Path::new("/tmp/api.desc")));
        assert!(!is_descriptor_file(Path::new("/tmp/api.proto")));
        assert!(!is_descriptor_file(Path::new("/tmp/api")));
    }

    #[test]
    fn test_load_registry_from_directory() {
        let dir = descriptor_dir();
        let files = collect_descriptor_files(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files.len(), 1);

        let registry = load_registry(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(registry.message_names().collect::<Vec<_>>(), vec!["demo.Block"]);
        assert!(resolve(&registry, "demo.Missing").is_err());
    }

    #[test]
    fn test_load_registry_requires_descriptors() {
        let dir = TempDir::new().unwrap();
        assert!(load_registry(&[dir.path().to_path_buf()]).is_err());
        assert!(load_registry(&[dir.path().join("missing.pb")]).is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let dir = descriptor_dir();
        let registry = load_registry(&[dir.path().to_path_buf()]).unwrap();
        let schema = resolve(&registry, "demo.Block").unwrap();
        let codec = MessageCodec::new(&registry);

        let encoded = encode_payload(
            &codec,
            schema,
            br#"{"height": "12345", "hash": "AQI="}"#,
            &payload(true, false),
        )
        .unwrap();
        assert_eq!(String::from_utf8(encoded.clone()).unwrap(), "08b96012020102\n");

        let decoded = decode_payload(&codec, schema, &encoded, &decode_args(true, false)).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            "{\"hash\":\"AQI=\",\"height\":12345}\n"
        );
    }

    #[test]
    fn test_delimited_stream() {
        let dir = descriptor_dir();
        let registry = load_registry(&[dir.path().to_path_buf()]).unwrap();
        let schema = resolve(&registry, "demo.Block").unwrap();
        let codec = MessageCodec::new(&registry);

        let encoded = encode_payload(
            &codec,
            schema,
            br#"[{"height": 1}, {"height": 300}]"#,
            &payload(false, true),
        )
        .unwrap();
        assert_eq!(encoded, vec![0x02, 0x08, 0x01, 0x03, 0x08, 0xAC, 0x02]);

        let decoded = decode_payload(&codec, schema, &encoded, &decode_args(false, true)).unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            "{\"height\":1}\n{\"height\":300}\n"
        );
    }

    #[test]
    fn test_decode_reports_bad_input() {
        let dir = descriptor_dir();
        let registry = load_registry(&[dir.path().to_path_buf()]).unwrap();
        let schema = resolve(&registry, "demo.Block").unwrap();
        let codec = MessageCodec::new(&registry);

        assert!(decode_payload(&codec, schema, b"zz", &decode_args(true, false)).is_err());
        assert!(decode_payload(&codec, schema, &[0x08], &decode_args(false, false)).is_err());
        assert!(encode_payload(&codec, schema, b"{", &payload(false, false)).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
