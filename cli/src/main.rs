use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use typegraph_core::runtime::{Decoder, Encoder};
use typegraph_core::{compile, CasingStyle, CompileOptions, DecodeOptions, DocumentSet, ProbeOrder};
use url::Url;

#[derive(Parser)]
#[command(name = "typegraph")]
#[command(about = "Resolve OpenAPI documents into an emission-ready type graph")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct DocumentArgs {
    /// Root OpenAPI document (JSON or YAML)
    input: PathBuf,

    /// Additional document reachable through `$ref`, as FILE or FILE=PACKAGE
    #[arg(long = "with", value_name = "FILE[=PACKAGE]")]
    with: Vec<String>,

    /// Compile options file (JSON, kebab-case keys)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Casing for type names and enum constants
    #[arg(long, value_enum)]
    type_style: Option<StyleArg>,

    /// Casing for record field identifiers
    #[arg(long, value_enum)]
    field_style: Option<StyleArg>,

    /// Max schema nesting depth during normalization
    #[arg(long)]
    max_depth: Option<usize>,

    /// Only keep operations carrying one of these tags
    #[arg(long = "include-tag")]
    include_tags: Vec<String>,

    /// Drop operations carrying any of these tags
    #[arg(long = "exclude-tag")]
    exclude_tags: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile documents and print the type graph as JSON
    Compile {
        #[command(flatten)]
        docs: DocumentArgs,

        /// Output file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print only the declared type names, one per line
        #[arg(long)]
        names: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Decode a JSON payload against a declared type and print it re-encoded
    Decode {
        #[command(flatten)]
        docs: DocumentArgs,

        /// Declared type name (package-qualified for external documents)
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Payload file (JSON)
        #[arg(long)]
        payload: PathBuf,

        /// Probe order for unions without a discriminator
        #[arg(long, value_enum, default_value_t = ProbeArg::Declaration)]
        probe_order: ProbeArg,

        /// Reject keys the type neither declares nor allows
        #[arg(long)]
        deny_unknown_fields: bool,

        /// Skip `format` checks on strings
        #[arg(long)]
        no_format_check: bool,

        /// Output file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum StyleArg {
    Pascal,
    Camel,
    Snake,
    Preserve,
}

impl From<StyleArg> for CasingStyle {
    fn from(val: StyleArg) -> Self {
        match val {
            StyleArg::Pascal => CasingStyle::Pascal,
            StyleArg::Camel => CasingStyle::Camel,
            StyleArg::Snake => CasingStyle::Snake,
            StyleArg::Preserve => CasingStyle::Preserve,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ProbeArg {
    Declaration,
    MostSpecificFirst,
}

impl From<ProbeArg> for ProbeOrder {
    fn from(val: ProbeArg) -> Self {
        match val {
            ProbeArg::Declaration => ProbeOrder::Declaration,
            ProbeArg::MostSpecificFirst => ProbeOrder::MostSpecificFirst,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    Pretty,
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compile {
            docs,
            output,
            names,
            format,
        } => {
            let (documents, options) = load_inputs(&docs)?;
            let graph = compile(&documents, &options)
                .map_err(|e| anyhow::Error::from(e).context("Compilation failed"))?;

            if names {
                let mut writer = open_output(output.as_ref())?;
                for node in graph.types() {
                    if let Some(name) = node.qualified_name() {
                        writeln!(writer, "{name}").context("Failed to write type name")?;
                    }
                }
                writer.flush().context("Failed to flush output")?;
            } else {
                write_json(&graph, output.as_ref(), format)?;
            }
        }
        Commands::Decode {
            docs,
            type_name,
            payload,
            probe_order,
            deny_unknown_fields,
            no_format_check,
            output,
            format,
        } => {
            let (documents, options) = load_inputs(&docs)?;
            let graph = compile(&documents, &options)
                .map_err(|e| anyhow::Error::from(e).context("Compilation failed"))?;

            let data: Value = {
                let file = File::open(&payload)
                    .with_context(|| format!("Failed to open payload file: {}", payload.display()))?;
                serde_json::from_reader(BufReader::new(file))
                    .with_context(|| format!("Failed to parse payload from: {}", payload.display()))?
            };

            // All fields set explicitly; clippy enforces exhaustiveness
            let decode_options = DecodeOptions {
                max_depth: DecodeOptions::default().max_depth,
                probe_order: probe_order.into(),
                check_formats: !no_format_check,
                deny_unknown_fields,
            };
            let instance = Decoder::new(&graph, &decode_options)
                .decode_type(&type_name, &data)
                .map_err(|e| anyhow::Error::from(e).context(format!("Decoding as {type_name} failed")))?;
            let encoded = Encoder::new(&graph, &decode_options)
                .encode_type(&type_name, &instance)
                .map_err(|e| anyhow::Error::from(e).context(format!("Encoding {type_name} failed")))?;

            write_json(&encoded, output.as_ref(), format)?;
        }
    }

    Ok(())
}

/// Load every document and assemble the compile options.
fn load_inputs(args: &DocumentArgs) -> Result<(DocumentSet, CompileOptions)> {
    let mut documents = DocumentSet::new();
    documents.insert(document_url(&args.input)?, load_document(&args.input)?);
    for spec in &args.with {
        let (path, package) = match spec.split_once('=') {
            Some((path, package)) => (PathBuf::from(path), Some(package.to_string())),
            None => (PathBuf::from(spec), None),
        };
        let url = document_url(&path)?;
        let root = load_document(&path)?;
        match package {
            Some(package) => documents.insert_with_package(url, package, root),
            None => documents.insert(url, root),
        };
    }

    let mut options = match &args.options {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open options file: {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse options from: {}", path.display()))?
        }
        None => CompileOptions::default(),
    };
    if let Some(style) = args.type_style {
        options.naming.type_style = style.into();
    }
    if let Some(style) = args.field_style {
        options.naming.field_style = style.into();
    }
    if let Some(depth) = args.max_depth {
        options.max_depth = depth;
    }
    options.operations.include_tags.extend(args.include_tags.iter().cloned());
    options.operations.exclude_tags.extend(args.exclude_tags.iter().cloned());

    Ok((documents, options))
}

/// Parse a JSON or YAML document, chosen by file extension.
fn load_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if yaml {
        let raw: serde_yaml::Value = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML document: {}", path.display()))?;
        yaml_to_json(raw).with_context(|| format!("Unsupported YAML in: {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON document: {}", path.display()))
    }
}

/// YAML → JSON. Scalar mapping keys (e.g. response codes `200`) become strings.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value> {
    use serde_yaml::Value as Yaml;
    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => serde_json::to_value(&n).context("Unsupported YAML number")?,
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_>>()?,
        ),
        Yaml::Mapping(map) => {
            let mut object = serde_json::Map::new();
            for (key, v) in map {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => return Err(anyhow!("Unsupported mapping key: {other:?}")),
                };
                object.insert(key, yaml_to_json(v)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

/// `file://` URL of a document, so relative `$ref`s resolve against it.
fn document_url(path: &Path) -> Result<Url> {
    let absolute = fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve path: {}", path.display()))?;
    Url::from_file_path(&absolute).map_err(|()| anyhow!("Not a valid file path: {}", absolute.display()))
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => {
            let file = File::create(p)
                .with_context(|| format!("Failed to create output file: {}", p.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn write_json<T: serde::Serialize>(
    val: &T,
    path: Option<&PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut writer = open_output(path)?;

    match format {
        OutputFormat::Pretty => {
            serde_json::to_writer_pretty(&mut writer, val).context("Failed to write JSON")?;
        }
        OutputFormat::Compact => {
            serde_json::to_writer(&mut writer, val).context("Failed to write JSON")?;
        }
    }

    // Ensure trailing newline
    writeln!(writer).context("Failed to write trailing newline")?;
    writer.flush().context("Failed to flush output")?;

    Ok(())
}
