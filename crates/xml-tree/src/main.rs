use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quarto_xml_tree::{DecodeOptions, XmlTokenReader};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Convert XML documents to and from their tagged JSON form
#[derive(Parser, Debug)]
#[command(name = "xml-tree")]
#[command(about = "Convert XML documents to and from their tagged JSON form", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read an XML document and write its node tree as JSON
    ToJson {
        /// XML input (defaults to stdin)
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// JSON output (defaults to stdout)
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write JSON on a single line
        #[arg(long)]
        compact: bool,

        /// Reject documents with elements nested deeper than this
        #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },

    /// Read a JSON node tree and write it as XML
    ToXml {
        /// JSON input (defaults to stdin)
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// XML output (defaults to stdout)
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Writing JSON recurses once per nesting level.
const DEFAULT_MAX_DEPTH: usize = 1000;

fn main() {
    // Logs go to stderr so they never mix with converted output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xml_tree=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ToJson {
            input,
            output,
            compact,
            max_depth,
        } => {
            let reader = open_input(input.as_deref())?;
            let writer = open_output(output.as_deref())?;
            let options = DecodeOptions::new().with_max_depth(max_depth);
            xml_to_json(reader, writer, !compact, &options)
                .with_context(|| format!("Failed to convert {} to JSON", describe(&input)))
        }
        Commands::ToXml { input, output } => {
            let reader = open_input(input.as_deref())?;
            let writer = open_output(output.as_deref())?;
            json_to_xml(reader, writer)
                .with_context(|| format!("Failed to convert {} to XML", describe(&input)))
        }
    }
}

fn xml_to_json(
    input: impl BufRead,
    mut output: impl Write,
    pretty: bool,
    options: &DecodeOptions,
) -> Result<()> {
    let nodes = quarto_xml_tree::decode_with(&mut XmlTokenReader::new(input), options)?;
    tracing::debug!(count = nodes.len(), "decoded top-level XML nodes");

    quarto_xml_tree::to_json_writer(&mut output, &nodes, pretty)?;
    if pretty {
        writeln!(output)?;
    }
    output.flush()?;
    Ok(())
}

fn json_to_xml(input: impl Read, output: impl Write) -> Result<()> {
    let nodes = quarto_xml_tree::from_json_reader(input)?;
    tracing::debug!(count = nodes.len(), "decoded top-level JSON nodes");

    let mut output = quarto_xml_tree::to_xml_writer(output, &nodes)?;
    output.flush()?;
    Ok(())
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to read input file: {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn describe(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "stdin".to_string(),
    }
}
