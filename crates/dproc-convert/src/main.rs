//! dproc-convert - convert data files to and from normalized JSON

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dproc_common::logging::{init_logging, LogConfig, LogLevel};
use dproc_common::types::OutputFormat;
use dproc_convert::{ConverterRegistry, FormatMetadata, SourceFormat};
use serde_json::json;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dproc-convert")]
#[command(author, version, about = "Convert CSV, XML and Excel files to and from JSON records")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Json,
    Csv,
    Xml,
    Excel,
}

impl From<FormatArg> for SourceFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => SourceFormat::Json,
            FormatArg::Csv => SourceFormat::Csv,
            FormatArg::Xml => SourceFormat::Xml,
            FormatArg::Excel => SourceFormat::Excel,
        }
    }
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Xml => OutputFormat::Xml,
            FormatArg::Excel => OutputFormat::Excel,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a file as JSON records plus the metadata captured while reading
    ToJson {
        file: PathBuf,

        /// Input format; detected from the file extension when omitted
        #[arg(short, long)]
        format: Option<FormatArg>,

        /// CSV delimiter
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,

        /// Treat the first CSV row as data
        #[arg(long)]
        no_header: bool,
    },

    /// Rebuild a file from a JSON array of records
    FromJson {
        file: PathBuf,

        #[arg(short, long)]
        format: FormatArg,

        /// CSV delimiter
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,

        /// XML root element
        #[arg(long, default_value = "root")]
        root: String,

        /// XML item element
        #[arg(long, default_value = "item")]
        item: String,

        /// Excel sheet name
        #[arg(long, default_value = "Sheet1")]
        sheet: String,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("dproc-convert")
        .build();
    let _guard = init_logging(&log_config)?;

    let registry = ConverterRegistry::with_defaults();

    match cli.command {
        Command::ToJson {
            file,
            format,
            delimiter,
            no_header,
        } => {
            let input = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let hints = FormatMetadata::default()
                .with_delimiter(delimiter)
                .with_headers(!no_header);

            let file_name = file.to_string_lossy();
            let converted = match format {
                Some(arg) => {
                    let format = SourceFormat::from(arg);
                    // A forced format overrides extension detection.
                    registry.to_json(&format!("input.{}", format.extension()), "", &input, &hints)?
                }
                None => registry.to_json(&file_name, "", &input, &hints)?,
            };

            info!(file = %file_name, records = converted.records.len(), "Converted");
            let output = json!({
                "records": converted.records,
                "metadata": converted.metadata,
            });
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &output)?;
            writeln!(stdout)?;
        }
        Command::FromJson {
            file,
            format,
            delimiter,
            root,
            item,
            sheet,
            out,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let records = dproc_convert::records::parse_records(&text)?;

            let mut metadata = FormatMetadata::for_format(format.into())
                .with_delimiter(delimiter)
                .with_xml_root(root)
                .with_sheet_name(sheet);
            metadata.xml_item_element = item;

            let reconstructed = registry.reconstruct(&records, &format.into(), &metadata)?;
            std::fs::write(&out, &reconstructed.bytes)
                .with_context(|| format!("Failed to write {}", out.display()))?;

            info!(
                out = %out.display(),
                format = %reconstructed.format,
                bytes = reconstructed.bytes.len(),
                "Reconstructed"
            );
        }
    }

    Ok(())
}
