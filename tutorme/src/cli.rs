//! Command-line interface definitions for tutorme

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tutorme::export;
use tutorme::segmenter::DriverChoice;
use tutorme::source::InputFormat;

/// Input format for the parse and classify commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SourceFormat {
    /// Markdown export of the tutorial document
    Markdown,
    /// JSON array of blocks produced by an external converter
    Blocks,
}

impl From<SourceFormat> for InputFormat {
    fn from(format: SourceFormat) -> Self {
        match format {
            SourceFormat::Markdown => InputFormat::Markdown,
            SourceFormat::Blocks => InputFormat::Blocks,
        }
    }
}

/// Output format for the parse command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// JavaScript assignment (`data = [...];`)
    Js,
}

impl From<OutputFormat> for export::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => export::OutputFormat::Json,
            OutputFormat::Js => export::OutputFormat::Js,
        }
    }
}

/// Which signal family drives segmentation
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DriverArg {
    /// Page breaks when the document has any, text patterns otherwise
    Auto,
    /// Page breaks end tutorials and answer keys
    PageBreak,
    /// Annotations and text patterns end tutorials and answer keys
    Pattern,
}

impl From<DriverArg> for DriverChoice {
    fn from(driver: DriverArg) -> Self {
        match driver {
            DriverArg::Auto => DriverChoice::Auto,
            DriverArg::PageBreak => DriverChoice::PageBreak,
            DriverArg::Pattern => DriverChoice::Pattern,
        }
    }
}

/// CLI structure for the tutorme application
#[derive(Parser)]
#[command(name = "tutorme")]
#[command(version)]
#[command(about = "Extract exam tutorials from exported documents", long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for tutorme
#[derive(Subcommand)]
pub enum Commands {
    /// Parse a document into sections of questions
    Parse {
        /// Exported tutorial document
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Input format (guessed from the extension when omitted)
        #[arg(long, value_enum)]
        from: Option<SourceFormat>,

        /// Output format (guessed from the output extension when omitted)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// CSV export of the edit sheet to overlay
        #[arg(short, long, value_name = "CSV")]
        edits: Option<PathBuf>,

        /// Configuration file (defaults to tutorme.toml next to the input)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Override the configured segmentation driver
        #[arg(long, value_enum)]
        driver: Option<DriverArg>,

        /// Write diagnostics as JSON to this file
        #[arg(long, value_name = "FILE")]
        diagnostics: Option<PathBuf>,
    },

    /// Print the role the classifier assigns to every block
    Classify {
        /// Exported tutorial document
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Input format (guessed from the extension when omitted)
        #[arg(long, value_enum)]
        from: Option<SourceFormat>,

        /// Configuration file (defaults to tutorme.toml next to the input)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Write a tutorme.toml with the default settings
    InitConfig {
        /// Directory to write into (defaults to current directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
