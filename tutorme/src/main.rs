//! tutorme - exam tutorial extraction tool
//!
//! A CLI tool that reconstructs sections, questions, choices, tutorials and
//! answers from exported word-processor documents.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, DriverArg, OutputFormat, SourceFormat};
use std::path::{Path, PathBuf};
use tutorme::classifier::classify_sequence;
use tutorme::config::{TutorMeConfig, CONFIG_FILE_NAME};
use tutorme::export;
use tutorme::pipeline::{self, ParseRequest};
use tutorme::source;

/// Main entry point for the tutorme CLI application
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Run the CLI application
fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Parse {
            input,
            output,
            from,
            format,
            edits,
            config,
            driver,
            diagnostics,
        } => {
            handle_parse_command(ParseArgs {
                input,
                output,
                from,
                format,
                edits,
                config,
                driver,
                diagnostics,
                verbose: cli.verbose,
            })?;
        }

        Commands::Classify {
            input,
            from,
            config,
        } => {
            handle_classify_command(&input, from, config.as_deref())?;
        }

        Commands::InitConfig { path, force } => {
            handle_init_config_command(path, force)?;
        }
    }

    Ok(())
}

/// Log warnings by default; `--verbose` raises the level to info
fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();
}

/// Arguments of the parse command
struct ParseArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    from: Option<SourceFormat>,
    format: Option<OutputFormat>,
    edits: Option<PathBuf>,
    config: Option<PathBuf>,
    driver: Option<DriverArg>,
    diagnostics: Option<PathBuf>,
    verbose: bool,
}

/// Handle the parse command
fn handle_parse_command(args: ParseArgs) -> Result<()> {
    let format = resolve_output_format(args.format, args.output.as_deref())?;

    let mut config = pipeline::load_config(args.config.as_deref(), &args.input)
        .context("Failed to load configuration")?;
    if let Some(driver) = args.driver {
        config.segmenter.driver = driver.into();
    }

    eprintln!("Parsing {}...", args.input.display());
    let request = ParseRequest {
        input: args.input.clone(),
        format: args.from.map(Into::into),
        edits: args.edits,
        config,
    };
    let segmentation = pipeline::run(&request)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;

    let question_count = tutorme::document::total_questions(&segmentation.sections);
    eprintln!(
        "✓ {} sections, {} questions ({} driver)",
        segmentation.sections.len(),
        question_count,
        segmentation.driver
    );
    if args.verbose {
        let stats = &segmentation.stats;
        eprintln!("  - {} blocks ({} blank)", stats.blocks_seen, stats.blank_blocks);
        eprintln!("  - {} page breaks", stats.page_breaks);
        eprintln!("  - {} frame shifts recovered", stats.frame_shifts);
        eprintln!("  - {} preamble blocks skipped", stats.preamble_blocks);
    }
    if !segmentation.diagnostics.is_empty() {
        eprintln!(
            "{} diagnostics ({})",
            segmentation.diagnostics.len(),
            pipeline::summarize_diagnostics(&segmentation.diagnostics)
        );
    }

    if let Some(path) = &args.diagnostics {
        let json = serde_json::to_string_pretty(&segmentation.diagnostics)
            .context("Failed to serialize diagnostics")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write diagnostics to {}", path.display()))?;
    }

    match &args.output {
        Some(path) => {
            export::to_file(&segmentation.sections, format, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✓ Successfully wrote: {}", path.display());
        }
        None => {
            export::write_to(&segmentation.sections, format, std::io::stdout().lock())
                .context("Failed to write to stdout")?;
        }
    }

    Ok(())
}

/// Explicit format, else the output extension, else JSON
fn resolve_output_format(
    format: Option<OutputFormat>,
    output: Option<&Path>,
) -> Result<export::OutputFormat> {
    if let Some(format) = format {
        return Ok(format.into());
    }
    let Some(path) = output else {
        return Ok(export::OutputFormat::Json);
    };
    match path.extension().and_then(|s| s.to_str()) {
        None => Ok(export::OutputFormat::Json),
        Some(ext) => export::OutputFormat::from_path(path).with_context(|| {
            format!(
                "Unknown output format for extension '.{}'. Supported: .json, .js\nUse --format to specify explicitly.",
                ext
            )
        }),
    }
}

/// Handle the classify command
fn handle_classify_command(
    input: &Path,
    from: Option<SourceFormat>,
    config: Option<&Path>,
) -> Result<()> {
    let config = pipeline::load_config(config, input).context("Failed to load configuration")?;

    let blocks = source::load(input, from.map(Into::into), &config.source)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    for (index, signal) in classify_sequence(&blocks) {
        println!(
            "{:>5}  {:<12} {:<10} {}  {}",
            index,
            signal.role,
            signal.evidence,
            if signal.page_break { "⏎" } else { " " },
            blocks[index].head(60)
        );
    }

    Ok(())
}

/// Handle the init-config command
fn handle_init_config_command(path: Option<PathBuf>, force: bool) -> Result<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));
    let target = target_dir.join(CONFIG_FILE_NAME);

    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite",
            target.display()
        );
    }

    TutorMeConfig::default()
        .save(&target)
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!("✓ Wrote {}", target.display());
    Ok(())
}
