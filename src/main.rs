// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Result};
use log::{error, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};

use crate::app_config::{load_api_key, Config, LogLevel};
use crate::app_controller::{Controller, OutputPaths};

mod app_config;
mod app_controller;
mod checkpoint;
mod errors;
mod keywords;
mod merger;
mod orchestrator;
mod providers;
mod subtitle_processor;
mod translation_service;

/// CLI wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a bilingual subtitle track (default command)
    #[command(alias = "generate")]
    Generate(GenerateArgs),

    /// Generate shell completions for bisub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Input SRT file to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output bilingual SRT path (default: <input>_bilingual.srt)
    #[arg(long)]
    output_srt: Option<PathBuf>,

    /// Output JSON path (default: <input>_bilingual.json)
    #[arg(long)]
    output_json: Option<PathBuf>,

    /// Records per remote-call chunk (changing this resets chunk progress)
    #[arg(short, long)]
    chunk_size: Option<usize>,

    /// Primary model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Secondary model for the single per-chunk fallback attempt
    #[arg(long)]
    fallback_model: Option<String>,

    /// Manual terminology, comma-separated "term:description" pairs
    #[arg(short, long)]
    terms: Option<String>,

    /// Enable the second-pass review stage
    #[arg(short, long)]
    review: bool,

    /// Disable splitting long records into sub-line segments
    #[arg(long)]
    no_split: bool,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// bisub - Bilingual Subtitle Generator
///
/// Turns a monolingual SRT transcript into a bilingual subtitle track using
/// the Gemini API, with automatic keyword extraction and checkpoint resume.
#[derive(Parser, Debug)]
#[command(name = "bisub")]
#[command(version = "1.0.0")]
#[command(about = "AI-powered bilingual subtitle generator with checkpoint resume")]
#[command(long_about = "bisub converts a monolingual SRT transcript into a bilingual subtitle track.

EXAMPLES:
    bisub talk.srt                              # Generate next to the input
    bisub --output-srt out.srt talk.srt         # Explicit SRT output path
    bisub -c 150 talk.srt                       # Smaller chunks, cheaper retries
    bisub -r talk.srt                           # Enable the review pass
    bisub -t \"Rust:the language,WASM:WebAssembly\" talk.srt
    bisub completions bash > bisub.bash         # Generate bash completions

RESUME:
    Progress is checkpointed after every chunk. If a run is interrupted or
    some chunks fail, re-running the identical command resumes and retries
    only the missing chunks.

CREDENTIALS:
    The API key is read from the GEMINI_API_KEY environment variable, or from
    a .env file in the current directory.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input SRT file to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Output bilingual SRT path (default: <input>_bilingual.srt)
    #[arg(long)]
    output_srt: Option<PathBuf>,

    /// Output JSON path (default: <input>_bilingual.json)
    #[arg(long)]
    output_json: Option<PathBuf>,

    /// Records per remote-call chunk (changing this resets chunk progress)
    #[arg(short, long)]
    chunk_size: Option<usize>,

    /// Primary model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Secondary model for the single per-chunk fallback attempt
    #[arg(long)]
    fallback_model: Option<String>,

    /// Manual terminology, comma-separated "term:description" pairs
    #[arg(short, long)]
    terms: Option<String>,

    /// Enable the second-pass review stage
    #[arg(short, long)]
    review: bool,

    /// Disable splitting long records into sub-line segments
    #[arg(long)]
    no_split: bool,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {}\x1B[0m", color, now, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default;
    // the level is updated after the CLI options are parsed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "bisub", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Generate(args)) => run_generate(args).await,
        None => {
            // Default behavior - use top-level args
            let input_path = cli
                .input_path
                .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

            let args = GenerateArgs {
                input_path,
                output_srt: cli.output_srt,
                output_json: cli.output_json,
                chunk_size: cli.chunk_size,
                model: cli.model,
                fallback_model: cli.fallback_model,
                terms: cli.terms,
                review: cli.review,
                no_split: cli.no_split,
                log_level: cli.log_level,
            };
            run_generate(args).await
        }
    }
}

async fn run_generate(options: GenerateArgs) -> Result<()> {
    let mut config = Config::default();

    if let Some(cmd_log_level) = &options.log_level {
        config.log_level = cmd_log_level.clone().into();
        log::set_max_level(config.log_level.to_level_filter());
    }

    if let Some(chunk_size) = options.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(model) = options.model {
        config.primary_model = model;
    }
    if let Some(fallback) = options.fallback_model {
        config.fallback_model = fallback;
    }
    config.user_terms = options.terms;
    config.review = options.review;
    config.split_segments = !options.no_split;

    // Fatal input checks happen before any remote work
    validate_input(&options.input_path)?;

    config.api_key = load_api_key().map_err(|e| {
        error!("{}", e);
        e
    })?;

    let outputs = OutputPaths::resolve(&options.input_path, options.output_srt, options.output_json);

    let controller = Controller::with_config(config)?;
    match controller.run(&options.input_path, outputs).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e)
        }
    }
}

/// Missing or empty input is a fatal, immediate termination
fn validate_input(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!("Input file not found: {}", input.display()));
    }

    let metadata = std::fs::metadata(input)?;
    if !metadata.is_file() {
        return Err(anyhow!("Input path is not a file: {}", input.display()));
    }
    if metadata.len() == 0 {
        warn!("Input file has no content");
        return Err(anyhow!("Input file is empty: {}", input.display()));
    }

    Ok(())
}
