//! FastConvert CLI - Parallel Batch Image Converter
//!
//! Converts every image in a directory into one target format, writing the
//! results to `<dir>/<format>` and reporting per-file failures at the end.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use tracing::{info, warn};

use fastconvert::parallel::speed_text;
use fastconvert::{
    init_with_config, BatchConverter, Config, ConvertError, FailureCopyReport, NoopObserver,
    ProcessSummary, ProgressBarObserver, ProgressObserver, StopSignal, TargetFormat, WebpPreset,
};

/// Exit status when the run was stopped before every file was handled
const EXIT_INCOMPLETE: i32 = 2;

#[cfg(feature = "heif")]
const LONG_ABOUT: &str = "FastConvert converts every supported image in a directory (JPEG, PNG, \
                          WebP, GIF, TIFF, BMP, HEIC/HEIF) into a single target format. Results \
                          go to <DIR>/<format>; name clashes get a numeric suffix and a failing \
                          file never stops the rest of the batch.";

#[cfg(not(feature = "heif"))]
const LONG_ABOUT: &str = "FastConvert converts every supported image in a directory (JPEG, PNG, \
                          WebP, GIF, TIFF, BMP) into a single target format. Results go to \
                          <DIR>/<format>; name clashes get a numeric suffix and a failing file \
                          never stops the rest of the batch.\n\n\
                          NOTE: this build has no HEIC/HEIF decoder. .heic and .heif files are \
                          still picked up but each one is reported as a failed conversion. \
                          Rebuild with `--features heif` (needs the system libheif) to convert them.";

/// FastConvert - Parallel Batch Image Converter
#[derive(Parser)]
#[command(
    name = "fastconvert",
    version,
    about = "Convert a folder of images to PNG, JPEG or WebP in parallel",
    long_about = LONG_ABOUT
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory containing the images to convert
    #[arg(value_name = "DIR")]
    input: Option<PathBuf>,

    /// Target format: png, jpg (jpeg) or webp
    #[arg(short, long, value_name = "FORMAT")]
    format: Option<String>,

    /// WebP quality (1-100, 100 = lossless)
    #[arg(
        short,
        long,
        value_name = "QUALITY",
        value_parser = clap::value_parser!(u8).range(1..=100),
        conflicts_with = "preset"
    )]
    quality: Option<u8>,

    /// Named WebP quality preset (see `fastconvert presets`)
    #[arg(short, long, value_name = "NAME")]
    preset: Option<String>,

    /// JPEG quality (1-100)
    #[arg(long, value_name = "QUALITY", value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: Option<u8>,

    /// Process directories recursively
    #[arg(short = 'R', long)]
    recursive: bool,

    /// Number of concurrent workers (default: logical CPU count)
    #[arg(short, long, value_name = "COUNT")]
    workers: Option<usize>,

    /// Keep original dimensions instead of downscaling
    #[arg(long)]
    no_limit: bool,

    /// Downscale so the long side fits this many pixels
    #[arg(long, value_name = "PIXELS", conflicts_with = "no_limit")]
    max_dimension: Option<u32>,

    /// Give up on a single file after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Copy originals that failed to convert into <DIR>/errors
    #[arg(long)]
    copy_failures: bool,

    /// Show what would be converted without converting
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// List WebP quality presets
    Presets,
    /// Validate configuration file
    Config {
        /// Configuration file to validate
        file: PathBuf,
    },
    /// Generate example configuration file
    ExampleConfig {
        /// Output file path
        #[arg(short, long, default_value = "fastconvert.toml")]
        output: PathBuf,
        /// Use YAML format instead of TOML
        #[arg(long)]
        yaml: bool,
    },
    /// Show system information and capabilities
    Info,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", style("Error").red().bold(), describe(&e));
            1
        }
    };
    process::exit(code);
}

fn describe(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ConvertError>() {
        Some(convert_error) => convert_error.user_message(),
        None => format!("{:#}", error),
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    if let Some(command) = &cli.command {
        handle_subcommand(command)?;
        return Ok(0);
    }

    let Some(input) = cli.input.clone() else {
        bail!("An input directory is required (run with --help for usage information)");
    };

    let config = build_config(&cli)?;
    init_with_config(&config.logging)?;

    let copy_failures = config.processing.copy_failures;
    let batch = BatchConverter::new(&input, config)?;

    if cli.dry_run {
        let tasks = batch.discover()?;
        if cli.json {
            let paths: Vec<_> = tasks.iter().map(|t| t.path()).collect();
            println!("{}", serde_json::to_string_pretty(&paths)?);
        } else {
            println!("{} files would be converted into {}:",
                     style(tasks.len()).bold(),
                     batch.output_dir().display());
            for task in &tasks {
                println!("  {}", task.path().display());
            }
        }
        return Ok(0);
    }

    let stop = StopSignal::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing files already in progress");
                stop.cancel();
            }
        }
    });

    let observer: Arc<dyn ProgressObserver> = if cli.json || cli.quiet {
        Arc::new(NoopObserver)
    } else {
        Arc::new(ProgressBarObserver::new(cli.verbose))
    };

    let summary = batch.run(observer, &stop).await?;

    let report = if copy_failures && summary.has_failures() {
        Some(batch.copy_failures(&summary)?)
    } else {
        None
    };

    if cli.json {
        let output = serde_json::json!({
            "output_dir": batch.output_dir(),
            "summary": &summary,
            "failure_copy": &report,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !cli.quiet {
        print_summary(&summary, &batch.output_dir(), report.as_ref());
    }

    Ok(if summary.is_complete() { 0 } else { EXIT_INCOMPLETE })
}

/// Config file (if any) with command-line overrides applied
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            info!("Loaded configuration from: {:?}", path);
            config
        }
        None => Config::default(),
    };

    let conversion = &mut config.conversion;
    if let Some(format) = &cli.format {
        conversion.format = format.parse::<TargetFormat>()?;
    }
    if let Some(name) = &cli.preset {
        conversion.quality = WebpPreset::from_name(name)?.quality();
    }
    if let Some(quality) = cli.quality {
        conversion.quality = quality;
    }
    if let Some(quality) = cli.jpeg_quality {
        conversion.jpeg_quality = quality;
    }
    if cli.no_limit {
        conversion.no_limit = true;
    }
    if let Some(max_dimension) = cli.max_dimension {
        conversion.max_dimension = max_dimension;
    }

    let processing = &mut config.processing;
    processing.recursive |= cli.recursive;
    processing.copy_failures |= cli.copy_failures;
    if cli.workers.is_some() {
        processing.workers = cli.workers;
    }
    if cli.timeout.is_some() {
        processing.timeout_seconds = cli.timeout;
    }

    if cli.quiet {
        config.logging.level = "error".to_string();
    } else if cli.verbose {
        config.logging.level = "debug".to_string();
    } else if let Ok(filter) = std::env::var("RUST_LOG") {
        config.logging.level = filter;
    }

    config.validate()?;
    Ok(config)
}

/// Handle subcommands
fn handle_subcommand(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Presets => show_presets(),
        Commands::Config { file } => validate_config_file(file)?,
        Commands::ExampleConfig { output, yaml } => generate_example_config(output, *yaml)?,
        Commands::Info => show_system_info(),
    }
    Ok(())
}

/// Show WebP quality presets
fn show_presets() {
    println!("{}", style("WebP Quality Presets:").bold());
    println!();

    for preset in WebpPreset::ALL {
        println!(
            "  {:<16} {:>3}  {}",
            style(preset.name()).cyan().bold(),
            preset.quality(),
            preset.description()
        );
    }

    println!();
    println!("Use {} or {}", style("--preset <NAME>").dim(), style("--quality <1-100>").dim());
}

/// Validate configuration file
fn validate_config_file(file_path: &Path) -> anyhow::Result<()> {
    let config = Config::from_file(file_path)?;
    config.validate()?;

    println!("{}: Configuration file is valid", style("Success").green().bold());
    println!("Format: {}", config.conversion.format);
    match config.conversion.resize_bound() {
        Some(bound) => println!("Max dimension: {}px", bound),
        None => println!("Max dimension: unlimited"),
    }
    println!("Workers: {}", config.processing.worker_count());

    Ok(())
}

/// Generate example configuration file
fn generate_example_config(output_path: &Path, use_yaml: bool) -> anyhow::Result<()> {
    let output_path = if use_yaml && !matches!(extension_of(output_path).as_str(), "yaml" | "yml") {
        output_path.with_extension("yaml")
    } else {
        output_path.to_path_buf()
    };

    let config = Config::default();
    config.to_file(&output_path)?;

    let format = if use_yaml { "YAML" } else { "TOML" };
    println!("{}: Generated example {} configuration: {}",
             style("Success").green().bold(),
             format,
             output_path.display());

    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Show system information
fn show_system_info() {
    use sysinfo::{CpuExt, System, SystemExt};

    println!("{}", style("FastConvert System Information").bold());
    println!();

    println!("{}: {}", style("Version").bold(), fastconvert::VERSION);
    println!();

    let mut system = System::new_all();
    system.refresh_all();

    println!("{}", style("System:").bold());
    if let Some(name) = system.name() {
        println!("  OS: {}", name);
    }
    if let Some(version) = system.os_version() {
        println!("  Version: {}", version);
    }
    println!("  CPUs: {}", system.cpus().len());
    if let Some(cpu) = system.cpus().first() {
        println!("  CPU: {} ({:.2} GHz)", cpu.brand(), cpu.frequency() as f64 / 1000.0);
    }
    println!("  Memory: {:.2} GB total, {:.2} GB available",
             system.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0,
             system.available_memory() as f64 / 1024.0 / 1024.0 / 1024.0);
    println!();

    println!("{}", style("Supported Formats:").bold());
    if cfg!(feature = "heif") {
        println!("  Input: JPEG, PNG, WebP, GIF, TIFF, BMP, HEIC/HEIF");
    } else {
        println!("  Input: JPEG, PNG, WebP, GIF, TIFF, BMP (HEIC needs the `heif` feature)");
    }
    println!("  Output: PNG, JPEG, WebP");
}

/// Print run summary
fn print_summary(summary: &ProcessSummary, output_dir: &Path, report: Option<&FailureCopyReport>) {
    println!();
    if summary.is_complete() {
        println!("{}", style("Conversion Summary:").bold());
    } else {
        println!("{}", style("Conversion Summary (stopped early):").yellow().bold());
    }

    println!("  {}: {}", style("Converted").green(), summary.success_count);
    if summary.failure_count > 0 {
        println!("  {}: {}", style("Failed").red(), summary.failure_count);
        for failed in &summary.failures {
            println!("    {} ({})", failed.path.display(), failed.reason);
        }
    }
    if summary.not_dispatched > 0 {
        println!("  {}: {}", style("Not started").yellow(), summary.not_dispatched);
    }
    println!("  {}: {}", style("Output").blue(), output_dir.display());
    println!("  {}: {:.2}s", style("Duration").blue(), summary.elapsed.as_secs_f64());
    println!(
        "  {}: {}",
        style("Speed").cyan(),
        speed_text(summary.success_count + summary.failure_count, summary.elapsed)
    );

    if let Some(report) = report {
        println!(
            "  {}: {} copied to errors/",
            style("Failed originals").cyan(),
            report.copied.len()
        );
        for error in &report.errors {
            println!("    could not copy {}: {}", error.path.display(), error.message);
        }
    }
}
