//! zipsift - pull matching files out of a ZIP archive and process them

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zipsift::{
    PipelineConfig, PipelineError, PipelineRunner, RunReport, SelectiveExtractor, Settings,
    WalkOrder,
};

#[derive(Parser)]
#[command(name = "zipsift")]
#[command(version)]
#[command(about = "Extract matching files from ZIP archives into a throwaway workspace and process them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, process and clean up one or more archives
    Run {
        /// ZIP archives to process
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// Password for encrypted archives
        #[arg(short, long, env = "ZIPSIFT_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Extension to extract, including the dot (default: .csv)
        #[arg(short, long)]
        extension: Option<String>,

        /// Create workspaces here instead of the system temp directory
        #[arg(long)]
        temp_dir: Option<PathBuf>,

        /// Process directories level by level instead of depth first
        #[arg(long)]
        breadth_first: bool,

        /// Maximum archives processed at once (defaults to CPU thread count)
        #[arg(short = 'j', long)]
        concurrent: Option<usize>,
    },

    /// List the entries of an archive that would be extracted
    List {
        /// ZIP archive to inspect
        archive: PathBuf,

        /// Extension to match, including the dot (default: .csv)
        #[arg(short, long)]
        extension: Option<String>,
    },

    /// Show or change the stored defaults
    Settings {
        /// Default extension to extract, including the dot
        #[arg(long)]
        extension: Option<String>,

        /// Default directory for workspaces
        #[arg(long)]
        temp_dir: Option<PathBuf>,

        /// Copy buffer size in bytes
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Default number of archives processed at once
        #[arg(short = 'j', long)]
        concurrent: Option<usize>,

        /// Discard all stored values before applying the others
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(if cli.verbose { "zipsift=debug".parse()? } else { "zipsift=info".parse()? }),
        )
        .init();

    let settings = Settings::load();

    match cli.command {
        Commands::Run {
            archives,
            password,
            extension,
            temp_dir,
            breadth_first,
            concurrent,
        } => {
            let mut config = PipelineConfig::from_settings(&settings);
            if let Some(extension) = extension {
                config.extension = extension;
            }
            if let Some(temp_dir) = temp_dir {
                config.temp_root = temp_dir;
            }
            if breadth_first {
                config.walk_order = WalkOrder::BreadthFirst;
            }

            // Default to CPU thread count
            let thread_count = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4);
            let concurrent = concurrent.or(settings.concurrent).unwrap_or(thread_count).max(1);

            let runner = PipelineRunner::new(&config).context("Invalid configuration")?;
            run_archives(&runner, archives, password, concurrent).await?;
        }

        Commands::List { archive, extension } => {
            let mut config = PipelineConfig::from_settings(&settings);
            if let Some(extension) = extension {
                config.extension = extension;
            }
            config.validate().context("Invalid configuration")?;

            let extractor = SelectiveExtractor::from_config(&config);
            let names = extractor.matching_entries(&archive)?;
            for name in &names {
                println!("{}", name);
            }
            eprintln!("\nTotal: {} {} file(s)", names.len(), extractor.extension());
        }

        Commands::Settings {
            extension,
            temp_dir,
            buffer_size,
            concurrent,
            reset,
        } => {
            let path = Settings::settings_path()?;
            let changed = reset
                || extension.is_some()
                || temp_dir.is_some()
                || buffer_size.is_some()
                || concurrent.is_some();

            let mut settings = if reset { Settings::default() } else { settings };
            if changed {
                if extension.is_some() {
                    settings.default_extension = extension;
                }
                if temp_dir.is_some() {
                    settings.temp_root = temp_dir;
                }
                if buffer_size.is_some() {
                    settings.buffer_size = buffer_size;
                }
                if concurrent.is_some() {
                    settings.concurrent = concurrent;
                }

                settings.validate().context("Refusing to save invalid settings")?;
                settings.save()?;
                println!("Settings saved");
            }

            println!("Settings file: {}", path.display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }

    Ok(())
}

async fn run_archives(
    runner: &PipelineRunner,
    archives: Vec<PathBuf>,
    password: Option<String>,
    concurrent: usize,
) -> Result<()> {
    let pb = ProgressBar::new(archives.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} | {msg}")?
            .progress_chars("=>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let results: Vec<(PathBuf, Result<RunReport, PipelineError>)> = stream::iter(archives)
        .map(|archive| {
            let password = password.clone();
            let pb = pb.clone();
            async move {
                let result = runner.run(&archive, password).await;
                pb.inc(1);
                pb.set_message(archive.display().to_string());
                (archive, result)
            }
        })
        .buffer_unordered(concurrent)
        .collect()
        .await;

    pb.finish_and_clear();

    let mut rejected = 0;
    let mut not_started = 0;
    let mut with_failures = 0;

    println!("=== Summary ===");
    for (archive, result) in &results {
        match result {
            Ok(report) => {
                let status = if report.is_clean() { "OK" } else { "PARTIAL" };
                println!(
                    "{:>8}  {} ({} extracted, {} processed)",
                    status,
                    archive.display(),
                    report.files_extracted(),
                    report.files_processed()
                );
                for failure in &report.failures {
                    println!("          {} failed: {}", failure.stage, failure.message);
                }
                if !report.is_clean() {
                    with_failures += 1;
                }
            }
            Err(e) if e.is_caller_error() => {
                rejected += 1;
                println!("{:>8}  {}: {}", "INVALID", archive.display(), e);
            }
            Err(e) => {
                not_started += 1;
                println!("{:>8}  {}: {}", "ERROR", archive.display(), e);
            }
        }
    }

    if with_failures > 0 {
        println!("\n{} archive(s) had contained failures. See log output for details.", with_failures);
    }

    if rejected + not_started > 0 {
        bail!(
            "{} archive(s) rejected, {} could not get a workspace",
            rejected,
            not_started
        );
    }

    Ok(())
}
