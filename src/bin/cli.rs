//! Catalog Crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use catalog::{
    error::Result,
    models::Config,
    pipeline,
    services::{EvaluationClient, Fetcher, HttpTransport, ProgramCrawler, RetryPolicy},
    storage::{LocalStorage, SnapshotStorage},
    utils::http,
};
use clap::{Parser, Subcommand};

/// Catalog - Program Requirement Crawler
#[derive(Parser, Debug)]
#[command(
    name = "catalog",
    version,
    about = "Crawls a college catalog and normalizes program requirements"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl catalog years into per-year snapshots
    Crawl {
        /// First year id (8 => 2018-2019)
        #[arg(long)]
        start: Option<u32>,

        /// Last year id (default: until listing pages stop answering)
        #[arg(long)]
        end: Option<u32>,

        /// Maximum concurrent requests
        #[arg(long)]
        concurrency: Option<usize>,

        /// Attempts per request
        #[arg(long)]
        retries: Option<u32>,

        /// Stop after this many consecutive listing failures
        #[arg(long)]
        stop_after: Option<u32>,
    },

    /// Clean a course catalog export
    Courses {
        /// Export containing a CourseFullModels array
        #[arg(long, default_value = "courses.json")]
        input: PathBuf,

        /// Output file, relative to the output directory
        #[arg(long, default_value = "courses_cleaned.json")]
        output: String,
    },

    /// Rebuild programs from the evaluation API
    Evaluate {
        /// Year snapshot whose program codes are evaluated
        #[arg(long)]
        programs: Option<PathBuf>,

        /// Program codes to evaluate
        #[arg(long, num_args = 1..)]
        code: Vec<String>,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Stop issuing requests once Ctrl-C is pressed.
fn install_shutdown_handler(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; finishing in-flight requests");
            flag.store(true, Ordering::SeqCst);
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Catalog crawler starting...");

    let mut config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());
    if let Some(dir) = cli.output_dir {
        config.paths.output_dir = dir;
    }

    let storage = Arc::new(LocalStorage::new(&config.paths.output_dir));

    match cli.command {
        Command::Crawl {
            start,
            end,
            concurrency,
            retries,
            stop_after,
        } => {
            if let Some(start) = start {
                config.catalog.start_year_id = start;
            }
            if end.is_some() {
                config.catalog.end_year_id = end;
            }
            if let Some(concurrency) = concurrency {
                config.crawler.max_concurrent = concurrency;
            }
            if let Some(retries) = retries {
                config.crawler.max_retries = retries;
            }
            if let Some(stop_after) = stop_after {
                config.catalog.stop_after_failures = stop_after;
            }
            config.validate()?;

            let config = Arc::new(config);
            let client = http::create_async_client(&config.crawler)?;
            let fetcher = Fetcher::new(
                Arc::new(HttpTransport::new(client)),
                RetryPolicy::from_config(&config.crawler),
                config.crawler.max_concurrent,
            );
            install_shutdown_handler(fetcher.shutdown_handle());

            let crawler = ProgramCrawler::new(Arc::clone(&config), fetcher)?;
            let stats = pipeline::run_crawler(&config, &crawler, storage.as_ref()).await?;

            if stats.cancelled {
                log::warn!("Crawl interrupted");
            } else {
                log::info!("Crawl complete!");
            }
        }

        Command::Courses { input, output } => {
            pipeline::run_courses(&input, &output, storage.as_ref()).await?;
        }

        Command::Evaluate { programs, code } => {
            config.validate()?;

            let mut codes = code;
            if let Some(path) = programs {
                codes.extend(pipeline::program_codes_from_snapshot(&path).await?);
            }
            codes.sort();
            codes.dedup();

            let evaluation = &config.evaluation;
            let client = http::create_async_client(&config.crawler)?;
            let transport = HttpTransport::new(client)
                .with_headers(&evaluation.headers, evaluation.cookie.as_deref())?;
            let fetcher = Fetcher::new(
                Arc::new(transport),
                RetryPolicy::from_config(&config.crawler),
                evaluation.max_concurrent,
            );
            install_shutdown_handler(fetcher.shutdown_handle());

            let storage: Arc<dyn SnapshotStorage> = storage;
            let client = EvaluationClient::new(evaluation.clone(), fetcher, Arc::clone(&storage));
            let report = pipeline::run_evaluation(
                &client,
                storage.as_ref(),
                &evaluation.catalog_year,
                &codes,
                evaluation.max_concurrent,
            )
            .await?;

            if !report.failures.is_empty() {
                log::warn!("{} programs could not be evaluated:", report.failures.len());
                for (code, reason) in &report.failures {
                    log::warn!("  {}: {}", code, reason);
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            if config.evaluation.cookie.is_none() {
                log::warn!("evaluation.cookie is not set; evaluate will likely be rejected");
            }
            log::info!("✓ Config OK");
        }
    }

    log::info!("Done!");

    Ok(())
}
