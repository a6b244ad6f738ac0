use anyhow::Result;
use clap::Parser;
use graceful_shutdown::{
    callbacks, GracefulConfig, GracefulShutdown, PosixSignalManager, ShutdownError,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "graceful-shutdown")]
#[command(about = "Runs cleanup commands when the host is asked to terminate")]
#[command(version)]
#[command(long_about = "Waits for SIGTERM/SIGINT or an autoscaling termination lifecycle hook, \
runs the configured cleanup commands concurrently, keeps the lifecycle action alive with \
heartbeats while they run, and completes it once every command has returned.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "graceful-shutdown.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Write logs to a file instead of stderr
    #[arg(long, value_name = "PATH", help = "Append log output to this file")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Initialize logging; the guard flushes the file writer when dropped
    let guard = init_logging(&args)?;

    info!("Starting graceful-shutdown v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Load and validate configuration
    let config = match GracefulConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    // Create the orchestrator and route operational errors to the log
    let orchestrator = Arc::new(GracefulShutdown::with_config(&config.shutdown));
    orchestrator.set_error_handler(Arc::new(|e: &ShutdownError| {
        error!("Shutdown error: {}", e);
    }));

    // Trigger sources
    orchestrator.register_manager(Arc::new(PosixSignalManager::new()));
    if config.lifecycle.enabled {
        register_lifecycle_manager(&orchestrator, &config)?;
    }

    // Cleanup work
    for callback in callbacks::from_config(&config.callbacks) {
        orchestrator.register_callback(callback);
    }
    info!(
        "Registered {} managers and {} callbacks",
        orchestrator.manager_count(),
        orchestrator.callback_count()
    );

    // Start all managers, then block until an episode has run
    orchestrator.start().await.map_err(|e| {
        error!("Failed to start shutdown managers: {}", e);
        e
    })?;

    let report = orchestrator.wait_for_finish().await?;
    info!(
        "Shutdown episode {} triggered by {} finished: {}/{} callbacks succeeded",
        report.id,
        report.manager,
        report.callbacks - report.failed_callbacks,
        report.callbacks
    );

    let exit_code = if report.failed_callbacks == 0 { 0 } else { 1 };

    // Flush the file writer before exiting
    drop(guard);
    std::process::exit(exit_code);
}

#[cfg(feature = "aws")]
fn register_lifecycle_manager(orchestrator: &GracefulShutdown, config: &GracefulConfig) -> Result<()> {
    use graceful_shutdown::{AwsLifecycleApi, LifecycleHookManager};

    let api = Arc::new(AwsLifecycleApi::new()?);
    let manager = LifecycleHookManager::new(config.lifecycle.clone(), api)?;
    orchestrator.register_manager(Arc::new(manager));
    Ok(())
}

#[cfg(not(feature = "aws"))]
fn register_lifecycle_manager(_orchestrator: &GracefulShutdown, _config: &GracefulConfig) -> Result<()> {
    anyhow::bail!("Lifecycle manager enabled but this build has no cloud backend (enable the `aws` feature)")
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("graceful_shutdown={}", log_level)));

    // Pick the output: a non-blocking file writer or stderr
    let (writer, guard) = match &args.log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = args.log_file.is_none();

    // Configure format based on options
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .boxed()
        }
    };

    // Initialize subscriber
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    if args.quiet && (args.debug || args.verbose) {
        warn!("--quiet ignored because a more verbose level was requested");
    }

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# graceful-shutdown configuration file");
    println!("# Environment overrides use GRACEFUL_<SECTION>__<KEY>, e.g. GRACEFUL_LIFECYCLE__PORT=7878");
    println!();

    // Serialize the built-in defaults so the output always matches the loader
    println!("{}", GracefulConfig::default().to_toml()?);
    Ok(())
}
