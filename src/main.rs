//! herakles-thp-exporter - version 0.1.0
//!
//! Transparent huge page utilization exporter with tracing logging.
//! This is the main entry point that starts the sampler, serves the report
//! over HTTP and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod source;
mod startup_checks;
mod state;

use axum::{routing::get, Router};
use clap::{Parser, ValueEnum};
use herakles_thp_exporter::{Sampler, ScanEngine, ScanStats, SnapshotStore, SystemClock};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, level_filters::LevelFilter};

use cli::{Args, Commands, LogLevel};
use commands::{
    command_check, command_config, command_generate_testdata, command_test, GenerateOptions,
};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{
    health_handler, metrics_handler, root_handler, snapshot_handler, thp_utilization_handler,
};
use metrics::{TelemetryMetrics, ThpMetrics};
use source::open_memory_source;
use state::AppState;

/// Effective log level: CLI > config file > info.
fn resolve_log_level(config: &Config, args: &Args) -> LogLevel {
    if let Some(level) = &args.log_level {
        return level.clone();
    }
    config
        .log_level
        .as_deref()
        .and_then(|s| LogLevel::from_str(s, true).ok())
        .unwrap_or(LogLevel::Info)
}

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config, args: &Args) {
    let level = resolve_log_level(config, args);
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        // Config generation and requirement checks don't need a valid config
        match command {
            Commands::Config {
                output,
                format,
                commented,
            } => return command_config(output.clone(), format.clone(), *commented),
            Commands::CheckRequirements => {
                setup_logging(&Config::default(), &args);
                println!("🔍 Checking Runtime Requirements");
                println!("================================\n");

                match startup_checks::validate_requirements() {
                    Ok(_) => {
                        println!("\n✅ All requirements met - ready for production!");
                        std::process::exit(0);
                    }
                    Err(e) => {
                        eprintln!("\n❌ Requirements check failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            _ => {
                // Other commands need config validation
            }
        }

        let config = load_validated_config(&args)?;
        setup_logging(&config, &args);

        return match command {
            Commands::Check { memory, proc, all } => command_check(*memory, *proc, *all, &config),

            Commands::Test {
                iterations,
                verbose,
            } => command_test(*iterations, *verbose, &config),

            Commands::GenerateTestdata {
                output,
                nodes,
                regions_per_node,
                blocks_per_region,
                block_pages,
            } => command_generate_testdata(
                output.clone(),
                GenerateOptions {
                    nodes: *nodes,
                    regions_per_node: *regions_per_node,
                    blocks_per_region: *blocks_per_region,
                    block_pages: *block_pages,
                },
            ),

            Commands::Config { .. } => unreachable!("Config handled above"),
            Commands::CheckRequirements => unreachable!("CheckRequirements handled above"),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);

    info!("Starting herakles-thp-exporter");

    // Live memory needs root and the kernel interfaces; synthetic layouts don't
    if config.test_data_file.is_none() {
        if let Err(e) = startup_checks::validate_requirements() {
            error!("❌ Startup validation failed: {}", e);
            error!("   The exporter will start but the histogram may stay empty!");
        }
    }

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Open the memory source and build the engine; both fail only at startup
    let source = open_memory_source(&config)?;
    let geometry = config.geometry(Some(source.block_pages));
    let memory_source = source.memory.name();
    let store = Arc::new(SnapshotStore::new(geometry.bucket_count));
    let stats = Arc::new(ScanStats::new());

    let engine = ScanEngine::new(
        source.memory,
        Arc::new(SystemClock),
        geometry,
        store.clone(),
    )?;
    let sampler = Sampler::new(engine, config.interval(), stats.clone()).start();

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = ThpMetrics::new(&registry)?;
    let telemetry = if config.enable_telemetry.unwrap_or(true) {
        Some(TelemetryMetrics::new(&registry)?)
    } else {
        debug!("Telemetry metrics disabled");
        None
    };
    debug!("All metrics registered successfully");

    let state = Arc::new(AppState {
        registry,
        metrics,
        telemetry,
        store,
        stats,
        geometry,
        config: Arc::new(config.clone()),
        memory_source,
        start_time: Instant::now(),
    });

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/thp_utilization", get(thp_utilization_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/metrics", get(metrics_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!(
        "herakles-thp-exporter listening on http://{}:{}",
        bind_ip_str, port
    );

    let server = axum::serve(listener, app);

    let served = tokio::select! {
        result = server => result,
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
            Ok(())
        }
    };

    info!("Stopping sampler");
    sampler.stop().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("herakles-thp-exporter stopped gracefully");
    Ok(())
}
