// sheetsink - survey submission intake backed by Google Sheets

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sheetsink::{TabularSink, TabularStore};
use sheetsink_config::{load_dotenv, Backend, Settings};
use sheetsink_server::{build_store, cors_layer, router, serve, AppState, ServerError};
use tracing_subscriber::EnvFilter;

/// Success.
const EXIT_SUCCESS: u8 = 0;
/// Startup or serve failure after the settings were accepted.
const EXIT_ERROR: u8 = 1;
/// Settings file or environment rejected.
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "sheetsink")]
#[command(about = "Append survey submissions to per-user Google Sheets tabs")]
#[command(version)]
struct Cli {
    /// Settings file (default: ~/.config/sheetsink/sheetsink.toml)
    #[arg(long, short = 'c', env = "SHEETSINK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides server.port and $PORT)
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Address to bind (overrides server.bind)
    #[arg(long)]
    bind: Option<String>,

    /// Where rows are written: google or memory
    #[arg(long)]
    backend: Option<Backend>,

    /// Debug logging (ignores RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP intake (default)
    Serve,
    /// Load and validate settings, print the schemas, and exit
    CheckConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    load_dotenv();

    let settings = match resolve_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::CheckConfig => check_config(&settings),
        Command::Serve => run(settings),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e);
            match e {
                ServerError::Config(_) | ServerError::MissingSetting(_) | ServerError::CorsOrigin(_) => {
                    ExitCode::from(EXIT_CONFIG)
                }
                _ => ExitCode::from(EXIT_ERROR),
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // Also installs the `log` bridge for the library crates.
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_settings(cli: &Cli) -> Result<Settings, ServerError> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(bind) = &cli.bind {
        settings.server.bind = bind.clone();
    }
    if let Some(backend) = cli.backend {
        settings.sheets.backend = backend;
    }
    settings.validate()?;
    Ok(settings)
}

fn check_config(settings: &Settings) -> Result<(), ServerError> {
    let registry = settings.registry()?;
    println!("backend: {}", settings.sheets.backend);
    println!("listen:  {}:{}", settings.server.bind, settings.server.port);
    println!("schemas:");
    for name in registry.names() {
        if let Some(schema) = registry.get(name) {
            let marker = if name == registry.default_name() { " (default)" } else { "" };
            println!("  {}{}: {}", name, marker, schema.labels().join(", "));
        }
    }
    Ok(())
}

fn run(settings: Settings) -> Result<(), ServerError> {
    // Built before the runtime starts; the Sheets client owns a blocking HTTP client.
    let store: Arc<dyn TabularStore> = build_store(&settings.sheets)?;
    let sink = TabularSink::new(Arc::clone(&store), settings.style_template())
        .with_layout(settings.layout());
    let state = AppState::new(sink, settings.registry()?);
    let app = router(state, cors_layer(&settings.server.cors_origins)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(&settings.server.bind, settings.server.port, app));
    drop(runtime);
    drop(store);
    result
}
