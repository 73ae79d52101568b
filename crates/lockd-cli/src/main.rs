use clap::{Parser, Subcommand};
use lockd_core::RuntimeSettings;

mod bridge;
mod commands;

#[derive(Parser)]
#[command(name = "lockd-cli", version, about = "LOCKD site governor CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Governor configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Governed sites
    Site {
        #[command(subcommand)]
        action: commands::site::SiteAction,
    },
    /// Timed access passes
    Pass {
        #[command(subcommand)]
        action: commands::pass::PassAction,
    },
    /// Daily rations and overtime
    Ration {
        #[command(subcommand)]
        action: commands::ration::RationAction,
    },
    /// Feelings log
    Feeling {
        #[command(subcommand)]
        action: commands::feeling::FeelingAction,
    },
    /// Send one raw JSON request (e.g. '{"action":"getAllPasses"}')
    Message {
        /// Request JSON
        json: String,
    },
    /// Run the native-messaging host on stdin/stdout
    Serve,
}

/// Logs go to stderr; stdout carries command output or native messages.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env("LOCKD_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}

fn main() {
    let cli = Cli::parse();

    let settings = RuntimeSettings::load();
    let default_filter = settings
        .as_ref()
        .ok()
        .and_then(|s| s.log_filter.clone())
        .unwrap_or_else(|| "info".to_string());
    init_tracing(&default_filter);
    let settings = settings.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "using default runtime settings");
        RuntimeSettings::default()
    });

    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action, &settings),
        Commands::Site { action } => commands::site::run(action, &settings),
        Commands::Pass { action } => commands::pass::run(action, &settings),
        Commands::Ration { action } => commands::ration::run(action, &settings),
        Commands::Feeling { action } => commands::feeling::run(action, &settings),
        Commands::Message { json } => commands::message::run(&json, &settings),
        Commands::Serve => commands::serve::run(&settings),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
