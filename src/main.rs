//! CLI entry point for the vector index.
//!
//! Each command opens the configured index, performs one operation and
//! closes it again, so mutations are persisted before the process exits.

use std::path::PathBuf;

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use sercha_vector::{
    ExitCode, SearchError, Settings, VectorIndex, VectorIndexService, logging,
};
use tracing::debug;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Vector index maintenance tool
#[derive(Parser)]
#[command(
    name = "sercha-vector",
    version = env!("CARGO_PKG_VERSION"),
    about = "Persistent HNSW vector index",
    long_about = "Add, delete and search embeddings in a persistent HNSW index.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom sercha.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Show configuration
    #[command(about = "Display the effective settings")]
    Config,

    /// Store a vector
    #[command(about = "Add or replace the vector stored under an id")]
    Add {
        /// Chunk identifier
        #[arg(long)]
        id: String,

        /// Comma-separated components, e.g. 0.1,-0.2,0.3
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        vector: Vec<f32>,
    },

    /// Remove a vector
    #[command(about = "Delete the vector stored under an id")]
    Delete {
        /// Chunk identifier
        #[arg(long)]
        id: String,
    },

    /// Query the index
    #[command(about = "Find the ids most similar to a query vector")]
    Search {
        /// Comma-separated query components
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        vector: Vec<f32>,

        /// Number of results
        #[arg(short, default_value_t = 10)]
        k: usize,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    #[command(about = "Display label, tombstone and capacity counters")]
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(config_path) => Settings::load_from(config_path),
        None => Settings::load(),
    };
    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(ExitCode::ConfigError.into());
        }
    };

    logging::init(&settings.logging);

    let code = match run(&cli.command, &settings) {
        Ok(code) => code,
        Err(e) => report(&e),
    };
    if !code.is_success() {
        debug!("Exiting with code {} ({})", i32::from(code), code.description());
    }
    std::process::exit(code.into());
}

fn run(command: &Commands, settings: &Settings) -> anyhow::Result<ExitCode> {
    if let Commands::Config = command {
        println!("Current Configuration:");
        println!("{}", "=".repeat(50));
        let toml_str =
            toml::to_string_pretty(settings).context("Failed to render configuration")?;
        println!("{toml_str}");
        println!(
            "Precision: {}",
            settings.vector_index.precision.description()
        );
        return Ok(ExitCode::Success);
    }

    let service = VectorIndexService::from_settings(&settings.vector_index)?;
    let outcome = execute(command, &service);
    // The port's close only logs persistence failures.
    let closed = service.engine().close().map_err(SearchError::from);
    let code = outcome?;
    closed?;
    Ok(code)
}

fn execute(command: &Commands, service: &VectorIndexService) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Config => Ok(ExitCode::Success),

        Commands::Add { id, vector } => {
            service.add(id, vector)?;
            println!("Added '{id}' ({} dimensions)", vector.len());
            Ok(ExitCode::Success)
        }

        Commands::Delete { id } => {
            service.delete(id)?;
            println!("Deleted '{id}'");
            Ok(ExitCode::Success)
        }

        Commands::Search { vector, k, json } => {
            let hits = service.search(vector, *k)?;
            if *json {
                let output =
                    serde_json::to_string_pretty(&hits).context("Failed to encode results")?;
                println!("{output}");
            } else if hits.is_empty() {
                println!("No matches");
            } else {
                for (rank, hit) in hits.iter().enumerate() {
                    println!("{:>3}. {:<40} {:.4}", rank + 1, hit.chunk_id, hit.similarity);
                }
            }
            Ok(ExitCode::from_hits(&hits))
        }

        Commands::Stats { json } => {
            let stats = service.stats()?;
            if *json {
                let output =
                    serde_json::to_string_pretty(&stats).context("Failed to encode stats")?;
                println!("{output}");
            } else {
                println!("Path:        {}", service.engine().path().display());
                println!("Dimension:   {}", stats.dimension);
                println!("Precision:   {}", stats.precision.description());
                println!("Capacity:    {}", stats.capacity);
                println!("Live:        {}", stats.live);
                println!("Tombstoned:  {}", stats.tombstoned);
                println!("Next label:  {}", stats.next_label);
            }
            Ok(ExitCode::Success)
        }
    }
}

fn report(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<SearchError>() {
        Some(search_error) => {
            eprintln!("Error [{}]: {search_error}", search_error.status_code());
            for suggestion in search_error.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
            let code = ExitCode::from_error(search_error);
            if code.is_blocking() {
                eprintln!("{}", code.description());
            }
            code
        }
        None => {
            eprintln!("Error: {error:#}");
            ExitCode::GeneralError
        }
    }
}
