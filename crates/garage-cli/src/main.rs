//! Garage CLI
//!
//! Command-line interface for Garage - families, cars and saved history.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use garage_core::{Config, Seed, Store};

mod commands;
mod logging;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "garage")]
#[command(about = "Garage - local store for families, cars and saved history")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the store
    Init {
        /// JSON file with `families` and `cars` to write on first creation
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Show schema version and row counts
    Status,
    /// Manage car families
    Family {
        #[command(subcommand)]
        command: FamilyCommands,
    },
    /// Manage cars
    Car {
        #[command(subcommand)]
        command: CarCommands,
    },
    /// Manage saved application states
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Manage saved parking
    Parking {
        #[command(subcommand)]
        command: ParkingCommands,
    },
    /// Delete all stored data
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum FamilyCommands {
    /// List families in display order
    #[command(alias = "ls")]
    List,
    /// Show a family
    Show {
        /// Family name
        name: String,
    },
    /// Insert or replace a family from JSON
    Put {
        /// JSON object, e.g. '{"familyName": "Sedan", "order": 1}'
        json: String,
    },
    /// Insert or replace families from a JSON array file (all or nothing)
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Delete a family
    #[command(alias = "rm")]
    Delete {
        /// Family name
        name: String,
    },
    /// Delete all families
    Clear,
}

#[derive(Subcommand)]
enum CarCommands {
    /// List cars
    #[command(alias = "ls")]
    List,
    /// Show a car
    Show {
        /// Car ID
        id: String,
    },
    /// Insert or replace a car from JSON
    Put {
        /// JSON object, e.g. '{"id": "car-1", "family": "Sedan"}'
        json: String,
    },
    /// Insert or replace cars from a JSON array file (all or nothing)
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Delete a car
    #[command(alias = "rm")]
    Delete {
        /// Car ID
        id: String,
    },
    /// Delete all cars
    Clear,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List saved states, newest first
    #[command(alias = "ls")]
    List,
    /// Show a saved state with its payload
    Show {
        /// Saved state ID
        id: i64,
    },
    /// Save a state snapshot
    Save {
        /// Snapshot name
        name: String,
        /// State as a JSON string
        #[arg(short, long, conflicts_with = "file")]
        data: Option<String>,
        /// Read the state from a JSON file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// History size to keep (defaults to state_history_limit)
        #[arg(short, long)]
        keep: Option<usize>,
    },
    /// Delete a saved state
    #[command(alias = "rm")]
    Delete {
        /// Saved state ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum ParkingCommands {
    /// List saved parking, newest first
    #[command(alias = "ls")]
    List {
        /// Only entries with this name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Show a saved parking entry
    Show {
        /// Saved parking ID
        id: i64,
    },
    /// Save a parking entry
    Save {
        /// Entry name
        name: String,
        /// Limit value stored with the entry
        #[arg(short, long)]
        limit: i64,
        /// Free-form memo
        #[arg(short, long)]
        memo: Option<String>,
        /// History size to keep (defaults to parking_history_limit)
        #[arg(short, long)]
        keep: Option<usize>,
    },
    /// Delete a saved parking entry
    #[command(alias = "rm")]
    Delete {
        /// Saved parking ID
        id: i64,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, database_file, state_history_limit, parking_history_limit, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands don't need the store
    if let Commands::Config { command } = &cli.command {
        logging::init(cli.verbose, None);
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    logging::init(cli.verbose, config.log_file.as_deref());

    if let Commands::Init { seed } = cli.command {
        commands::init::run(config, seed, &output)?;
        return Ok(());
    }

    let store = Store::new(config);
    store
        .open(&Seed::empty())
        .context("Failed to open store")?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),   // Handled above
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&store, &output),
        Commands::Family { command } => handle_family_command(command, &store, &output),
        Commands::Car { command } => handle_car_command(command, &store, &output),
        Commands::State { command } => handle_state_command(command, &store, &output),
        Commands::Parking { command } => handle_parking_command(command, &store, &output),
        Commands::Reset { yes } => commands::reset::run(&store, yes, &output),
    }
}

fn handle_family_command(command: FamilyCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        FamilyCommands::List => commands::family::list(store, output),
        FamilyCommands::Show { name } => commands::family::show(store, name, output),
        FamilyCommands::Put { json } => commands::family::put(store, json, output),
        FamilyCommands::Import { file } => commands::family::import(store, file, output),
        FamilyCommands::Delete { name } => commands::family::delete(store, name, output),
        FamilyCommands::Clear => commands::family::clear(store, output),
    }
}

fn handle_car_command(command: CarCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        CarCommands::List => commands::car::list(store, output),
        CarCommands::Show { id } => commands::car::show(store, id, output),
        CarCommands::Put { json } => commands::car::put(store, json, output),
        CarCommands::Import { file } => commands::car::import(store, file, output),
        CarCommands::Delete { id } => commands::car::delete(store, id, output),
        CarCommands::Clear => commands::car::clear(store, output),
    }
}

fn handle_state_command(command: StateCommands, store: &Store, output: &Output) -> Result<()> {
    match command {
        StateCommands::List => commands::state::list(store, output),
        StateCommands::Show { id } => commands::state::show(store, id, output),
        StateCommands::Save {
            name,
            data,
            file,
            keep,
        } => commands::state::save(store, name, data, file, keep, output),
        StateCommands::Delete { id } => commands::state::delete(store, id, output),
    }
}

fn handle_parking_command(
    command: ParkingCommands,
    store: &Store,
    output: &Output,
) -> Result<()> {
    match command {
        ParkingCommands::List { name } => commands::parking::list(store, name, output),
        ParkingCommands::Show { id } => commands::parking::show(store, id, output),
        ParkingCommands::Save {
            name,
            limit,
            memo,
            keep,
        } => commands::parking::save(store, name, limit, memo, keep, output),
        ParkingCommands::Delete { id } => commands::parking::delete(store, id, output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}
