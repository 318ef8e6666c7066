//! StashDB CLI
//!
//! Command-line interface for poking at a store with UTF-8 string
//! payloads: put, get, delete, organize, and space statistics. Each
//! invocation opens the store, runs one operation, and closes it.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use stashdb::{Config, Result, Store, StoreBuffer};

/// StashDB CLI
#[derive(Parser, Debug)]
#[command(name = "stashdb-cli")]
#[command(about = "CLI for the StashDB object store")]
#[command(version)]
struct Args {
    /// Parent directory of the store
    #[arg(short, long, default_value = "./stashdb_data")]
    base_path: PathBuf,

    /// Store name within the base path
    #[arg(short, long, default_value = "default")]
    name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a new value; prints the allocated id
    Put {
        /// The value to store
        value: String,
    },

    /// Print a value by id
    Get {
        /// The id to look up
        id: u64,
    },

    /// Overwrite the value of an existing id
    Set {
        /// The id to update
        id: u64,

        /// The new value
        value: String,
    },

    /// Delete an item by id
    Del {
        /// The id to delete
        id: u64,
    },

    /// Compact: trim files and merge free ranges
    Organize,

    /// Print space statistics
    Stat,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = Config::new(args.name.clone(), args.base_path.clone());
    let mut store = open_string_store(config)?;

    match &args.command {
        Commands::Put { value } => {
            let item = store.store(value.clone())?;
            println!("{}", item.id());
        }
        Commands::Get { id } => {
            let item = store.get(*id)?;
            println!("{}", item.content());
        }
        Commands::Set { id, value } => {
            store.update(*id, value.clone())?;
            println!("OK");
        }
        Commands::Del { id } => {
            store.delete(*id)?;
            println!("OK");
        }
        Commands::Organize => {
            store.organize()?;
            println!("OK");
        }
        Commands::Stat => {
            println!("items:          {}", store.item_count());
            println!("total space:    {}", store.total_space());
            println!("used space:     {}", store.used_space());
            println!("free space:     {}", store.free_space());
            println!("free locations: {}", store.free_location_count());
        }
    }

    store.close()
}

/// Store of UTF-8 strings; a payload is the string's raw bytes
fn open_string_store(config: Config) -> Result<Store<String>> {
    Store::open(
        config,
        |value: &String, buffer: &mut StoreBuffer| buffer.put_bytes(value.as_bytes()),
        |buffer: &mut StoreBuffer| {
            let len = buffer.transferable_data();
            let bytes = buffer.get_bytes(len)?;
            String::from_utf8(bytes.to_vec()).map_err(|e| {
                stashdb::StashError::InvalidArgument(format!("payload is not UTF-8: {}", e))
            })
        },
    )
}
