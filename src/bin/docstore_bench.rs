//! docstore-bench Binary
//!
//! Connects to the store and times every operation once, in order.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use docstore_bench::bench::{run_all, summary};
use docstore_bench::config::{BenchConfig, BenchConfigBuilder};
use docstore_bench::operations::{self, Operation};
use docstore_bench::Client;
use tracing_subscriber::{fmt, EnvFilter};

/// Which store the operations run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Cloud Datastore REST API (or its emulator)
    Remote,
    /// In-process store
    Memory,
}

/// Document-store transaction and concurrency benchmark
#[derive(Parser, Debug)]
#[command(name = "docstore-bench")]
#[command(about = "Times batch writes and reads under different transaction and concurrency strategies")]
#[command(version)]
struct Args {
    /// Store to run against
    #[arg(short, long, value_enum, default_value = "remote")]
    backend: BackendKind,

    /// Service-account credential file
    #[arg(long, env = "CREDENTIAL_FILE_PATH")]
    credential_file: Option<PathBuf>,

    /// Datastore emulator address (host:port)
    #[arg(long, env = "DATASTORE_EMULATOR_HOST")]
    emulator_host: Option<String>,

    /// OAuth2 bearer token, used instead of minting one from the credential file
    #[arg(long, env = "DATASTORE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Project id (defaults to the credential file's)
    #[arg(short, long)]
    project: Option<String>,

    /// Run only the named operations (repeatable)
    #[arg(short, long)]
    only: Vec<String>,

    /// Print the operation names and exit
    #[arg(long)]
    list: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,docstore_bench=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    if args.list {
        for operation in operations::all() {
            println!("{}", operation.name);
        }
        return;
    }

    let selected = match select_operations(&args.only) {
        Ok(ops) => ops,
        Err(unknown) => {
            tracing::error!("Unknown operation: {} (see --list)", unknown);
            std::process::exit(1);
        }
    };

    tracing::info!("docstore-bench v{}", docstore_bench::VERSION);

    let client = match connect(&args) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to create client: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Running {} operations against {:?}", selected.len(), client);

    let reports = run_all(&selected, &client);
    println!("{}", summary(&reports));
}

/// Build the client for the chosen backend
fn connect(args: &Args) -> docstore_bench::Result<Client> {
    let mut builder = BenchConfigBuilder::from_config(BenchConfig::from_env());
    if let Some(path) = &args.credential_file {
        builder = builder.credential_path(path);
    }
    if let Some(host) = &args.emulator_host {
        builder = builder.emulator_host(host);
    }
    if let Some(token) = &args.access_token {
        builder = builder.access_token(token);
    }
    if let Some(project) = &args.project {
        builder = builder.project_id(project);
    }
    let config = builder.build();

    match args.backend {
        BackendKind::Remote => Client::connect(&config),
        BackendKind::Memory => {
            let (client, _store) = Client::in_memory();
            Ok(client)
        }
    }
}

/// All operations, or only the named ones in the order given
fn select_operations(only: &[String]) -> Result<Vec<Operation>, String> {
    if only.is_empty() {
        return Ok(operations::all());
    }
    only.iter()
        .map(|name| operations::find(name).ok_or_else(|| name.clone()))
        .collect()
}
