//! Entry point for the hydrostore binary.
//! Handles CLI parsing, opens the store and dispatches the inspection commands.

use clap::Parser;
use hydrostore::metadata::{catalog_json, describe_function, print_functions, print_groups, print_values};
use hydrostore::parallel::get_parallel_info;
use hydrostore::{FunctionStore, ParallelConfig, StoreConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let parallel = ParallelConfig::new(args.threads);
    parallel.setup_global_pool()?;
    let info = get_parallel_info();
    debug!(
        threads = info.current_threads,
        cores = info.available_cores,
        "parallel processing environment"
    );

    let config = StoreConfig::default().with_parallel(parallel);
    let store = FunctionStore::open(&args.file, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog_json(&store))?);
        return Ok(());
    }

    let mut handled = false;
    if args.list {
        print_functions(&store);
        handled = true;
    }
    if args.groups {
        print_groups(&store);
        handled = true;
    }
    if let Some(name) = &args.describe {
        describe_function(&store, name)?;
        handled = true;
    }
    if let Some(name) = &args.values {
        print_values(&store, name, &args.filters())?;
        handled = true;
    }
    if !handled {
        print_functions(&store);
    }

    Ok(())
}
