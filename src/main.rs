//! Wallet Ledger CLI
//!
//! Replays wallet operations from a CSV file and prints final balances.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > balances.csv
//! cargo run -- --strategy async --batch-size 2000 operations.csv > balances.csv
//! cargo run -- --data-dir ./ledger --log-format json --log-level info operations.csv
//! ```
//!
//! Input columns are `type,user,peer,amount`; output columns are
//! `username,wallet,bank`, sorted by username. Logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, unreadable snapshot, output failure, etc.)

use std::process;
use std::sync::Arc;
use wallet_ledger::cli;
use wallet_ledger::core::{SnapshotStore, Wallet};
use wallet_ledger::io::{JsonFileStore, MemoryStore};
use wallet_ledger::logging::init_logging;
use wallet_ledger::strategy;

fn main() {
    let args = cli::parse_args();
    init_logging(&args.log_level, args.log_format);

    let store: Arc<dyn SnapshotStore> = match &args.data_dir {
        Some(dir) => match JsonFileStore::new(dir) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => Arc::new(MemoryStore::new()),
    };

    let wallet = match Wallet::builder().store(store).build() {
        Ok(wallet) => Arc::new(wallet),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let config = match args.strategy {
        cli::StrategyType::Async => Some(args.to_batch_config()),
        cli::StrategyType::Sync => None,
    };
    let strategy = strategy::create_strategy(args.strategy, config);

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&wallet, &args.input_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
