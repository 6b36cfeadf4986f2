//! Synchronous processing strategy
//!
//! Replays operations one at a time, in file order, on the calling thread.
//! CSV parsing is delegated to `SyncReader`, operation semantics to
//! `Wallet::apply` and output to `csv_format::write_balances_csv`.
//!
//! Memory use does not grow with the input: records are streamed one by one.

use crate::core::Wallet;
use crate::io::csv_format::write_balances_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Sequential processing strategy
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        wallet: &Arc<Wallet>,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), String> {
        let reader = SyncReader::new(input_path)?;

        let mut applied = 0usize;
        let mut failed = 0usize;
        for result in reader {
            match result {
                Ok(record) => match wallet.apply(&record.operation) {
                    Ok(()) => applied += 1,
                    Err(e) => {
                        failed += 1;
                        warn!(line = record.line, error = %e, "operation failed");
                    }
                },
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "skipping operation record");
                }
            }
        }
        info!(applied, failed, "replay finished");

        write_balances_csv(&wallet.accounts(), output)
    }
}
