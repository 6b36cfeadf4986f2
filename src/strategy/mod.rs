//! Processing strategy module for operation replay
//!
//! This module defines the Strategy pattern for complete replay pipelines,
//! covering both CSV parsing and application of each operation to a
//! [`Wallet`]. Different implementations (sequential, async batch) can be
//! selected at runtime.

use crate::cli::StrategyType;
use crate::core::Wallet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete replay pipelines
///
/// Each strategy reads operations from a CSV file, applies them to the
/// given wallet and writes the final balances to output.
pub trait ProcessingStrategy: Send + Sync {
    /// Replay operations from `input_path` and write balances to `output`
    ///
    /// Individual operation failures are logged and do not stop processing.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened
    /// - The async runtime cannot be created
    /// - Output cannot be written
    fn process(
        &self,
        wallet: &Arc<Wallet>,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), String>;
}

/// Create a processing strategy for the given type
///
/// `config` only applies to the async strategy; `None` uses the defaults.
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(config.unwrap_or_default())),
    }
}
