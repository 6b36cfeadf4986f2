//! I/O module
//!
//! Handles CSV parsing and output, and snapshot storage.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (operation conversion, balance output)
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface
//! - `snapshot_store` - JSON file and in-memory ledger snapshot stores

pub mod async_reader;
pub mod csv_format;
pub mod snapshot_store;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_record, write_balances_csv, CsvRecord};
pub use snapshot_store::{JsonFileStore, MemoryStore};
pub use sync_reader::SyncReader;
