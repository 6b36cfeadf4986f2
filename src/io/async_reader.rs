//! Asynchronous CSV reader with batch interface
//!
//! Reads ledger operations from any `futures::io::AsyncRead` in batches,
//! for the async processing strategy.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of OperationRecords
//!                  ↓
//!           csv_format module
//!           (CsvRecord, convert_csv_record)
//! ```

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::OperationRecord;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Keeps a running line count across batches so skipped rows can be
/// reported with their position in the file.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 1,
        }
    }

    /// Read up to `batch_size` operations
    ///
    /// Invalid rows are logged and skipped. Returns an empty vector at end
    /// of input.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<OperationRecord> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            let Some(result) = records.next().await else {
                break;
            };
            self.line_num += 1;

            match result {
                Ok(csv_record) => match convert_csv_record(csv_record, self.line_num) {
                    Ok(record) => batch.push(record),
                    Err(e) => warn!(error = %e, "skipping operation record"),
                },
                Err(e) => warn!(line = self.line_num, error = %e, "CSV parse error"),
            }
        }

        batch
    }
}
