use std::io::Read;

use crate::domain::bank::BankTransaction;
use crate::error::{LedgerError, Result};

/// Reads bank-statement transactions from a CSV source.
///
/// Wraps `csv::Reader` and yields `Result<BankTransaction>` lazily, so large
/// statements stream without loading fully into memory. Whitespace is
/// trimmed and ragged rows tolerated.
pub struct StatementReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> StatementReader<R> {
    /// Creates a new `StatementReader` from any `Read` source (e.g. File,
    /// Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn transactions(self) -> impl Iterator<Item = Result<BankTransaction>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
