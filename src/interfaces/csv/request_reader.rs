use crate::domain::payment::PaymentRequest;
use crate::error::{PaymentError, Result};
use std::io::Read;

/// Reads payment requests from a CSV source.
///
/// Expected header: `card_number,card_holder,expiry_month,expiry_year,cvv,amount,currency,merchant_id`.
/// Whitespace around fields is trimmed and short rows are reported per row
/// instead of aborting the stream.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    /// Creates a new `RequestReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one request per row.
    pub fn requests(self) -> impl Iterator<Item = Result<PaymentRequest>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
