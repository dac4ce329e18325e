/// A single logical record: positional string fields, no column names.
pub type Record = Vec<String>;

/// An ordered group of records. Order is preserved from read to import.
pub type Records = Vec<Record>;

/// Splits `records` into consecutive chunks of at most `size` records.
///
/// An empty input yields no chunks; a `size` of zero is treated as one.
pub fn sub_batches(records: &[Record], size: usize) -> impl Iterator<Item = &[Record]> {
    records.chunks(size.max(1))
}
