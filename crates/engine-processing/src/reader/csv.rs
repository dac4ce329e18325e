use crate::{error::ReadError, reader::RecordReader};
use ::csv::{ErrorKind, Reader, ReaderBuilder, StringRecord};
use engine_core::connectors::source::{CsvConfig, Source, SourceReader};
use model::records::record::Record;
use std::sync::Arc;

/// Delimited-text records read straight off a byte source.
///
/// Every record must have as many fields as the first one; any other
/// record is reported as a continue error and skipped by the batch reader.
pub struct CsvRecordReader {
    source: Arc<dyn Source>,
    reader: Reader<SourceReader>,
    record: StringRecord,
    expected_fields: Option<usize>,
    position: u64,
}

impl CsvRecordReader {
    pub fn new(source: Arc<dyn Source>) -> Self {
        let config = source.config().csv.clone().unwrap_or_default();
        Self::with_config(source, &config)
    }

    pub fn with_config(source: Arc<dyn Source>, config: &CsvConfig) -> Self {
        let mut builder = ReaderBuilder::new();
        builder
            .has_headers(config.with_header)
            .flexible(true)
            .comment(config.comment.and_then(ascii_byte));
        if let Some(delimiter) = config.delimiter.and_then(ascii_byte) {
            builder.delimiter(delimiter);
        }

        Self {
            reader: builder.from_reader(SourceReader::new(source.clone())),
            source,
            record: StringRecord::new(),
            expected_fields: None,
            position: 0,
        }
    }

    fn consumed(&mut self) -> usize {
        let now = self.reader.position().byte();
        let n = now.saturating_sub(self.position);
        self.position = now;
        n as usize
    }
}

fn ascii_byte(c: char) -> Option<u8> {
    u8::try_from(c).ok().filter(u8::is_ascii)
}

impl RecordReader for CsvRecordReader {
    fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    fn read(&mut self) -> Result<(usize, Record), ReadError> {
        match self.reader.read_record(&mut self.record) {
            Ok(false) => Err(ReadError::Eof),
            Ok(true) => {
                let bytes = self.consumed();
                let fields = self.record.len();
                let expected = *self.expected_fields.get_or_insert(fields);
                if fields != expected {
                    return Err(ReadError::Continue {
                        bytes,
                        reason: format!(
                            "line {}: expected {expected} fields, found {fields}",
                            self.reader.position().line()
                        ),
                    });
                }
                Ok((bytes, self.record.iter().map(str::to_string).collect()))
            }
            Err(e) => {
                let bytes = self.consumed();
                match e.kind() {
                    ErrorKind::Utf8 { .. } | ErrorKind::UnequalLengths { .. } => {
                        Err(ReadError::Continue {
                            bytes,
                            reason: e.to_string(),
                        })
                    }
                    _ => Err(ReadError::Io {
                        source_name: self.source.name(),
                        message: e.to_string(),
                    }),
                }
            }
        }
    }
}
