//! Streaming delimited-text parser
//!
//! Reads the header row once, then yields one [`ParsedRecord`] per data row.
//! Only the current record is held in memory; the stream is single-pass and
//! cannot be rewound without reopening the source.

use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use std::collections::HashMap;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Read buffer for the underlying reader (64 KiB)
const READ_BUFFER_BYTES: usize = 1 << 16;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Uploaded file is empty")]
    EmptySource,

    #[error("Malformed delimited text near line {line}: {source}")]
    Malformed {
        line: u64,
        #[source]
        source: csv_async::Error,
    },
}

impl From<csv_async::Error> for ParseError {
    fn from(source: csv_async::Error) -> Self {
        let line = source.position().map(|p| p.line()).unwrap_or(0);
        Self::Malformed { line, source }
    }
}

/// One data row keyed by header name
///
/// Fields missing from a short row are simply absent. Fields past the end of
/// the header row have no name and are kept, in order, in `unmapped`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    pub fields: HashMap<String, String>,
    pub unmapped: Vec<String>,
}

impl ParsedRecord {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// Lazy record stream over an async byte source
pub struct RecordStream<R> {
    reader: AsyncReader<R>,
    headers: Vec<String>,
    record: StringRecord,
    records_read: u64,
}

impl<R> RecordStream<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Open the stream and capture the header row
    ///
    /// Header names are kept exactly as written, duplicates included.
    pub async fn open(source: R) -> Result<Self, ParseError> {
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            // Ragged rows are passed through rather than aborting the upload
            .flexible(true)
            .buffer_capacity(READ_BUFFER_BYTES)
            .create_reader(source);

        let mut headers: Vec<String> = reader
            .headers()
            .await?
            .iter()
            .map(str::to_string)
            .collect();

        // A lone empty field is a blank line, not a column
        if matches!(headers.as_slice(), [only] if only.is_empty()) {
            headers.clear();
        }

        Ok(Self {
            reader,
            headers,
            record: StringRecord::new(),
            records_read: 0,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data records yielded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Read the next data record, or `None` at end of input
    pub async fn next_record(&mut self) -> Result<Option<ParsedRecord>, ParseError> {
        if !self.reader.read_record(&mut self.record).await? {
            return Ok(None);
        }
        self.records_read += 1;

        let mut parsed = ParsedRecord {
            fields: HashMap::with_capacity(self.headers.len()),
            unmapped: Vec::new(),
        };

        for (idx, value) in self.record.iter().enumerate() {
            match self.headers.get(idx) {
                // Later columns with the same name overwrite earlier ones
                Some(name) => {
                    parsed.fields.insert(name.clone(), value.to_string());
                }
                None => parsed.unmapped.push(value.to_string()),
            }
        }

        Ok(Some(parsed))
    }
}
