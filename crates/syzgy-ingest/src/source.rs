//! CSV row source
//!
//! Rows are numbered from zero in source order, header excluded. Resuming
//! relies on that order being identical on every run.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::CsvOptions;
use crate::error::IngestResult;

/// One data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Zero-based position among data rows
    pub index: u64,
    /// Field values in column order
    pub fields: Vec<String>,
}

impl Row {
    /// Field at `column`, if the row is long enough
    pub fn field(&self, column: usize) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// Streaming reader over CSV data rows
pub struct CsvSource<R> {
    reader: csv::Reader<R>,
    headers: Option<Vec<String>>,
    next_index: u64,
}

impl CsvSource<File> {
    /// Open a CSV file
    pub fn open(path: impl AsRef<Path>, options: CsvOptions) -> IngestResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file, options)
    }
}

impl<R: Read> CsvSource<R> {
    /// Read CSV from any reader. The header row, when enabled, is consumed here.
    pub fn from_reader(reader: R, options: CsvOptions) -> IngestResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(options.has_headers)
            .flexible(true)
            .from_reader(reader);

        let headers = if options.has_headers {
            Some(reader.headers()?.iter().map(String::from).collect())
        } else {
            None
        };

        Ok(Self {
            reader,
            headers,
            next_index: 0,
        })
    }

    /// Header names, when the source has a header row
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Discard up to `count` rows without decoding them as text.
    /// Returns how many were actually skipped.
    pub fn skip_rows(&mut self, count: u64) -> IngestResult<u64> {
        let mut record = csv::ByteRecord::new();
        let mut skipped = 0;
        while skipped < count && self.reader.read_byte_record(&mut record)? {
            skipped += 1;
        }
        self.next_index += skipped;
        Ok(skipped)
    }

    /// Next data row, or `None` at end of input
    pub fn next_row(&mut self) -> IngestResult<Option<Row>> {
        let mut record = csv::StringRecord::new();
        if !self.reader.read_record(&mut record)? {
            return Ok(None);
        }
        let row = Row {
            index: self.next_index,
            fields: record.iter().map(String::from).collect(),
        };
        self.next_index += 1;
        Ok(Some(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWEETS: &str = "\
sentiment,id,date,query,user,text
0,1467810369,Mon Apr 06,NO_QUERY,alice,\"is upset, can't update\"
4,1467810672,Mon Apr 06,NO_QUERY,bob,going to bed
0,1467810917,Mon Apr 06,NO_QUERY,carol,dived many times
";

    #[test]
    fn reads_headers_and_rows_in_order() {
        let mut source = CsvSource::from_reader(TWEETS.as_bytes(), CsvOptions::default()).unwrap();
        assert_eq!(
            source.headers().unwrap(),
            ["sentiment", "id", "date", "query", "user", "text"]
        );

        let first = source.next_row().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.field(5), Some("is upset, can't update"));

        let second = source.next_row().unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.field(4), Some("bob"));
    }

    #[test]
    fn skip_advances_row_numbers() {
        let mut source = CsvSource::from_reader(TWEETS.as_bytes(), CsvOptions::default()).unwrap();
        assert_eq!(source.skip_rows(2).unwrap(), 2);

        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.index, 2);
        assert_eq!(row.field(4), Some("carol"));
        assert!(source.next_row().unwrap().is_none());
    }

    #[test]
    fn skip_past_end_reports_short_count() {
        let mut source = CsvSource::from_reader(TWEETS.as_bytes(), CsvOptions::default()).unwrap();
        assert_eq!(source.skip_rows(10).unwrap(), 3);
        assert!(source.next_row().unwrap().is_none());
    }

    #[test]
    fn headerless_tab_separated() {
        let options = CsvOptions {
            delimiter: b'\t',
            has_headers: false,
        };
        let mut source = CsvSource::from_reader("a\tb\nc\n".as_bytes(), options).unwrap();
        assert!(source.headers().is_none());
        assert_eq!(source.next_row().unwrap().unwrap().fields, ["a", "b"]);
        assert_eq!(source.next_row().unwrap().unwrap().fields, ["c"]);
    }
}
