//! I/O utilities for CSV decoding, delimiter/encoding candidates, and
//! writing datasets back in their source encoding.
//!
//! - **Candidates**: the loader walks [`ENCODING_CANDIDATES`] x
//!   [`DELIMITER_CANDIDATES`] until a parse yields more than one column.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`.
//!   Latin-1 and CP1252 both resolve to `windows-1252` under the WHATWG
//!   label table.
//! - **Quoting**: CSV output uses `QuoteStyle::Necessary` so a rewritten file
//!   stays byte-compatible with what spreadsheet tools produce.

use std::{
    io::{self, Read, Write},
    path::Path,
};

use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const ENCODING_CANDIDATES: &[&str] = &["utf-8", "latin1", "cp1252"];
pub const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t'];

/// Lower-cased extension including the leading dot, e.g. `.csv`.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub fn resolve_encoding(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Decodes a whole file, failing when the bytes are not valid in `encoding`.
/// A byte-order mark is honoured and stripped.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

/// Parses decoded CSV text into headers and rows. Entirely blank rows are
/// skipped.
pub fn parse_csv_text(text: &str, delimiter: u8) -> csv::Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = open_csv_reader(text.as_bytes(), delimiter);
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

pub fn open_csv_writer<W>(
    inner: W,
    delimiter: u8,
    encoding: &'static Encoding,
) -> csv::Writer<Box<dyn Write>>
where
    W: Write + 'static,
{
    let writer: Box<dyn Write> = if encoding == UTF_8 {
        Box::new(inner)
    } else {
        Box::new(TranscodingWriter::new(inner, encoding))
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(writer)
}

/// Re-encodes UTF-8 output into a legacy encoding, buffering partial
/// multi-byte sequences across `write` calls.
struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            buffer: Vec::new(),
        }
    }

    fn flush_buffer(&mut self, force: bool) -> io::Result<()> {
        let valid_up_to = match std::str::from_utf8(&self.buffer) {
            Ok(_) => self.buffer.len(),
            Err(err) => {
                if err.error_len().is_some() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "Invalid UTF-8 sequence in output stream",
                    ));
                }
                err.valid_up_to()
            }
        };
        if valid_up_to > 0 {
            let pending: Vec<u8> = self.buffer.drain(..valid_up_to).collect();
            let text = std::str::from_utf8(&pending)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.encode_and_write(text)?;
        }
        if force && !self.buffer.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Incomplete UTF-8 sequence at end of output stream",
            ));
        }
        Ok(())
    }

    fn encode_and_write(&mut self, text: &str) -> io::Result<()> {
        let (encoded, _output_encoding, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to encode text using {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(encoded.as_ref())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.flush_buffer(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer(true)?;
        self.inner.flush()
    }
}
