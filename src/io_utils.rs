//! CSV ingestion and output plumbing for the command-line surface.
//!
//! The reconciliation engine never touches files; everything that turns a
//! path into a [`Dataset`] or writes results back out flows through here:
//!
//! - **Delimiter resolution**: extension-based detection (`.tsv` → tab,
//!   otherwise comma) with manual override.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Null tokens**: empty cells and placeholder tokens such as `NA` or
//!   `NaN` become nulls before type inference.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::dataset::{ColumnKind, Dataset, convert_raw, infer_raw_kind};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub const DEFAULT_NULL_TOKENS: &[&str] = &[
    "NA", "N/A", "NaN", "nan", "-NaN", "null", "NULL", "None", "#N/A", "<NA>", "n/a",
];

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
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
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    })
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer = open_output(path)?;
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub null_tokens: HashSet<String>,
}

impl LoadOptions {
    pub fn new(delimiter: u8, encoding: &'static Encoding, null_tokens: &[String]) -> Self {
        let null_tokens = if null_tokens.is_empty() {
            DEFAULT_NULL_TOKENS.iter().map(|t| t.to_string()).collect()
        } else {
            null_tokens.iter().cloned().collect()
        };
        Self {
            delimiter,
            encoding,
            null_tokens,
        }
    }

    fn is_null(&self, raw: &str) -> bool {
        raw.trim().is_empty() || self.null_tokens.contains(raw.trim())
    }
}

/// Reads a headered CSV into a typed [`Dataset`]. Column kinds are inferred
/// over every non-null cell, so a column is numeric only if all of its values
/// are.
pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let mut reader = open_csv_reader_from_path(path, options.delimiter)?;
    let headers = reader_headers(&mut reader, options.encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;

    let mut raw_rows: Vec<Vec<Option<String>>> = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} in {path:?}", row_idx + 2))?;
        let decoded = decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {} in {path:?}", row_idx + 2))?;
        raw_rows.push(
            decoded
                .into_iter()
                .map(|cell| (!options.is_null(&cell)).then_some(cell))
                .collect(),
        );
    }

    let kinds: Vec<ColumnKind> = (0..headers.len())
        .map(|idx| {
            infer_raw_kind(
                raw_rows
                    .iter()
                    .filter_map(|row| row.get(idx).and_then(|cell| cell.as_deref())),
            )
        })
        .collect();
    debug!(
        "Inferred column kinds for {path:?}: {:?}",
        headers.iter().zip(&kinds).collect::<Vec<_>>()
    );

    let mut dataset =
        Dataset::new(headers).with_context(|| format!("Validating headers for {path:?}"))?;
    for raw in raw_rows {
        let row = raw
            .into_iter()
            .zip(&kinds)
            .map(|(cell, kind)| cell.map(|text| convert_raw(&text, *kind)))
            .collect();
        dataset.push_row(row)?;
    }
    Ok(dataset)
}
