//! Reading the delimited text layouts.
//!
//! Rows are read with the `csv` crate and cleaned cell by cell before the
//! layout specific parsers turn them into validated tables. The parsers
//! only see rows, so callers with their own tokenizer can feed them
//! directly.

use crate::distance::{DistanceMatrix, MatrixEncoding};
use crate::error::{DataError, Result};
use crate::frequency::{FrequencyCells, FrequencyTable, ObservationCells};
use crate::header::{Header, Headers};
use crate::markers;
use crate::HasHeaders;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// One row of cleaned cells, `None` for empty cells.
pub type Row = Vec<Option<String>>;

const ID_COLUMN: &str = "ID";
const NAME_COLUMN: &str = "NAME";
const ALLELE_ROW: &str = "ALLELE";

/// Cell contents of the column-grouped marker layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenotypeFormat {
    /// Allele symbols, one column per observation slot.
    Default,
    /// Numeric frequencies, one column per allele.
    Frequency,
}

/// Whether a distance file starts with a row of item names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamesRow {
    /// Decided from the row lengths the encoding implies; when those are
    /// inconclusive, a first row that is not fully numeric holds names.
    Auto,
    Present,
    Absent,
}

/// Reader settings that can be stored alongside other configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub delimiter: char,
    pub names_row: NamesRow,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            names_row: NamesRow::Auto,
        }
    }
}

/// Trims a raw cell and strips one pair of matching quotes.
///
/// Returns `None` for cells that are empty afterwards.
pub fn clean_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find(|&&q| trimmed.len() >= 2 && trimmed.starts_with(q) && trimmed.ends_with(q))
        .map_or(trimmed, |_| &trimmed[1..trimmed.len() - 1]);
    if unquoted.is_empty() {
        None
    } else {
        Some(unquoted.to_string())
    }
}

/// Builds readers for the delimited layouts.
pub struct CsvBuilder {
    delimiter: u8,
    names_row: NamesRow,
}

impl CsvBuilder {
    /// Construct a new Csv builder
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            names_row: NamesRow::Auto,
        }
    }

    pub fn from_options(options: &ReaderOptions) -> Result<Self> {
        if !options.delimiter.is_ascii() {
            return Err(DataError::InvalidDelimiter(options.delimiter));
        }
        Ok(Self {
            delimiter: options.delimiter as u8,
            names_row: options.names_row,
        })
    }

    pub fn options(&self) -> ReaderOptions {
        ReaderOptions {
            delimiter: self.delimiter as char,
            names_row: self.names_row,
        }
    }

    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn names_row(&mut self, names_row: NamesRow) -> &mut Self {
        self.names_row = names_row;
        self
    }

    /// Reads all rows, cleaning every cell and dropping trailing empty cells.
    pub fn from_reader<R: Read>(&self, reader: R) -> Result<Vec<Row>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in rdr.records() {
            let mut row: Row = record?.iter().map(clean_cell).collect();
            let width = row.len();
            while let Some(None) = row.last() {
                row.pop();
            }
            if row.len() < width {
                log::trace!(
                    "row {}: dropped {} trailing empty cells",
                    rows.len(),
                    width - row.len()
                );
            }
            rows.push(row);
        }
        log::trace!("read {} rows", rows.len());
        Ok(rows)
    }

    pub fn read_genotypes<R: Read>(
        &self,
        reader: R,
        format: GenotypeFormat,
    ) -> Result<FrequencyTable> {
        genotypes_from_rows(&self.from_reader(reader)?, format)
    }

    pub fn read_distances<R: Read>(
        &self,
        reader: R,
        encoding: MatrixEncoding,
    ) -> Result<DistanceMatrix> {
        distances_from_rows(&self.from_reader(reader)?, encoding, self.names_row)
    }
}

impl Default for CsvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn cell(row: &[Option<String>], column: usize) -> Option<&str> {
    row.get(column).and_then(Option::as_deref)
}

/// Parses the column-grouped marker layout.
///
/// The header row starts with `ID`, optionally followed by `NAME`; the
/// remaining labels are grouped into markers. The frequency format may
/// name each column's allele in an `ALLELE` row directly below the header.
pub fn genotypes_from_rows(rows: &[Row], format: GenotypeFormat) -> Result<FrequencyTable> {
    let (header, body) = rows
        .split_first()
        .ok_or_else(|| DataError::MissingHeader("file is empty".into()))?;
    if cell(header, 0) != Some(ID_COLUMN) {
        return Err(DataError::MissingHeader(format!(
            "first column must be labelled {}",
            ID_COLUMN
        )));
    }
    let first_data_column = if cell(header, 1) == Some(NAME_COLUMN) {
        2
    } else {
        1
    };
    let labels = (first_data_column..header.len())
        .map(|c| {
            cell(header, c).ok_or_else(|| DataError::InvalidMarkerName {
                column: format!("#{}", c),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let groups = markers::group_columns(labels.as_slice())?;
    if groups.is_empty() {
        return Err(DataError::MissingHeader("no marker columns".into()));
    }
    let width = header.len();

    let (allele_row, body) = match body.split_first() {
        Some((row, rest)) if cell(row, 0) == Some(ALLELE_ROW) => {
            if format != GenotypeFormat::Frequency {
                return Err(DataError::MissingHeader(format!(
                    "{} row is only allowed for frequency data",
                    ALLELE_ROW
                )));
            }
            (Some(row), rest)
        }
        _ => (None, body),
    };
    if body.is_empty() {
        return Err(DataError::Empty);
    }

    let mut headers: Headers = Vec::with_capacity(body.len());
    for (r, row) in body.iter().enumerate() {
        let file_row = r + 1 + usize::from(allele_row.is_some());
        if row.len() > width {
            return Err(DataError::RowLength {
                row: file_row,
                expected: width,
                found: row.len(),
            });
        }
        let identifier = cell(row, 0).ok_or(DataError::MissingValue {
            row: file_row,
            column: 0,
        })?;
        if identifier == ALLELE_ROW {
            return Err(DataError::MissingHeader(format!(
                "{} row must directly follow the header row",
                ALLELE_ROW
            )));
        }
        let name = if first_data_column == 2 {
            cell(row, 1)
        } else {
            None
        };
        headers.push(Some(Header::new(identifier, name)));
    }

    let marker_names = Some(groups.iter().map(|(name, _)| Some(name.clone())).collect());
    let spans = || {
        groups.iter().scan(first_data_column, |start, (_, count)| {
            let span = *start..*start + count;
            *start += count;
            Some(span)
        })
    };

    let table = match format {
        GenotypeFormat::Default => {
            let observed: ObservationCells = body
                .iter()
                .map(|row| {
                    spans()
                        .map(|span| span.map(|c| cell(row, c).map(String::from)).collect())
                        .collect()
                })
                .collect();
            FrequencyTable::from_observations(observed, Some(headers), marker_names)?
        }
        GenotypeFormat::Frequency => {
            let mut frequencies: FrequencyCells = Vec::with_capacity(body.len());
            for (r, row) in body.iter().enumerate() {
                let file_row = r + 1 + usize::from(allele_row.is_some());
                let item = spans()
                    .map(|span| {
                        span.map(|c| parse_number(row, file_row, c))
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<Vec<_>>>()?;
                frequencies.push(item);
            }
            let allele_names = allele_row.map(|row| {
                spans()
                    .map(|span| span.map(|c| cell(row, c).map(String::from)).collect())
                    .collect()
            });
            FrequencyTable::from_frequencies(
                frequencies,
                Some(headers),
                marker_names,
                allele_names,
            )?
        }
    };
    Ok(table)
}

fn parse_number(row: &[Option<String>], file_row: usize, column: usize) -> Result<Option<f64>> {
    cell(row, column)
        .map(|value| {
            value.parse::<f64>().map_err(|_| DataError::NotANumber {
                row: file_row,
                column,
                value: value.into(),
            })
        })
        .transpose()
}

/// Whether the first row of a distance file holds item names.
///
/// Triangular encodings start their data with a single value, and a full
/// matrix has as many data rows as values per row, so the row lengths
/// usually decide. Otherwise a first row with any non-numeric cell is
/// taken as names.
fn starts_with_names(rows: &[Row], encoding: MatrixEncoding) -> bool {
    let first = match rows.first() {
        Some(first) => first,
        None => return false,
    };
    let by_shape = match (encoding, first.len()) {
        (_, 0) => None,
        (MatrixEncoding::Lower, 1) => Some(false),
        (MatrixEncoding::LowerDiag, 1) => Some(rows.len() == 2 && rows[1].len() == 1),
        (MatrixEncoding::Lower, _) | (MatrixEncoding::LowerDiag, _) => Some(true),
        (MatrixEncoding::Full, width) if rows.len() == width => Some(false),
        (MatrixEncoding::Full, width) if rows.len() == width + 1 => Some(true),
        (MatrixEncoding::Full, _) => None,
    };
    by_shape.unwrap_or_else(|| {
        first
            .iter()
            .any(|c| c.as_deref().map_or(true, |v| v.parse::<f64>().is_err()))
    })
}

/// Parses the symmetric matrix layout.
pub fn distances_from_rows(
    rows: &[Row],
    encoding: MatrixEncoding,
    names_row: NamesRow,
) -> Result<DistanceMatrix> {
    let has_names = match names_row {
        NamesRow::Present => true,
        NamesRow::Absent => false,
        NamesRow::Auto => starts_with_names(rows, encoding),
    };
    let (names, body) = match rows.split_first() {
        Some((first, rest)) if has_names => (Some(first), rest),
        _ => (None, rows),
    };

    let headers = names
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(c, name)| {
                    name.as_deref()
                        .map(|n| Some(Header::identified(n)))
                        .ok_or(DataError::MissingValue { row: 0, column: c })
                })
                .collect::<Result<Headers>>()
        })
        .transpose()?;

    let offset = usize::from(has_names);
    let values = body
        .iter()
        .enumerate()
        .map(|(r, row)| {
            (0..row.len())
                .map(|c| {
                    parse_number(row, r + offset, c)?.ok_or(DataError::MissingValue {
                        row: r + offset,
                        column: c,
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    DistanceMatrix::decode(encoding, &values, headers)
}

/// Writes a matrix in the symmetric matrix layout.
///
/// Items' identifiers form the names row when every item has a header.
/// Cells are never quoted, so an identifier that would not read back
/// unchanged is an error.
pub fn write_distances<W: Write>(
    matrix: &DistanceMatrix,
    encoding: MatrixEncoding,
    writer: W,
    delimiter: u8,
) -> Result<()> {
    let names: Option<Vec<&str>> = matrix.registry().headers().and_then(|headers| {
        headers
            .iter()
            .map(|h| h.as_ref().map(Header::identifier))
            .collect()
    });
    if let Some(names) = &names {
        for (id, &identifier) in names.iter().enumerate() {
            let breaks_row = identifier
                .contains(|c: char| c == delimiter as char || c == '\n' || c == '\r');
            if breaks_row || clean_cell(identifier).as_deref() != Some(identifier) {
                return Err(DataError::UnwritableIdentifier {
                    id,
                    identifier: identifier.into(),
                });
            }
        }
    }

    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .quote_style(csv::QuoteStyle::Never)
        .delimiter(delimiter)
        .from_writer(writer);
    if let Some(names) = names {
        wtr.write_record(&names)?;
    }
    for row in matrix.encode(encoding) {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}
