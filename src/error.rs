use crate::phenotype::DataType;
use thiserror::Error;

/// Broad failure classes of a construction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The text source could not be read.
    Io,
    /// Dimensions, layout or labels do not fit together.
    Structural,
    /// The data parses but violates a numeric or identity invariant.
    Semantic,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no such entry: {id} (dataset has {size} items)")]
    NoSuchEntry { id: usize, size: usize },

    #[error("no such marker: {marker} (dataset has {count} markers)")]
    NoSuchMarker { marker: usize, count: usize },

    #[error("no such allele: {allele} at marker {marker} ({count} alleles)")]
    NoSuchAllele {
        marker: usize,
        allele: usize,
        count: usize,
    },

    #[error("dataset has no items")]
    Empty,

    #[error("dimension mismatch: {0}")]
    Dimension(String),

    #[error("missing header: {0}")]
    MissingHeader(String),

    #[error("row {row} has {found} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("delimiter '{0}' is not a single byte character")]
    InvalidDelimiter(char),

    #[error("unknown matrix encoding '{0}' (expected FULL, LOWER or LOWER_DIAG)")]
    UnknownEncoding(String),

    #[error("invalid marker name in column '{column}'")]
    InvalidMarkerName { column: String },

    #[error("duplicate marker '{marker}', columns must be consecutive")]
    DuplicateMarker { marker: String },

    #[error("duplicate identifier '{identifier}' for items {first} and {second}")]
    DuplicateIdentifier {
        identifier: String,
        first: usize,
        second: usize,
    },

    #[error("no data for marker {marker}")]
    NoMarkerData { marker: usize },

    #[error(
        "item {item} has {found} observations at marker {marker}, other items have {expected}"
    )]
    VaryingPloidy {
        item: usize,
        marker: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}, column {column}: '{value}' is not a valid number")]
    NotANumber {
        row: usize,
        column: usize,
        value: String,
    },

    #[error("row {row}, column {column}: missing value")]
    MissingValue { row: usize, column: usize },

    #[error("item {item}, marker {marker}, allele {allele}: frequency {value} is not finite")]
    NonFiniteFrequency {
        item: usize,
        marker: usize,
        allele: usize,
        value: f64,
    },

    #[error("item {item}, marker {marker}, allele {allele}: negative frequency {value}")]
    NegativeFrequency {
        item: usize,
        marker: usize,
        allele: usize,
        value: f64,
    },

    #[error("item {item}, marker {marker}: allele frequencies sum to {sum}, more than 1")]
    FrequencySumTooLarge { item: usize, marker: usize, sum: f64 },

    #[error(
        "item {item}, marker {marker}: allele frequencies sum to {sum}, \
         less than 1 with no missing values"
    )]
    FrequencySumTooSmall { item: usize, marker: usize, sum: f64 },

    #[error("row {row}, column {column}: distance {value} is not finite")]
    NonFiniteDistance { row: usize, column: usize, value: f64 },

    #[error("row {row}, column {column}: negative distance {value}")]
    NegativeDistance { row: usize, column: usize, value: f64 },

    #[error("row {row}: diagonal value {value} is not zero")]
    NonZeroDiagonal { row: usize, value: f64 },

    #[error("matrix is not symmetric at ({row}, {column}): {upper} vs {lower}")]
    Asymmetric {
        row: usize,
        column: usize,
        upper: f64,
        lower: f64,
    },

    #[error("{names} item names given but the data describes {items} items")]
    NameCountMismatch { names: usize, items: usize },

    #[error("{dataset} has {found} items, expected {expected}")]
    ItemCountMismatch {
        dataset: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("feature '{feature}': {reason}")]
    IncoherentFeature { feature: String, reason: String },

    #[error("item {item}, feature '{feature}': {found:?} value for {expected:?} feature")]
    ValueType {
        item: usize,
        feature: String,
        expected: DataType,
        found: DataType,
    },

    #[error("item {item}, feature '{feature}': {reason}")]
    InvalidFeatureValue {
        item: usize,
        feature: String,
        reason: String,
    },

    #[error(
        "item {id}: identifier '{left}' conflicts with identifier '{right}' \
         (names {left_name:?} and {right_name:?})"
    )]
    IdentifierConflict {
        id: usize,
        left: String,
        right: String,
        left_name: Option<String>,
        right_name: Option<String>,
    },

    #[error("item {id} ('{identifier}'): name '{left}' conflicts with name '{right}'")]
    NameConflict {
        id: usize,
        identifier: String,
        left: String,
        right: String,
    },

    #[error("item {id}: identifier '{identifier}' cannot be written without quoting")]
    UnwritableIdentifier { id: usize, identifier: String },
}

impl DataError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Io(_) | Self::Csv(_) => ErrorClass::Io,
            Self::NonFiniteFrequency { .. }
            | Self::NegativeFrequency { .. }
            | Self::FrequencySumTooLarge { .. }
            | Self::FrequencySumTooSmall { .. }
            | Self::NonFiniteDistance { .. }
            | Self::NegativeDistance { .. }
            | Self::NonZeroDiagonal { .. }
            | Self::Asymmetric { .. }
            | Self::InvalidFeatureValue { .. }
            | Self::IdentifierConflict { .. }
            | Self::NameConflict { .. } => ErrorClass::Semantic,
            _ => ErrorClass::Structural,
        }
    }
}

pub type Result<T, E = DataError> = std::result::Result<T, E>;
