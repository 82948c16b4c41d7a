use crate::error::{DataError, Result};
use crate::header::{Headers, Registry};
use crate::{HasDistances, HasHeaders};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance for symmetry and zero diagonal checks.
pub const DISTANCE_TOLERANCE: f64 = 1e-10;

/// Textual layouts of a symmetric matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatrixEncoding {
    /// Every row holds all `n` values.
    Full,
    /// Row `r` holds the `r + 1` values left of the diagonal of item `r + 1`.
    Lower,
    /// Row `r` holds `r + 1` values, diagonal included.
    LowerDiag,
}

impl MatrixEncoding {
    /// Number of values expected in data row `row` of an `n` item matrix.
    fn row_length(&self, row: usize, n: usize) -> usize {
        match self {
            Self::Full => n,
            Self::Lower | Self::LowerDiag => row + 1,
        }
    }
}

impl FromStr for MatrixEncoding {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FULL" => Ok(Self::Full),
            "LOWER" => Ok(Self::Lower),
            "LOWER_DIAG" => Ok(Self::LowerDiag),
            _ => Err(DataError::UnknownEncoding(s.into())),
        }
    }
}

impl fmt::Display for MatrixEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "FULL",
            Self::Lower => "LOWER",
            Self::LowerDiag => "LOWER_DIAG",
        })
    }
}

/// Validated symmetric distance matrix with zero diagonal.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    registry: Registry,
    distances: Array2<f64>,
}

impl DistanceMatrix {
    /// Wraps a square matrix after checking it is a distance matrix.
    pub fn new(distances: Array2<f64>, headers: Option<Headers>) -> Result<Self> {
        let (rows, cols) = distances.dim();
        if rows != cols {
            return Err(DataError::Dimension(format!(
                "distance matrix has {} rows and {} columns",
                rows, cols
            )));
        }
        if let Some(headers) = &headers {
            if headers.len() != rows {
                return Err(DataError::NameCountMismatch {
                    names: headers.len(),
                    items: rows,
                });
            }
        }
        let registry = Registry::with_headers(rows, headers)?;
        validate(&distances)?;
        log::debug!("built distance matrix: {} items", rows);
        Ok(Self {
            registry,
            distances,
        })
    }

    /// Reconstructs a matrix from its numeric rows.
    ///
    /// `rows` holds the data rows only; `headers`, when given, must have one
    /// entry per item.
    pub fn decode(
        encoding: MatrixEncoding,
        rows: &[Vec<f64>],
        headers: Option<Headers>,
    ) -> Result<Self> {
        let last = rows
            .last()
            .ok_or_else(|| DataError::Dimension("distance matrix has no data rows".into()))?;

        for (r, row) in rows.iter().enumerate() {
            let expected = encoding.row_length(r, rows[0].len());
            if row.len() != expected {
                return Err(DataError::RowLength {
                    row: r,
                    expected,
                    found: row.len(),
                });
            }
        }

        let (n, expected_rows) = match encoding {
            MatrixEncoding::Lower => (last.len() + 1, last.len()),
            MatrixEncoding::LowerDiag => (rows.len(), rows.len()),
            MatrixEncoding::Full => (rows.len(), rows[0].len()),
        };
        if rows.len() != expected_rows {
            return Err(DataError::Dimension(format!(
                "{} encoding of {} items needs {} rows, found {}",
                encoding,
                n,
                expected_rows,
                rows.len()
            )));
        }
        if let Some(headers) = &headers {
            if headers.len() != n {
                return Err(DataError::NameCountMismatch {
                    names: headers.len(),
                    items: n,
                });
            }
        }

        let mut distances = Array2::zeros((n, n));
        match encoding {
            MatrixEncoding::Full => {
                for (r, row) in rows.iter().enumerate() {
                    for (c, &value) in row.iter().enumerate() {
                        distances[[r, c]] = value;
                    }
                }
            }
            MatrixEncoding::Lower | MatrixEncoding::LowerDiag => {
                let offset = usize::from(encoding == MatrixEncoding::Lower);
                for (r, row) in rows.iter().enumerate() {
                    let item = r + offset;
                    for (c, &value) in row.iter().enumerate() {
                        distances[[item, c]] = value;
                        if c != item {
                            distances[[c, item]] = value;
                        }
                    }
                }
            }
        }
        Self::new(distances, headers)
    }

    /// Numeric rows of this matrix in the given encoding.
    pub fn encode(&self, encoding: MatrixEncoding) -> Vec<Vec<f64>> {
        let n = self.distances.nrows();
        match encoding {
            MatrixEncoding::Full => self
                .distances
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            MatrixEncoding::LowerDiag => (0..n)
                .map(|r| (0..=r).map(|c| self.distances[[r, c]]).collect())
                .collect(),
            MatrixEncoding::Lower => (1..n)
                .map(|r| (0..r).map(|c| self.distances[[r, c]]).collect())
                .collect(),
        }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.distances
    }
}

/// Checks non-negativity, zero diagonal and symmetry of a square matrix.
fn validate(distances: &Array2<f64>) -> Result<()> {
    for ((row, column), &value) in distances.indexed_iter() {
        if !value.is_finite() {
            return Err(DataError::NonFiniteDistance { row, column, value });
        }
        if value < 0.0 {
            return Err(DataError::NegativeDistance { row, column, value });
        }
        if row == column && value.abs() > DISTANCE_TOLERANCE {
            return Err(DataError::NonZeroDiagonal { row, value });
        }
        if column > row {
            let lower = distances[[column, row]];
            if (value - lower).abs() > DISTANCE_TOLERANCE {
                return Err(DataError::Asymmetric {
                    row,
                    column,
                    upper: value,
                    lower,
                });
            }
        }
    }
    Ok(())
}

impl HasHeaders for DistanceMatrix {
    fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl HasDistances for DistanceMatrix {
    fn distance(&self, a: usize, b: usize) -> Result<f64> {
        self.registry.check(a)?;
        self.registry.check(b)?;
        Ok(self.distances[[a, b]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use proptest::prelude::*;
    use std::error::Error;

    const ENCODINGS: [MatrixEncoding; 3] = [
        MatrixEncoding::Full,
        MatrixEncoding::Lower,
        MatrixEncoding::LowerDiag,
    ];

    fn example() -> Array2<f64> {
        arr2(&[[0.0, 1.0, 2.0], [1.0, 0.0, 3.0], [2.0, 3.0, 0.0]])
    }

    #[test]
    fn test_decode_full() -> Result<(), Box<dyn Error>> {
        let rows = vec![vec![0.0, 1.0, 2.0], vec![1.0, 0.0, 3.0], vec![2.0, 3.0, 0.0]];
        let matrix = DistanceMatrix::decode(MatrixEncoding::Full, &rows, None)?;
        assert_eq!(matrix.matrix(), &example());
        assert_eq!(matrix.distance(0, 2)?, 2.0);
        Ok(())
    }

    #[test]
    fn test_decode_lower() -> Result<(), Box<dyn Error>> {
        let rows = vec![vec![1.0], vec![2.0, 3.0]];
        let matrix = DistanceMatrix::decode(MatrixEncoding::Lower, &rows, None)?;
        assert_eq!(matrix.matrix(), &example());
        Ok(())
    }

    #[test]
    fn test_decode_lower_diag() -> Result<(), Box<dyn Error>> {
        let rows = vec![vec![0.0], vec![1.0, 0.0], vec![2.0, 3.0, 0.0]];
        let headers = vec![
            Some(Header::identified("a")),
            Some(Header::identified("b")),
            Some(Header::identified("c")),
        ];
        let matrix = DistanceMatrix::decode(MatrixEncoding::LowerDiag, &rows, Some(headers))?;
        assert_eq!(matrix.matrix(), &example());
        assert_eq!(matrix.header(2)?.map(Header::identifier), Some("c"));
        Ok(())
    }

    #[test]
    fn test_single_item_lower_diag() -> Result<(), Box<dyn Error>> {
        let matrix = DistanceMatrix::decode(MatrixEncoding::LowerDiag, &[vec![0.0]], None)?;
        assert_eq!(matrix.size(), 1);
        Ok(())
    }

    #[test]
    fn test_row_progression_is_checked() {
        let rows = vec![vec![1.0], vec![2.0, 3.0, 4.0]];
        assert!(matches!(
            DistanceMatrix::decode(MatrixEncoding::Lower, &rows, None),
            Err(DataError::RowLength { row: 1, expected: 2, found: 3 })
        ));
        let rows = vec![vec![0.0, 1.0], vec![1.0]];
        assert!(matches!(
            DistanceMatrix::decode(MatrixEncoding::Full, &rows, None),
            Err(DataError::RowLength { row: 1, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_full_needs_square_rows() {
        let rows = vec![vec![0.0, 1.0, 2.0], vec![1.0, 0.0, 3.0]];
        assert!(matches!(
            DistanceMatrix::decode(MatrixEncoding::Full, &rows, None),
            Err(DataError::Dimension(_))
        ));
    }

    #[test]
    fn test_name_count_differs_from_symmetry_failure() {
        let rows = vec![vec![1.0], vec![2.0, 3.0]];
        let headers = vec![Some(Header::identified("a")), Some(Header::identified("b"))];
        assert!(matches!(
            DistanceMatrix::decode(MatrixEncoding::Lower, &rows, Some(headers)),
            Err(DataError::NameCountMismatch { names: 2, items: 3 })
        ));

        let rows = vec![vec![0.0, 1.0], vec![1.5, 0.0]];
        assert!(matches!(
            DistanceMatrix::decode(MatrixEncoding::Full, &rows, None),
            Err(DataError::Asymmetric { row: 0, column: 1, .. })
        ));
    }

    #[test]
    fn test_invariants_report_position() {
        let rows = vec![vec![0.5], vec![1.0, 0.0]];
        assert!(matches!(
            DistanceMatrix::decode(MatrixEncoding::LowerDiag, &rows, None),
            Err(DataError::NonZeroDiagonal { row: 0, .. })
        ));
        let rows = vec![vec![1.0], vec![-2.0, 3.0]];
        assert!(matches!(
            DistanceMatrix::decode(MatrixEncoding::Lower, &rows, None),
            Err(DataError::NegativeDistance { row: 0, column: 2, .. })
        ));
    }

    #[test]
    fn test_non_finite_distances_are_not_negative() {
        let rows = vec![vec![0.0, f64::INFINITY], vec![f64::INFINITY, 0.0]];
        assert!(matches!(
            DistanceMatrix::decode(MatrixEncoding::Full, &rows, None),
            Err(DataError::NonFiniteDistance { row: 0, column: 1, .. })
        ));
        let rows = vec![vec![f64::NAN]];
        let err = DistanceMatrix::decode(MatrixEncoding::Lower, &rows, None).unwrap_err();
        assert!(matches!(err, DataError::NonFiniteDistance { row: 0, column: 1, .. }));
        assert_eq!(err.class(), crate::ErrorClass::Semantic);
    }

    #[test]
    fn test_empty_and_unknown() {
        assert!(matches!(
            DistanceMatrix::decode(MatrixEncoding::Full, &[], None),
            Err(DataError::Dimension(_))
        ));
        assert!(matches!(
            "UPPER".parse::<MatrixEncoding>(),
            Err(DataError::UnknownEncoding(_))
        ));
        assert_eq!("lower_diag".parse::<MatrixEncoding>().ok(), Some(MatrixEncoding::LowerDiag));
    }

    #[test]
    fn test_tolerates_rounding_asymmetry() -> Result<(), Box<dyn Error>> {
        let rows = vec![vec![0.0, 0.3], vec![0.1 + 0.2, 0.0]];
        let matrix = DistanceMatrix::decode(MatrixEncoding::Full, &rows, None)?;
        assert_abs_diff_eq!(matrix.distance(1, 0)?, 0.3, epsilon = 1e-12);
        Ok(())
    }

    fn symmetric() -> impl Strategy<Value = Array2<f64>> {
        (1usize..7).prop_flat_map(|n| {
            prop::collection::vec(0.0f64..100.0, n * n).prop_map(move |values| {
                let mut m = Array2::zeros((n, n));
                for i in 0..n {
                    for j in 0..i {
                        m[[i, j]] = values[i * n + j];
                        m[[j, i]] = values[i * n + j];
                    }
                }
                m
            })
        })
    }

    proptest! {
        #[test]
        fn every_encoding_round_trips(m in symmetric()) {
            let original = DistanceMatrix::new(m.clone(), None).unwrap();
            for encoding in ENCODINGS {
                let rows = original.encode(encoding);
                if encoding == MatrixEncoding::Lower && rows.is_empty() {
                    continue;
                }
                let decoded = DistanceMatrix::decode(encoding, &rows, None).unwrap();
                for (a, b) in decoded.matrix().iter().zip(m.iter()) {
                    prop_assert!((a - b).abs() <= DISTANCE_TOLERANCE);
                }
            }
        }
    }
}
