use crate::error::{DataError, Result};
use crate::header::{Headers, Registry};
use crate::{HasFrequencies, HasHeaders, HasMarkers};
use ndarray::{s, Array2, ArrayView1};
use std::collections::BTreeSet;
use std::ops::Range;

/// Tolerance on the sum of allele frequencies at one marker.
pub const SUM_TOLERANCE: f64 = 0.01;

/// Raw frequency cells: `frequencies[item][marker][allele]`, `None` is missing.
pub type FrequencyCells = Vec<Vec<Vec<Option<f64>>>>;

/// Raw allele observations: `observed[item][marker][slot]`, `None` is missing.
pub type ObservationCells = Vec<Vec<Vec<Option<String>>>>;

/// A genetic locus and the names of its alleles.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    name: Option<String>,
    alleles: Vec<Option<String>>,
}

impl Marker {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn alleles(&self) -> &[Option<String>] {
        &self.alleles
    }
}

/// Allele frequencies of every item at every marker.
///
/// Stored as an items × alleles matrix, the columns of one marker being a
/// contiguous range.
#[derive(Debug, Clone)]
pub struct FrequencyTable {
    registry: Registry,
    markers: Vec<Marker>,
    loci: Vec<Range<usize>>,
    data: Array2<Option<f64>>,
}

impl FrequencyTable {
    /// Builds a table from raw frequency cells.
    ///
    /// Every item must describe the same markers with the same number of
    /// alleles. Fully observed markers must sum to one within
    /// [`SUM_TOLERANCE`] and are rescaled to sum to exactly one; markers
    /// with a missing allele may sum to less.
    pub fn from_frequencies(
        frequencies: FrequencyCells,
        headers: Option<Headers>,
        marker_names: Option<Vec<Option<String>>>,
        allele_names: Option<Vec<Vec<Option<String>>>>,
    ) -> Result<Self> {
        let registry = Registry::with_headers(frequencies.len(), headers)?;
        let allele_counts: Vec<usize> = frequencies[0].iter().map(Vec::len).collect();

        if let Some(names) = &marker_names {
            if names.len() != allele_counts.len() {
                return Err(DataError::Dimension(format!(
                    "{} marker names given for {} markers",
                    names.len(),
                    allele_counts.len()
                )));
            }
        }
        if let Some(names) = &allele_names {
            if names.len() != allele_counts.len() {
                return Err(DataError::Dimension(format!(
                    "allele names given for {} markers, data has {} markers",
                    names.len(),
                    allele_counts.len()
                )));
            }
            for (m, (alleles, &count)) in names.iter().zip(&allele_counts).enumerate() {
                if alleles.len() != count {
                    return Err(DataError::Dimension(format!(
                        "{} allele names given for marker {} with {} alleles",
                        alleles.len(),
                        m,
                        count
                    )));
                }
            }
        }

        let mut loci = Vec::with_capacity(allele_counts.len());
        let mut start = 0;
        for (m, &count) in allele_counts.iter().enumerate() {
            if count == 0 {
                return Err(DataError::Dimension(format!("marker {} has no alleles", m)));
            }
            loci.push(start..start + count);
            start += count;
        }

        let mut data = Array2::from_elem((registry.size(), start), None);
        for (i, item) in frequencies.iter().enumerate() {
            if item.len() != loci.len() {
                return Err(DataError::Dimension(format!(
                    "item {} has {} markers, expected {}",
                    i,
                    item.len(),
                    loci.len()
                )));
            }
            for (m, (values, range)) in item.iter().zip(&loci).enumerate() {
                if values.len() != range.len() {
                    return Err(DataError::Dimension(format!(
                        "item {} has {} alleles at marker {}, expected {}",
                        i,
                        values.len(),
                        m,
                        range.len()
                    )));
                }
                let normalized = normalize(i, m, values)?;
                let mut row = data.slice_mut(s![i, range.clone()]);
                for (cell, value) in row.iter_mut().zip(normalized) {
                    *cell = value;
                }
            }
        }

        let mut marker_names = marker_names.map(Vec::into_iter);
        let mut allele_names = allele_names.map(Vec::into_iter);
        let markers = loci
            .iter()
            .map(|range| Marker {
                name: marker_names.as_mut().and_then(Iterator::next).flatten(),
                alleles: allele_names
                    .as_mut()
                    .and_then(Iterator::next)
                    .unwrap_or_else(|| vec![None; range.len()]),
            })
            .collect();

        log::debug!(
            "built frequency table: {} items, {} markers, {} alleles",
            registry.size(),
            loci.len(),
            start
        );
        Ok(Self {
            registry,
            markers,
            loci,
            data,
        })
    }

    /// Builds a table from symbolic allele observations.
    ///
    /// The alleles of a marker are the distinct observed symbols in
    /// lexicographic order. An allele's frequency for an item is the share
    /// of that item's observation slots holding it. Items with no
    /// observation at a marker get missing frequencies for all its alleles;
    /// partially observed items get missing frequencies for the alleles
    /// they were not seen with.
    pub fn from_observations(
        observed: ObservationCells,
        headers: Option<Headers>,
        marker_names: Option<Vec<Option<String>>>,
    ) -> Result<Self> {
        if observed.is_empty() {
            return Err(DataError::Empty);
        }
        let n_markers = observed[0].len();
        for (i, item) in observed.iter().enumerate() {
            if item.len() != n_markers {
                return Err(DataError::Dimension(format!(
                    "item {} has {} markers, expected {}",
                    i,
                    item.len(),
                    n_markers
                )));
            }
        }

        let mut frequencies: FrequencyCells = vec![Vec::with_capacity(n_markers); observed.len()];
        let mut allele_names = Vec::with_capacity(n_markers);
        for m in 0..n_markers {
            let slots = observed[0][m].len();
            let mut symbols = BTreeSet::new();
            for (i, item) in observed.iter().enumerate() {
                if item[m].len() != slots {
                    return Err(DataError::VaryingPloidy {
                        item: i,
                        marker: m,
                        expected: slots,
                        found: item[m].len(),
                    });
                }
                symbols.extend(item[m].iter().flatten().map(String::as_str));
            }
            if symbols.is_empty() {
                return Err(DataError::NoMarkerData { marker: m });
            }

            for (i, item) in observed.iter().enumerate() {
                let slot_values = &item[m];
                let any_missing = slot_values.iter().any(Option::is_none);
                let cells = symbols
                    .iter()
                    .map(|&symbol| {
                        let count = slot_values
                            .iter()
                            .flatten()
                            .filter(|s| s.as_str() == symbol)
                            .count();
                        if count == 0 && any_missing {
                            None
                        } else {
                            Some(count as f64 / slots as f64)
                        }
                    })
                    .collect();
                frequencies[i].push(cells);
            }
            allele_names.push(symbols.iter().map(|s| Some(s.to_string())).collect());
        }

        Self::from_frequencies(frequencies, headers, marker_names, Some(allele_names))
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// The full items × alleles frequency matrix.
    pub fn matrix(&self) -> &Array2<Option<f64>> {
        &self.data
    }

    /// Column range of a marker's alleles in [`matrix`](Self::matrix).
    pub fn locus(&self, marker: usize) -> Result<Range<usize>> {
        self.loci
            .get(marker)
            .cloned()
            .ok_or(DataError::NoSuchMarker {
                marker,
                count: self.loci.len(),
            })
    }
}

/// Validates the allele frequencies of one item at one marker and rescales
/// fully observed markers to sum to one.
fn normalize(item: usize, marker: usize, values: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
    let mut sum = 0.0;
    for (allele, value) in values.iter().enumerate() {
        if let Some(v) = *value {
            if !v.is_finite() {
                return Err(DataError::NonFiniteFrequency {
                    item,
                    marker,
                    allele,
                    value: v,
                });
            }
            if v < 0.0 {
                return Err(DataError::NegativeFrequency {
                    item,
                    marker,
                    allele,
                    value: v,
                });
            }
            sum += v;
        }
    }
    if sum > 1.0 + SUM_TOLERANCE {
        return Err(DataError::FrequencySumTooLarge { item, marker, sum });
    }
    if values.iter().any(Option::is_none) {
        return Ok(values.to_vec());
    }
    if sum < 1.0 - SUM_TOLERANCE {
        return Err(DataError::FrequencySumTooSmall { item, marker, sum });
    }
    if sum != 1.0 {
        log::trace!("item {}, marker {}: rescaling frequencies summing to {}", item, marker, sum);
    }
    Ok(values.iter().map(|v| v.map(|v| v / sum)).collect())
}

impl HasHeaders for FrequencyTable {
    fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl HasMarkers for FrequencyTable {
    fn number_of_markers(&self) -> usize {
        self.markers.len()
    }

    fn marker_name(&self, marker: usize) -> Result<Option<&str>> {
        self.locus(marker)?;
        Ok(self.markers[marker].name())
    }

    fn number_of_alleles(&self, marker: usize) -> Result<usize> {
        Ok(self.locus(marker)?.len())
    }

    fn allele_name(&self, marker: usize, allele: usize) -> Result<Option<&str>> {
        let count = self.number_of_alleles(marker)?;
        self.markers[marker]
            .alleles
            .get(allele)
            .map(Option::as_deref)
            .ok_or(DataError::NoSuchAllele {
                marker,
                allele,
                count,
            })
    }

    fn total_number_of_alleles(&self) -> usize {
        self.data.ncols()
    }
}

impl HasFrequencies for FrequencyTable {
    fn allele_frequencies(
        &self,
        id: usize,
        marker: usize,
    ) -> Result<ArrayView1<'_, Option<f64>>> {
        self.registry.check(id)?;
        let range = self.locus(marker)?;
        Ok(self.data.slice(s![id, range]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use std::error::Error;

    fn symbols(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    #[test]
    fn test_observations_to_frequencies() -> Result<(), Box<dyn Error>> {
        let observed = vec![vec![symbols(&["a", "a"])], vec![symbols(&["a", "b"])]];
        let table = FrequencyTable::from_observations(observed, None, None)?;
        assert_eq!(table.number_of_alleles(0)?, 2);
        assert_eq!(table.allele_name(0, 0)?, Some("a"));
        assert_eq!(table.allele_name(0, 1)?, Some("b"));
        assert_eq!(table.frequency(0, 0, 0)?, Some(1.0));
        assert_eq!(table.frequency(0, 0, 1)?, Some(0.0));
        assert_eq!(table.frequency(1, 0, 0)?, Some(0.5));
        assert_eq!(table.frequency(1, 0, 1)?, Some(0.5));
        Ok(())
    }

    #[test]
    fn test_vocabulary_is_sorted() -> Result<(), Box<dyn Error>> {
        let observed = vec![vec![symbols(&["z"])], vec![symbols(&["b"])], vec![symbols(&["m"])]];
        let table = FrequencyTable::from_observations(observed, None, None)?;
        let names: Vec<_> = (0..3).map(|a| table.allele_name(0, a)).collect::<Result<_>>()?;
        assert_eq!(names, vec![Some("b"), Some("m"), Some("z")]);
        Ok(())
    }

    #[test]
    fn test_unobserved_item_is_missing_not_zero() -> Result<(), Box<dyn Error>> {
        let observed = vec![vec![symbols(&["a", "b"])], vec![symbols(&["", ""])]];
        let table = FrequencyTable::from_observations(observed, None, None)?;
        assert_eq!(table.allele_frequencies(1, 0)?.to_vec(), vec![None, None]);
        Ok(())
    }

    #[test]
    fn test_partially_observed_item() -> Result<(), Box<dyn Error>> {
        let observed = vec![vec![symbols(&["a", "b"])], vec![symbols(&["a", ""])]];
        let table = FrequencyTable::from_observations(observed, None, None)?;
        assert_eq!(table.allele_frequencies(1, 0)?.to_vec(), vec![Some(0.5), None]);
        Ok(())
    }

    #[test]
    fn test_varying_ploidy_is_rejected() {
        let observed = vec![vec![symbols(&["a", "b"])], vec![symbols(&["a"])]];
        assert!(matches!(
            FrequencyTable::from_observations(observed, None, None),
            Err(DataError::VaryingPloidy { item: 1, marker: 0, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_marker_without_data_is_rejected() {
        let observed = vec![
            vec![symbols(&["a"]), symbols(&[""])],
            vec![symbols(&["b"]), symbols(&[""])],
        ];
        assert!(matches!(
            FrequencyTable::from_observations(observed, None, None),
            Err(DataError::NoMarkerData { marker: 1 })
        ));
    }

    #[test]
    fn test_frequencies_are_rescaled() -> Result<(), Box<dyn Error>> {
        let cells = vec![vec![vec![Some(0.502), Some(0.503)]]];
        let table = FrequencyTable::from_frequencies(cells, None, None, None)?;
        let row = table.allele_frequencies(0, 0)?;
        let sum: f64 = row.iter().flatten().sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(row[0].unwrap_or(0.0), 0.502 / 1.005, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_missing_allele_keeps_partial_sum() -> Result<(), Box<dyn Error>> {
        let cells = vec![vec![vec![Some(0.3), None, Some(0.2)]]];
        let table = FrequencyTable::from_frequencies(cells, None, None, None)?;
        assert_eq!(
            table.allele_frequencies(0, 0)?.to_vec(),
            vec![Some(0.3), None, Some(0.2)]
        );
        Ok(())
    }

    #[test]
    fn test_invalid_frequencies_name_the_cell() {
        let negative = vec![vec![vec![Some(1.0)]], vec![vec![Some(-0.1)]]];
        assert!(matches!(
            FrequencyTable::from_frequencies(negative, None, None, None),
            Err(DataError::NegativeFrequency { item: 1, marker: 0, allele: 0, .. })
        ));
        let too_large = vec![vec![vec![Some(0.7), None, Some(0.4)]]];
        assert!(matches!(
            FrequencyTable::from_frequencies(too_large, None, None, None),
            Err(DataError::FrequencySumTooLarge { item: 0, marker: 0, .. })
        ));
        let too_small = vec![vec![vec![Some(1.0)], vec![Some(0.5), Some(0.2)]]];
        assert!(matches!(
            FrequencyTable::from_frequencies(too_small, None, None, None),
            Err(DataError::FrequencySumTooSmall { item: 0, marker: 1, .. })
        ));
        let not_finite = vec![vec![vec![Some(f64::NAN)]]];
        assert!(matches!(
            FrequencyTable::from_frequencies(not_finite, None, None, None),
            Err(DataError::NonFiniteFrequency { .. })
        ));
    }

    #[test]
    fn test_name_arrays_must_match_dimensions() {
        let cells = || vec![vec![vec![Some(0.5), Some(0.5)]]];
        assert!(matches!(
            FrequencyTable::from_frequencies(cells(), None, Some(vec![None, None]), None),
            Err(DataError::Dimension(_))
        ));
        assert!(matches!(
            FrequencyTable::from_frequencies(cells(), None, None, Some(vec![vec![None]])),
            Err(DataError::Dimension(_))
        ));
        let ragged = vec![vec![vec![Some(1.0)]], vec![vec![Some(0.5), Some(0.5)]]];
        assert!(matches!(
            FrequencyTable::from_frequencies(ragged, None, None, None),
            Err(DataError::Dimension(_))
        ));
    }

    #[test]
    fn test_out_of_range_lookups() -> Result<(), Box<dyn Error>> {
        let cells = vec![vec![vec![Some(1.0)]]];
        let table = FrequencyTable::from_frequencies(cells, None, None, None)?;
        assert!(matches!(table.frequency(1, 0, 0), Err(DataError::NoSuchEntry { .. })));
        assert!(matches!(table.frequency(0, 1, 0), Err(DataError::NoSuchMarker { .. })));
        assert!(matches!(table.frequency(0, 0, 1), Err(DataError::NoSuchAllele { .. })));
        Ok(())
    }

    fn fully_observed() -> impl Strategy<Value = FrequencyCells> {
        (1usize..4, 1usize..4, 1usize..5).prop_flat_map(|(items, markers, alleles)| {
            prop::collection::vec(
                prop::collection::vec(
                    prop::collection::vec(0.01f64..1.0, alleles).prop_map(|raw| {
                        let total: f64 = raw.iter().sum();
                        raw.into_iter().map(|v| Some(v / total)).collect::<Vec<_>>()
                    }),
                    markers,
                ),
                items,
            )
        })
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(cells in fully_observed()) {
            let table = FrequencyTable::from_frequencies(cells, None, None, None).unwrap();
            let again: FrequencyCells = table
                .registry()
                .ids()
                .map(|i| {
                    (0..table.number_of_markers())
                        .map(|m| table.allele_frequencies(i, m).unwrap().to_vec())
                        .collect()
                })
                .collect();
            let rebuilt = FrequencyTable::from_frequencies(again, None, None, None).unwrap();
            for (a, b) in table.matrix().iter().zip(rebuilt.matrix().iter()) {
                let (a, b) = (a.unwrap(), b.unwrap());
                prop_assert!((a - b).abs() <= 1e-12);
            }
        }
    }
}
