#![crate_name = "germplasm"]
//! Ingestion and validation of survey data for germplasm collections.
//!
//! Marker scores, allele frequencies, phenotypic traits and precomputed
//! distances are loaded into immutable, validated tables that address
//! their items by a dense integer ID `0..n`. Tables describing the same
//! collection are combined into a [`CompositeDataset`], which reconciles
//! the item headers each of them carries.

use ndarray::ArrayView1;
use std::ops::Range;

pub mod prelude;

pub mod dataset;
pub mod distance;
pub mod error;
pub mod frequency;
pub mod gower;
pub mod header;
pub mod markers;
pub mod observable;
pub mod phenotype;

pub use dataset::CompositeDataset;
pub use distance::{DistanceMatrix, MatrixEncoding, DISTANCE_TOLERANCE};
pub use error::{DataError, ErrorClass, Result};
pub use frequency::{FrequencyTable, Marker, SUM_TOLERANCE};
pub use gower::gower_distances;
pub use header::{Header, Headers, Registry};
pub use phenotype::{DataType, Feature, FeatureKind, PhenotypeTable, Value};

/// Datasets that address their items through a [`Registry`].
pub trait HasHeaders {
    fn registry(&self) -> &Registry;

    /// Number of items.
    fn size(&self) -> usize {
        self.registry().size()
    }

    fn ids(&self) -> Range<usize> {
        self.registry().ids()
    }

    fn header(&self, id: usize) -> Result<Option<&Header>> {
        self.registry().header(id)
    }

    fn name(&self, id: usize) -> Result<Option<&str>> {
        self.registry().name(id)
    }
}

pub trait HasMarkers {
    fn number_of_markers(&self) -> usize;

    fn marker_name(&self, marker: usize) -> Result<Option<&str>>;

    fn number_of_alleles(&self, marker: usize) -> Result<usize>;

    fn allele_name(&self, marker: usize, allele: usize) -> Result<Option<&str>>;

    /// Sum of the allele counts of all markers.
    fn total_number_of_alleles(&self) -> usize;
}

pub trait HasFrequencies: HasMarkers {
    /// Frequencies of all alleles of `marker` for item `id`.
    fn allele_frequencies(
        &self,
        id: usize,
        marker: usize,
    ) -> Result<ArrayView1<'_, Option<f64>>>;

    /// Frequency of one allele, `None` when missing.
    fn frequency(&self, id: usize, marker: usize, allele: usize) -> Result<Option<f64>> {
        let frequencies = self.allele_frequencies(id, marker)?;
        frequencies
            .get(allele)
            .copied()
            .ok_or(DataError::NoSuchAllele {
                marker,
                allele,
                count: frequencies.len(),
            })
    }
}

pub trait HasDistances {
    /// Distance between items `a` and `b`.
    fn distance(&self, a: usize, b: usize) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_traits_are_object_safe() -> Result<(), Box<dyn Error>> {
        let cells = vec![vec![vec![Some(1.0)]]];
        let table = FrequencyTable::from_frequencies(cells, None, None, None)?;
        let frequencies: &dyn HasFrequencies = &table;
        assert_eq!(frequencies.frequency(0, 0, 0)?, Some(1.0));
        let headers: &dyn HasHeaders = &table;
        assert_eq!(headers.ids(), 0..1);
        Ok(())
    }
}
