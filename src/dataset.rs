use crate::distance::DistanceMatrix;
use crate::error::{DataError, Result};
use crate::frequency::FrequencyTable;
use crate::header::{merge_headers, Registry};
use crate::phenotype::PhenotypeTable;
use crate::HasHeaders;

/// Genotypes, phenotypes and distances describing the same items.
///
/// The constituents keep their own registries; the composite one holds
/// the headers reconciled across all of them.
#[derive(Debug, Clone)]
pub struct CompositeDataset {
    registry: Registry,
    genotypes: Option<FrequencyTable>,
    phenotypes: Option<PhenotypeTable>,
    distances: Option<DistanceMatrix>,
}

impl CompositeDataset {
    /// Combines up to three datasets of equal size.
    ///
    /// Fails when none is given, when their sizes differ, or when the
    /// headers they give for one item disagree.
    pub fn new(
        genotypes: Option<FrequencyTable>,
        phenotypes: Option<PhenotypeTable>,
        distances: Option<DistanceMatrix>,
    ) -> Result<Self> {
        let parts: Vec<(&'static str, &dyn HasHeaders)> = [
            genotypes.as_ref().map(|g| ("genotype data", g as &dyn HasHeaders)),
            phenotypes.as_ref().map(|p| ("phenotype data", p as &dyn HasHeaders)),
            distances.as_ref().map(|d| ("distance matrix", d as &dyn HasHeaders)),
        ]
        .into_iter()
        .flatten()
        .collect();

        let size = parts
            .first()
            .map(|(_, part)| part.size())
            .ok_or(DataError::Empty)?;
        for &(dataset, part) in &parts {
            if part.size() != size {
                return Err(DataError::ItemCountMismatch {
                    dataset,
                    expected: size,
                    found: part.size(),
                });
            }
        }

        let header_sets: Vec<_> = parts
            .iter()
            .map(|(_, part)| part.registry().headers())
            .collect();
        let headers = merge_headers(size, &header_sets)?;
        let registry = Registry::with_headers(size, headers)?;
        log::debug!("combined {} datasets of {} items", parts.len(), size);
        Ok(Self {
            registry,
            genotypes,
            phenotypes,
            distances,
        })
    }

    pub fn genotypes(&self) -> Option<&FrequencyTable> {
        self.genotypes.as_ref()
    }

    pub fn phenotypes(&self) -> Option<&PhenotypeTable> {
        self.phenotypes.as_ref()
    }

    pub fn distances(&self) -> Option<&DistanceMatrix> {
        self.distances.as_ref()
    }
}

impl HasHeaders for CompositeDataset {
    fn registry(&self) -> &Registry {
        &self.registry
    }
}
