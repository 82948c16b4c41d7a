pub use crate::dataset::CompositeDataset;
pub use crate::distance::{DistanceMatrix, MatrixEncoding};
pub use crate::error::{DataError, ErrorClass};
pub use crate::frequency::FrequencyTable;
pub use crate::gower::gower_distances;
pub use crate::header::{Header, Headers, Registry};
pub use crate::observable::{CsvBuilder, GenotypeFormat, NamesRow};
pub use crate::phenotype::{DataType, Feature, FeatureKind, PhenotypeTable, Value};
pub use crate::{HasDistances, HasFrequencies, HasHeaders, HasMarkers};
