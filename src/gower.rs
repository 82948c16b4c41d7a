//! Gower dissimilarity between items described by mixed-type traits.
//!
//! For every pair of items each feature contributes a distance `d` in
//! `[0, 1]` with a weight `w` of 0 or 1, and the pair's distance is
//! `sum(d * w) / sum(w)`:
//!
//! * binary: `d = 0` when both values are present (`true`), otherwise 1;
//!   two absent (`false`) values carry weight 0.
//! * discrete: `d = 0` for equal values, otherwise 1.
//! * ranged: `d = |a - b| / range`.
//!
//! A missing value on either side gives weight 0. Pairs without any
//! weight are at distance 0.

use crate::distance::DistanceMatrix;
use crate::error::Result;
use crate::phenotype::{Feature, FeatureKind, PhenotypeTable, Value};
use crate::HasHeaders;
use ndarray::Array2;

/// Distance and weight one feature contributes for a pair of values.
fn contribution(feature: &Feature, a: Option<&Value>, b: Option<&Value>) -> (f64, f64) {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return (0.0, 0.0),
    };
    match feature.kind() {
        FeatureKind::Binary => match (a, b) {
            (Value::Bool(true), Value::Bool(true)) => (0.0, 1.0),
            (Value::Bool(false), Value::Bool(false)) => (1.0, 0.0),
            _ => (1.0, 1.0),
        },
        FeatureKind::Discrete => (if a == b { 0.0 } else { 1.0 }, 1.0),
        FeatureKind::Ranged => match (a.as_f64(), b.as_f64(), feature.range()) {
            (Some(x), Some(y), Some(range)) if range > 0.0 => ((x - y).abs() / range, 1.0),
            _ => (0.0, 1.0),
        },
    }
}

/// Pairwise Gower distances between all items of a phenotype table.
///
/// The returned matrix carries the table's headers.
pub fn gower_distances(table: &PhenotypeTable) -> Result<DistanceMatrix> {
    let n = table.size();
    let values = table.values();
    let features = table.features();
    let mut distances = Array2::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let (mut total, mut weight) = (0.0, 0.0);
            for (k, feature) in features.iter().enumerate() {
                let (a, b) = (values[[i, k]].as_ref(), values[[j, k]].as_ref());
                let (d, w) = contribution(feature, a, b);
                total += d * w;
                weight += w;
            }
            let distance = if weight > 0.0 { total / weight } else { 0.0 };
            distances[[i, j]] = distance;
            distances[[j, i]] = distance;
        }
    }
    log::debug!("computed gower distances for {} items over {} features", n, features.len());
    DistanceMatrix::new(distances, table.registry().headers().map(<[_]>::to_vec))
}
