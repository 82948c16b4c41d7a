use crate::error::{DataError, Result};
use crate::header::{Headers, Registry};
use crate::HasHeaders;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// How a feature is compared between two items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Presence/absence; two absent values carry no information.
    Binary,
    /// Nominal values compared for equality.
    Discrete,
    /// Numeric values scaled by the feature's range.
    Ranged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Integer,
    Double,
    Text,
}

impl DataType {
    fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Double)
    }
}

/// One phenotype cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    fn datatype(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Boolean,
            Self::Int(_) => DataType::Integer,
            Self::Float(_) => DataType::Double,
            Self::Text(_) => DataType::Text,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(v) => Some(v as f64),
            Self::Float(v) => Some(v),
            _ => None,
        }
    }
}

/// A phenotypic trait column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    name: String,
    kind: FeatureKind,
    datatype: DataType,
    min: Option<f64>,
    max: Option<f64>,
}

impl Feature {
    pub fn new(name: &str, kind: FeatureKind, datatype: DataType) -> Self {
        Self {
            name: name.into(),
            kind,
            datatype,
            min: None,
            max: None,
        }
    }

    pub fn binary(name: &str) -> Self {
        Self::new(name, FeatureKind::Binary, DataType::Boolean)
    }

    pub fn discrete(name: &str, datatype: DataType) -> Self {
        Self::new(name, FeatureKind::Discrete, datatype)
    }

    /// Numeric feature; bounds left `None` are taken from the data.
    pub fn ranged(name: &str, datatype: DataType, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            ..Self::new(name, FeatureKind::Ranged, datatype)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Width of a ranged feature's value range.
    pub fn range(&self) -> Option<f64> {
        Some(self.max? - self.min?)
    }

    fn incoherent(&self, reason: &str) -> DataError {
        DataError::IncoherentFeature {
            feature: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn check_declaration(&self) -> Result<()> {
        match self.kind {
            FeatureKind::Binary if self.datatype != DataType::Boolean => {
                Err(self.incoherent("binary features must be boolean"))
            }
            FeatureKind::Ranged if !self.datatype.is_numeric() => {
                Err(self.incoherent("ranged features must be integer or double"))
            }
            FeatureKind::Ranged => {
                if self.min.into_iter().chain(self.max).any(|b| !b.is_finite()) {
                    return Err(self.incoherent("bounds must be finite"));
                }
                if let (Some(min), Some(max)) = (self.min, self.max) {
                    if min > max {
                        return Err(self.incoherent("minimum exceeds maximum"));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Phenotypic trait values, one row per item and one column per feature.
#[derive(Debug, Clone)]
pub struct PhenotypeTable {
    registry: Registry,
    features: Vec<Feature>,
    values: Array2<Option<Value>>,
}

impl PhenotypeTable {
    /// Validates the declared features against the rows.
    ///
    /// Every cell must match its feature's datatype. Missing bounds of
    /// ranged features are inferred from the observed values; declared
    /// bounds must enclose them.
    pub fn new(
        mut features: Vec<Feature>,
        rows: Vec<Vec<Option<Value>>>,
        headers: Option<Headers>,
    ) -> Result<Self> {
        let registry = Registry::with_headers(rows.len(), headers)?;
        for feature in &features {
            feature.check_declaration()?;
        }

        let mut values = Array2::from_elem((rows.len(), features.len()), None);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != features.len() {
                return Err(DataError::RowLength {
                    row: i,
                    expected: features.len(),
                    found: row.len(),
                });
            }
            for (k, value) in row.into_iter().enumerate() {
                if let Some(value) = &value {
                    check_value(i, &features[k], value)?;
                }
                values[[i, k]] = value;
            }
        }

        for (k, feature) in features.iter_mut().enumerate() {
            if feature.kind == FeatureKind::Ranged {
                infer_bounds(feature, values.column(k));
            }
        }

        log::debug!(
            "built phenotype table: {} items, {} features",
            registry.size(),
            features.len()
        );
        Ok(Self {
            registry,
            features,
            values,
        })
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn values(&self) -> &Array2<Option<Value>> {
        &self.values
    }

    pub fn value(&self, id: usize, feature: usize) -> Result<Option<&Value>> {
        self.registry.check(id)?;
        self.values
            .get([id, feature])
            .map(Option::as_ref)
            .ok_or_else(|| {
                DataError::Dimension(format!(
                    "no feature {} (table has {} features)",
                    feature,
                    self.features.len()
                ))
            })
    }
}

fn check_value(item: usize, feature: &Feature, value: &Value) -> Result<()> {
    let invalid = |reason: String| DataError::InvalidFeatureValue {
        item,
        feature: feature.name.clone(),
        reason,
    };
    if value.datatype() != feature.datatype {
        return Err(DataError::ValueType {
            item,
            feature: feature.name.clone(),
            expected: feature.datatype,
            found: value.datatype(),
        });
    }
    if let Some(v) = value.as_f64() {
        if !v.is_finite() {
            return Err(invalid(format!("{} is not finite", v)));
        }
        if feature.min.map_or(false, |min| v < min) || feature.max.map_or(false, |max| v > max) {
            return Err(invalid(format!(
                "{} outside declared bounds [{:?}, {:?}]",
                v, feature.min, feature.max
            )));
        }
    }
    Ok(())
}

fn infer_bounds(feature: &mut Feature, column: ArrayView1<'_, Option<Value>>) {
    if feature.min.is_some() && feature.max.is_some() {
        return;
    }
    let observed: Vec<f64> = column.iter().flatten().filter_map(Value::as_f64).collect();
    let finite = |v: f64| Some(v).filter(|v| v.is_finite());
    if feature.min.is_none() {
        let lowest = observed
            .iter()
            .copied()
            .chain(feature.max)
            .fold(f64::INFINITY, f64::min);
        feature.min = finite(lowest);
    }
    if feature.max.is_none() {
        let highest = observed
            .iter()
            .copied()
            .chain(feature.min)
            .fold(f64::NEG_INFINITY, f64::max);
        feature.max = finite(highest);
    }
    log::debug!(
        "feature '{}': inferred range [{:?}, {:?}]",
        feature.name,
        feature.min,
        feature.max
    );
}

impl HasHeaders for PhenotypeTable {
    fn registry(&self) -> &Registry {
        &self.registry
    }
}
