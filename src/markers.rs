//! Infers marker boundaries from flat column labels.
//!
//! Consecutive columns of one marker share a label prefix, for example
//! `M1-1`, `M1-2` or `M2.a`, `M2.b`, `M2.c`. The suffix starts at the last
//! `-`, `_` or `.` of the label; a label without one of those is a marker
//! on its own.

use crate::error::{DataError, Result};
use std::collections::HashSet;

const SEPARATORS: [char; 3] = ['-', '_', '.'];

/// Marker name a column label belongs to.
pub fn marker_name(label: &str) -> Result<&str> {
    let name = match label.rfind(|c| SEPARATORS.contains(&c)) {
        Some(idx) => &label[..idx],
        None => label,
    }
    .trim();
    if name.is_empty() || name.chars().all(|c| SEPARATORS.contains(&c)) {
        return Err(DataError::InvalidMarkerName {
            column: label.into(),
        });
    }
    Ok(name)
}

/// Groups column labels into markers, in first-seen order.
///
/// Returns each marker name with the number of consecutive columns it
/// spans. A marker whose columns are interrupted by another marker is an
/// error.
pub fn group_columns<S: AsRef<str>>(labels: &[S]) -> Result<Vec<(String, usize)>> {
    let mut groups: Vec<(String, usize)> = Vec::new();
    let mut seen = HashSet::new();
    for label in labels {
        let name = marker_name(label.as_ref())?;
        if let Some((current, count)) = groups.last_mut() {
            if current.as_str() == name {
                *count += 1;
                continue;
            }
        }
        if !seen.insert(name.to_string()) {
            return Err(DataError::DuplicateMarker {
                marker: name.into(),
            });
        }
        groups.push((name.into(), 1));
    }
    Ok(groups)
}
