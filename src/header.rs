use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// Identifies one item across datasets.
///
/// Two headers denote the same item when their identifiers are equal.
/// The display name is optional and only used for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Header {
    identifier: String,
    name: Option<String>,
}

impl Header {
    pub fn new(identifier: &str, name: Option<&str>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.map(Into::into),
        }
    }

    /// A header without a display name.
    pub fn identified(identifier: &str) -> Self {
        Self::new(identifier, None)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Same item, regardless of display name.
    pub fn same_item(&self, other: &Header) -> bool {
        self.identifier == other.identifier
    }
}

/// Per-item headers of one dataset; `None` entries are items without a header.
pub type Headers = Vec<Option<Header>>;

/// Dense ID space `0..size` with an optional header per ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    size: usize,
    headers: Option<Headers>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Registry of `size` items without headers.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_headers(size, None)
    }

    /// Registry of `size` items.
    ///
    /// When headers are given there must be exactly one entry per item and
    /// no identifier may occur twice.
    pub fn with_headers(size: usize, headers: Option<Headers>) -> Result<Self> {
        if size == 0 {
            return Err(DataError::Empty);
        }
        let mut index = HashMap::new();
        if let Some(headers) = &headers {
            if headers.len() != size {
                return Err(DataError::Dimension(format!(
                    "{} headers given for {} items",
                    headers.len(),
                    size
                )));
            }
            for (id, header) in headers.iter().enumerate() {
                if let Some(header) = header {
                    if let Some(first) = index.insert(header.identifier.clone(), id) {
                        return Err(DataError::DuplicateIdentifier {
                            identifier: header.identifier.clone(),
                            first,
                            second: id,
                        });
                    }
                }
            }
        }
        Ok(Self {
            size,
            headers,
            index,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn ids(&self) -> Range<usize> {
        0..self.size
    }

    pub fn check(&self, id: usize) -> Result<()> {
        if id < self.size {
            Ok(())
        } else {
            Err(DataError::NoSuchEntry {
                id,
                size: self.size,
            })
        }
    }

    pub fn header(&self, id: usize) -> Result<Option<&Header>> {
        self.check(id)?;
        Ok(self
            .headers
            .as_ref()
            .and_then(|headers| headers[id].as_ref()))
    }

    pub fn name(&self, id: usize) -> Result<Option<&str>> {
        Ok(self.header(id)?.and_then(Header::name))
    }

    pub fn headers(&self) -> Option<&[Option<Header>]> {
        self.headers.as_deref()
    }

    /// ID of the item with the given unique identifier.
    pub fn id_of(&self, identifier: &str) -> Option<usize> {
        self.index.get(identifier).copied()
    }
}

/// Combines the headers two datasets give for item `id`.
pub fn merge_header(
    id: usize,
    left: Option<&Header>,
    right: Option<&Header>,
) -> Result<Option<Header>> {
    match (left, right) {
        (None, None) => Ok(None),
        (Some(h), None) | (None, Some(h)) => Ok(Some(h.clone())),
        (Some(l), Some(r)) => {
            if !l.same_item(r) {
                return Err(DataError::IdentifierConflict {
                    id,
                    left: l.identifier.clone(),
                    right: r.identifier.clone(),
                    left_name: l.name.clone(),
                    right_name: r.name.clone(),
                });
            }
            match (&l.name, &r.name) {
                (Some(a), Some(b)) if a != b => Err(DataError::NameConflict {
                    id,
                    identifier: l.identifier.clone(),
                    left: a.clone(),
                    right: b.clone(),
                }),
                (Some(_), _) => Ok(Some(l.clone())),
                (None, _) => Ok(Some(r.clone())),
            }
        }
    }
}

/// Merges the header sets of datasets describing the same `size` items.
///
/// Returns `None` when no dataset defines a header for any item.
pub fn merge_headers(size: usize, sets: &[Option<&[Option<Header>]>]) -> Result<Option<Headers>> {
    let mut merged: Headers = vec![None; size];
    for set in sets.iter().flatten() {
        if set.len() != size {
            return Err(DataError::Dimension(format!(
                "{} headers given for {} items",
                set.len(),
                size
            )));
        }
        for (id, header) in set.iter().enumerate() {
            merged[id] = merge_header(id, merged[id].as_ref(), header.as_ref())?;
        }
    }
    if merged.iter().all(Option::is_none) {
        Ok(None)
    } else {
        Ok(Some(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use proptest::prelude::*;
    use std::error::Error;

    #[test]
    fn test_ids_are_contiguous() -> Result<(), Box<dyn Error>> {
        let registry = Registry::new(4)?;
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_out_of_range_id_is_no_such_entry() -> Result<(), Box<dyn Error>> {
        let registry = Registry::with_headers(1, Some(vec![Some(Header::new("a", Some("A")))]))?;
        assert_eq!(registry.name(0)?, Some("A"));
        assert!(matches!(
            registry.header(1),
            Err(DataError::NoSuchEntry { id: 1, size: 1 })
        ));
        assert!(matches!(registry.name(7), Err(DataError::NoSuchEntry { .. })));
        Ok(())
    }

    #[test]
    fn test_duplicate_identifier_is_rejected() {
        let headers = vec![Some(Header::identified("x")), Some(Header::identified("x"))];
        assert!(matches!(
            Registry::with_headers(2, Some(headers)),
            Err(DataError::DuplicateIdentifier { first: 0, second: 1, .. })
        ));
    }

    #[test]
    fn test_identifier_lookup() -> Result<(), Box<dyn Error>> {
        let headers = vec![None, Some(Header::identified("b"))];
        let registry = Registry::with_headers(2, Some(headers))?;
        assert_eq!(registry.id_of("b"), Some(1));
        assert_eq!(registry.id_of("a"), None);
        assert_eq!(registry.header(0)?, None);
        Ok(())
    }

    #[test]
    fn test_merge_fills_gaps() -> Result<(), Box<dyn Error>> {
        let a = vec![Some(Header::identified("A")), None];
        let b = vec![None, Some(Header::identified("B"))];
        let merged = merge_headers(2, &[Some(a.as_slice()), Some(b.as_slice())])?;
        assert_eq!(
            merged,
            Some(vec![Some(Header::identified("A")), Some(Header::identified("B"))])
        );
        Ok(())
    }

    #[test]
    fn test_merge_keeps_named_header() -> Result<(), Box<dyn Error>> {
        let named = Header::new("x", Some("Alice"));
        let bare = Header::identified("x");
        assert_eq!(merge_header(0, Some(&bare), Some(&named))?, Some(named.clone()));
        assert_eq!(merge_header(0, Some(&named), Some(&bare))?, Some(named));
        Ok(())
    }

    #[test]
    fn test_merge_rejects_conflicting_names() {
        let a = vec![Some(Header::new("x", Some("Alice")))];
        let b = vec![Some(Header::new("x", Some("Bob")))];
        let err = merge_headers(1, &[Some(a.as_slice()), Some(b.as_slice())]).unwrap_err();
        assert!(matches!(err, DataError::NameConflict { id: 0, .. }));
        assert_eq!(err.class(), ErrorClass::Semantic);
    }

    #[test]
    fn test_merge_rejects_conflicting_identifiers() {
        let a = vec![Some(Header::new("x", Some("Alice")))];
        let b = vec![Some(Header::new("y", Some("Alice")))];
        assert!(matches!(
            merge_headers(1, &[Some(a.as_slice()), Some(b.as_slice())]),
            Err(DataError::IdentifierConflict { id: 0, .. })
        ));
    }

    #[test]
    fn test_merge_without_any_header_is_absent() -> Result<(), Box<dyn Error>> {
        let sparse: Headers = vec![None, None];
        assert_eq!(merge_headers(2, &[None, Some(sparse.as_slice())])?, None);
        assert_eq!(merge_headers(2, &[])?, None);
        Ok(())
    }

    fn header_strategy() -> impl Strategy<Value = Option<Header>> {
        prop::option::of(
            ("[ab]", prop::option::of("[AB]"))
                .prop_map(|(id, name)| Header::new(&id, name.as_deref())),
        )
    }

    fn merged(a: &Option<Header>, b: &Option<Header>) -> Result<Option<Header>, DataError> {
        merge_header(0, a.as_ref(), b.as_ref())
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in header_strategy(), b in header_strategy()) {
            let ab = merged(&a, &b).ok();
            let ba = merged(&b, &a).ok();
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn merge_is_associative(
            a in header_strategy(),
            b in header_strategy(),
            c in header_strategy(),
        ) {
            let left = merged(&a, &b).and_then(|ab| merged(&ab, &c)).ok();
            let right = merged(&b, &c).and_then(|bc| merged(&a, &bc)).ok();
            prop_assert_eq!(left, right);
        }
    }
}
