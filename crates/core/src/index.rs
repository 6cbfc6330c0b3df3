//! Index descriptions.
//!
//! [`IndexedAttributes`] is the immutable, ordered list of attribute paths an
//! index covers together with their sort direction. It is built once with
//! [`IndexedAttributesBuilder`] and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::AttributeReference;

/// Ordered (attribute path, ascending) pairs with unique paths.
///
/// Equality and hashing cover the full content: paths, their order and
/// their directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedAttributes {
    attributes: Vec<(AttributeReference, bool)>,
}

impl IndexedAttributes {
    /// Start building a new description
    pub fn builder() -> IndexedAttributesBuilder {
        IndexedAttributesBuilder::default()
    }

    /// The indexed paths, in index order
    pub fn indexed_attributes(&self) -> Vec<&AttributeReference> {
        self.attributes.iter().map(|(att, _)| att).collect()
    }

    /// Sort direction of `att`.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` if `att` is not part of this index.
    pub fn ascending_ordered(&self, att: &AttributeReference) -> Result<bool> {
        self.attributes
            .iter()
            .find(|(candidate, _)| candidate == att)
            .map(|(_, ascending)| *ascending)
            .ok_or_else(|| {
                Error::illegal_argument(format!(
                    "attribute {} is not indexed by this index",
                    att
                ))
            })
    }

    /// Whether `att` is part of this index
    pub fn contains(&self, att: &AttributeReference) -> bool {
        self.attributes.iter().any(|(candidate, _)| candidate == att)
    }

    /// (path, ascending) pairs in index order
    pub fn entries(&self) -> impl Iterator<Item = (&AttributeReference, bool)> {
        self.attributes.iter().map(|(att, asc)| (att, *asc))
    }

    /// Number of indexed paths
    pub fn size(&self) -> usize {
        self.attributes.len()
    }

    /// True if no path is indexed
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Display for IndexedAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (att, ascending)) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let direction = if *ascending { "(asc)" } else { "(desc)" };
            write!(f, "{} {}", att, direction)?;
        }
        Ok(())
    }
}

/// Append-only builder for [`IndexedAttributes`].
#[derive(Debug, Default)]
pub struct IndexedAttributesBuilder {
    attributes: Vec<(AttributeReference, bool)>,
}

impl IndexedAttributesBuilder {
    /// Append a path with its direction
    pub fn add_attribute(mut self, att: AttributeReference, ascending: bool) -> Self {
        self.attributes.push((att, ascending));
        self
    }

    /// Finish the description.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` if the same path was added twice.
    pub fn build(self) -> Result<IndexedAttributes> {
        let mut seen = HashSet::with_capacity(self.attributes.len());
        for (att, _) in &self.attributes {
            if !seen.insert(att) {
                return Err(Error::illegal_argument(format!(
                    "attribute {} was added twice",
                    att
                )));
            }
        }
        Ok(IndexedAttributes {
            attributes: self.attributes,
        })
    }
}

/// A named index on a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedIndex {
    /// Index name, unique within the collection
    pub name: String,
    /// Collection the index belongs to
    pub collection: String,
    /// Indexed paths and directions
    pub attributes: IndexedAttributes,
    /// Whether the index enforces uniqueness
    pub unique: bool,
}
