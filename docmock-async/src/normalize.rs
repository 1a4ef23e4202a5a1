//! String normalization for filters and sort specifications.
//!
//! ODM libraries hand the driver string-like wrapper values (field expressions and the
//! like) that travel as BSON symbols. The Store cannot evaluate symbols, so filters and
//! sort specifications are rewritten to use plain strings before the Store sees them.

use bson::{Bson, Document};

/// Replaces wrapper strings with plain strings, preserving structure and key order.
pub struct StringNormalizer;

impl StringNormalizer {
    /// Recursively normalizes a BSON value.
    ///
    /// - Symbols become strings
    /// - Arrays and documents are normalized element by element
    /// - Every other value is returned unchanged
    pub fn normalize_value(value: &Bson) -> Bson {
        match value {
            Bson::Symbol(symbol) => Bson::String(symbol.clone()),
            Bson::Array(items) => Bson::Array(items.iter().map(Self::normalize_value).collect()),
            Bson::Document(document) => Bson::Document(Self::normalize_document(document)),
            _ => value.clone(),
        }
    }

    pub fn normalize_document(document: &Document) -> Document {
        document
            .iter()
            .map(|(key, value)| (key.clone(), Self::normalize_value(value)))
            .collect()
    }

    /// Whether `value` holds any wrapper string.
    pub fn needs_normalization(value: &Bson) -> bool {
        match value {
            Bson::Symbol(_) => true,
            Bson::Array(items) => items.iter().any(Self::needs_normalization),
            Bson::Document(document) => document.values().any(Self::needs_normalization),
            _ => false,
        }
    }
}
