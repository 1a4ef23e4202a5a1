//! Update operators, replacements and upsert seeding.

use bson::{Bson, Document, oid::ObjectId};

use docmock_core::{
    document::{get_path, remove_path, set_path},
    error::{StoreError, StoreResult},
};

use crate::evaluator::values_equal;

/// Whether `update` is an operator update (`{ "$set": ... }`) rather than a replacement.
pub fn is_operator_update(update: &Document) -> bool {
    update.keys().next().is_some_and(|key| key.starts_with('$'))
}

/// Applies an operator update in place and reports whether the document changed.
///
/// `inserting` enables `$setOnInsert`, which only takes effect on an upsert.
pub fn apply_update(document: &mut Document, update: &Document, inserting: bool) -> StoreResult<bool> {
    if !is_operator_update(update) {
        return Err(StoreError::operation_failure(
            "update document requires atomic operators",
        ));
    }

    let original = document.clone();

    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(StoreError::operation_failure(format!(
                "modifier {operator} needs a document argument"
            )));
        };

        for (path, argument) in fields {
            match operator.as_str() {
                "$set" => set_path(document, path, argument.clone())?,
                "$setOnInsert" => {
                    if inserting {
                        set_path(document, path, argument.clone())?;
                    }
                }
                "$unset" => {
                    remove_path(document, path);
                }
                "$inc" => {
                    let current = get_path(document, path).cloned().unwrap_or(Bson::Int32(0));
                    set_path(document, path, add_numbers(path, &current, argument)?)?;
                }
                "$push" => push(document, path, argument, false)?,
                "$addToSet" => push(document, path, argument, true)?,
                "$rename" => {
                    let Bson::String(target) = argument else {
                        return Err(StoreError::operation_failure("$rename target must be a string"));
                    };
                    if let Some(value) = remove_path(document, path) {
                        set_path(document, target, value)?;
                    }
                }
                other => {
                    return Err(StoreError::not_implemented(format!("update operator {other}")));
                }
            }
        }
    }

    if !original.is_empty() && original.get("_id") != document.get("_id") {
        return Err(StoreError::operation_failure(
            "Performing an update on the path '_id' would modify the immutable field '_id'",
        ));
    }

    Ok(&original != document)
}

/// Builds the stored form of a replacement, keeping the existing document's `_id`.
pub fn apply_replacement(existing: &Document, replacement: Document) -> StoreResult<Document> {
    if is_operator_update(&replacement) {
        return Err(StoreError::operation_failure(
            "replacement document must not contain update operators",
        ));
    }

    let id = existing.get("_id").cloned();

    if let (Some(id), Some(new_id)) = (&id, replacement.get("_id")) {
        if !values_equal(id, new_id) {
            return Err(StoreError::operation_failure(
                "The _id field cannot be changed by a replacement",
            ));
        }
    }

    let mut document = Document::new();
    if let Some(id) = id {
        document.insert("_id", id);
    }
    for (key, value) in replacement {
        if key != "_id" {
            document.insert(key, value);
        }
    }

    Ok(document)
}

/// The document an upsert starts from: the plain equality fields of `filter`.
pub fn upsert_seed(filter: &Document) -> StoreResult<Document> {
    let mut seed = Document::new();

    for (key, value) in filter {
        if key.starts_with('$') {
            continue;
        }

        match value {
            Bson::Document(inner) if inner.keys().next().is_some_and(|k| k.starts_with('$')) => {
                if let Some(eq) = inner.get("$eq") {
                    set_path(&mut seed, key, eq.clone())?;
                }
            }
            other => set_path(&mut seed, key, other.clone())?,
        }
    }

    Ok(seed)
}

/// Places `_id` first, generating an ObjectId when the document has none.
pub fn with_leading_id(mut document: Document) -> (Bson, Document) {
    let id = document
        .remove("_id")
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut ordered = Document::new();
    ordered.insert("_id", id.clone());
    for (key, value) in document {
        ordered.insert(key, value);
    }

    (id, ordered)
}

fn add_numbers(path: &str, current: &Bson, delta: &Bson) -> StoreResult<Bson> {
    let result = match (current, delta) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(*a as i64 + *b as i64),
        },
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(*a as i64 + b),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a + *b as i64),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a + b),
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + *b as f64),
        (Bson::Double(a), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Int64(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        _ => {
            return Err(StoreError::operation_failure(format!(
                "cannot apply $inc to field '{path}' with value {current} and delta {delta}"
            )));
        }
    };

    Ok(result)
}

fn push(document: &mut Document, path: &str, argument: &Bson, unique: bool) -> StoreResult<()> {
    let values = match argument {
        Bson::Document(inner) if inner.contains_key("$each") => match inner.get("$each") {
            Some(Bson::Array(values)) => values.clone(),
            _ => return Err(StoreError::operation_failure("$each needs an array")),
        },
        other => vec![other.clone()],
    };

    let mut items = match get_path(document, path) {
        None => Vec::new(),
        Some(Bson::Array(items)) => items.clone(),
        Some(other) => {
            return Err(StoreError::operation_failure(format!(
                "cannot push onto non-array field '{path}' holding {other}"
            )));
        }
    };

    for value in values {
        if unique && items.iter().any(|item| values_equal(item, &value)) {
            continue;
        }
        items.push(value);
    }

    set_path(document, path, Bson::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_and_unset() {
        let mut document = doc! { "_id": 1, "a": 1, "b": 2 };
        let modified = apply_update(&mut document, &doc! { "$set": { "c.d": 3 }, "$unset": { "b": "" } }, false).unwrap();

        assert!(modified);
        assert_eq!(document, doc! { "_id": 1, "a": 1, "c": { "d": 3 } });
    }

    #[test]
    fn test_inc_preserves_numeric_type() {
        let mut document = doc! { "_id": 1, "i": 1, "f": 1.5 };
        apply_update(&mut document, &doc! { "$inc": { "i": 2, "f": 1, "n": 1 } }, false).unwrap();

        assert_eq!(document, doc! { "_id": 1, "i": 3, "f": 2.5, "n": 1 });
    }

    #[test]
    fn test_set_on_insert_only_applies_when_inserting() {
        let mut document = doc! { "_id": 1 };
        let modified = apply_update(&mut document, &doc! { "$setOnInsert": { "a": 1 } }, false).unwrap();
        assert!(!modified);

        apply_update(&mut document, &doc! { "$setOnInsert": { "a": 1 } }, true).unwrap();
        assert_eq!(document, doc! { "_id": 1, "a": 1 });
    }

    #[test]
    fn test_add_to_set_skips_existing() {
        let mut document = doc! { "_id": 1, "tags": ["a"] };
        apply_update(&mut document, &doc! { "$addToSet": { "tags": { "$each": ["a", "b"] } } }, false).unwrap();

        assert_eq!(document, doc! { "_id": 1, "tags": ["a", "b"] });
    }

    #[test]
    fn test_id_cannot_change() {
        let mut document = doc! { "_id": 1 };
        assert!(apply_update(&mut document, &doc! { "$set": { "_id": 2 } }, false).is_err());
    }

    #[test]
    fn test_replacement_keeps_id() {
        let replaced = apply_replacement(&doc! { "_id": 4, "j": 1 }, doc! { "j": 2 }).unwrap();
        assert_eq!(replaced, doc! { "_id": 4, "j": 2 });
    }

    #[test]
    fn test_upsert_seed_uses_equality_fields() {
        let seed = upsert_seed(&doc! { "_id": 4, "a": { "$gt": 1 }, "b": { "$eq": 2 } }).unwrap();
        assert_eq!(seed, doc! { "_id": 4, "b": 2 });
    }
}
