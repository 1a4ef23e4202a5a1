//! Dotted-path helpers over BSON documents.
//!
//! Driver filters, updates and index key patterns address nested values with dotted paths
//! (`"address.city"`, `"tags.0"`). These helpers resolve such paths against a [`Document`].

use bson::{Bson, Document};

use crate::error::{StoreError, StoreResult};

/// Returns the value at `path`, descending through sub-documents and numeric array indices.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = document.get(first)?;

    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Collects every value reachable at `path`, fanning out across arrays of sub-documents.
///
/// `{"tags": [{"n": 1}, {"n": 2}]}` yields both `1` and `2` for the path `"tags.n"`.
pub fn collect_path<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let parts = path.split('.').collect::<Vec<_>>();
    let mut found = Vec::new();
    collect_from_document(document, &parts, &mut found);
    found
}

fn collect_from_document<'a>(document: &'a Document, parts: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = parts.split_first() else {
        return;
    };

    if let Some(value) = document.get(*head) {
        collect_from_value(value, rest, found);
    }
}

fn collect_from_value<'a>(value: &'a Bson, parts: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = parts.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Bson::Document(inner) => collect_from_document(inner, parts, found),
        Bson::Array(items) => match head.parse::<usize>() {
            Ok(index) => {
                if let Some(item) = items.get(index) {
                    collect_from_value(item, rest, found);
                }
            }
            Err(_) => {
                for item in items {
                    if let Bson::Document(inner) = item {
                        collect_from_document(inner, parts, found);
                    }
                }
            }
        },
        _ => {}
    }
}

/// Sets `value` at `path`, creating intermediate sub-documents as needed.
pub fn set_path(document: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                Some(Bson::Array(items)) => {
                    let (index, tail) = match rest.split_once('.') {
                        Some((index, tail)) => (index, Some(tail)),
                        None => (rest, None),
                    };
                    let index = index.parse::<usize>().map_err(|_| {
                        StoreError::operation_failure(format!(
                            "cannot create field '{index}' in array '{head}'"
                        ))
                    })?;

                    while items.len() <= index {
                        items.push(Bson::Null);
                    }

                    match tail {
                        None => {
                            items[index] = value;
                            Ok(())
                        }
                        Some(tail) => {
                            if let Bson::Document(inner) = &mut items[index] {
                                return set_path(inner, tail, value);
                            }

                            let mut inner = Document::new();
                            set_path(&mut inner, tail, value)?;
                            items[index] = Bson::Document(inner);
                            Ok(())
                        }
                    }
                }
                Some(other) => Err(StoreError::operation_failure(format!(
                    "cannot create field in element {{{head}: {other}}}"
                ))),
                None => {
                    let mut inner = Document::new();
                    set_path(&mut inner, rest, value)?;
                    document.insert(head, inner);
                    Ok(())
                }
            }
        }
    }
}

/// Removes the value at `path`, returning it when present.
pub fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head)? {
            Bson::Document(inner) => remove_path(inner, rest),
            _ => None,
        },
    }
}
