//! Projection and the supported subset of aggregation pipeline stages.

use bson::{Bson, Document};

use docmock_core::{
    document::{get_path, remove_path, set_path},
    error::{StoreError, StoreResult},
    query::Sort,
};

use crate::{
    evaluator::{DocumentEvaluator, compare_documents},
    filter::parse_filter,
};

/// Applies an inclusion or exclusion projection.
///
/// `_id` is kept unless explicitly excluded; the two modes cannot be mixed apart from
/// excluding `_id` in an inclusion projection.
pub fn project(document: &Document, projection: &Document) -> StoreResult<Document> {
    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (field, flag) in projection {
        let keep = match flag {
            Bson::Boolean(value) => *value,
            Bson::Int32(value) => *value != 0,
            Bson::Int64(value) => *value != 0,
            Bson::Double(value) => *value != 0.0,
            other => {
                return Err(StoreError::not_implemented(format!(
                    "projection value {other} for field '{field}'"
                )));
            }
        };

        if field == "_id" {
            include_id = keep;
        } else if keep {
            included.push(field.as_str());
        } else {
            excluded.push(field.as_str());
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        return Err(StoreError::operation_failure(
            "projection cannot mix inclusion and exclusion",
        ));
    }

    if included.is_empty() {
        let mut projected = document.clone();
        for field in excluded {
            remove_path(&mut projected, field);
        }
        if !include_id {
            projected.remove("_id");
        }
        return Ok(projected);
    }

    let mut projected = Document::new();
    if include_id {
        if let Some(id) = document.get("_id") {
            projected.insert("_id", id.clone());
        }
    }
    for field in included {
        if let Some(value) = get_path(document, field) {
            set_path(&mut projected, field, value.clone())?;
        }
    }

    Ok(projected)
}

/// Sorts `documents` in place by a sort specification.
pub fn sort_documents(documents: &mut [Document], spec: &Document) -> StoreResult<()> {
    let keys = Sort::from_spec(spec)?;
    documents.sort_by(|left, right| compare_documents(left, right, &keys));
    Ok(())
}

/// Runs `pipeline` over `documents`.
pub fn run_pipeline(mut documents: Vec<Document>, pipeline: &[Document]) -> StoreResult<Vec<Document>> {
    for stage in pipeline {
        let Some((name, argument)) = stage.iter().next() else {
            return Err(StoreError::operation_failure("empty pipeline stage"));
        };

        documents = match (name.as_str(), argument) {
            ("$match", Bson::Document(filter)) => {
                let expr = parse_filter(filter)?;
                let mut matched = Vec::with_capacity(documents.len());
                for document in documents {
                    if DocumentEvaluator::matches(&document, &expr)? {
                        matched.push(document);
                    }
                }
                matched
            }
            ("$sort", Bson::Document(spec)) => {
                sort_documents(&mut documents, spec)?;
                documents
            }
            ("$skip", count) => documents.into_iter().skip(as_count(name, count)?).collect(),
            ("$limit", count) => documents.into_iter().take(as_count(name, count)?).collect(),
            ("$project", Bson::Document(projection)) => documents
                .iter()
                .map(|document| project(document, projection))
                .collect::<StoreResult<Vec<_>>>()?,
            ("$count", Bson::String(field)) => {
                if documents.is_empty() {
                    Vec::new()
                } else {
                    let mut counted = Document::new();
                    counted.insert(field.clone(), documents.len() as i32);
                    vec![counted]
                }
            }
            (name, _) if matches!(name, "$match" | "$sort" | "$project" | "$count") => {
                return Err(StoreError::operation_failure(format!(
                    "invalid argument for stage {name}"
                )));
            }
            (other, _) => {
                return Err(StoreError::not_implemented(format!("pipeline stage {other}")));
            }
        };
    }

    Ok(documents)
}

fn as_count(stage: &str, value: &Bson) -> StoreResult<usize> {
    match value {
        Bson::Int32(n) if *n >= 0 => Ok(*n as usize),
        Bson::Int64(n) if *n >= 0 => Ok(*n as usize),
        Bson::Double(n) if *n >= 0.0 => Ok(*n as usize),
        other => Err(StoreError::operation_failure(format!(
            "{stage} needs a non-negative number, got {other}"
        ))),
    }
}
