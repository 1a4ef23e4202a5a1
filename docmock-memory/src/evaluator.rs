//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for parsed filter expressions, plus the
//! value ordering used for sorting.

use std::cmp::Ordering;

use bson::{Bson, DateTime, Document, oid::ObjectId};

use docmock_core::{
    document::{collect_path, get_path},
    error::{StoreError, StoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64. Values the evaluator cannot interpret are kept
/// as [`Comparable::Unsupported`] so that filters using them fail loudly instead of
/// silently matching nothing.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Binary(&'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Types compared only by raw equality (timestamps, decimals, regexes, ...).
    Other(&'a Bson),
    /// Types the evaluator refuses to handle.
    Unsupported(&'static str),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Binary(value) => Comparable::Binary(&value.bytes),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            Bson::Symbol(_) => Comparable::Unsupported("symbol"),
            Bson::JavaScriptCode(_) | Bson::JavaScriptCodeWithScope(_) => {
                Comparable::Unsupported("javascript")
            }
            other => Comparable::Other(other),
        }
    }
}

impl<'a> Comparable<'a> {
    /// Canonical type rank used when ordering values of different types.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Binary(_) => 6,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Other(_) => 10,
            Comparable::Unsupported(_) => 11,
        }
    }

    /// Total order across all values, used for sorting.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
            (Comparable::Binary(a), Comparable::Binary(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    match left.total_cmp(right) {
                        Ordering::Equal => continue,
                        ordering => return ordering,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Comparable::Map(a), Comparable::Map(b)) => {
                for ((left_key, left), (right_key, right)) in a.iter().zip(b.iter()) {
                    match left.total_cmp(right).then_with(|| left_key.cmp(right_key)) {
                        Ordering::Equal => continue,
                        ordering => return ordering,
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    /// Only values of the same type bracket are ordered; range filters never match across types.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.rank() != other.rank() || matches!(self, Comparable::Other(_) | Comparable::Unsupported(_)) {
            return None;
        }

        Some(self.total_cmp(other))
    }
}

/// Equality between two BSON values with numeric normalization (`1 == 1.0`).
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// Orders documents by the given sort keys; missing fields sort as `null`.
pub(crate) fn compare_documents(left: &Document, right: &Document, keys: &[Sort]) -> Ordering {
    for key in keys {
        let left_value = get_path(left, &key.field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);
        let right_value = get_path(right, &key.field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => left_value.total_cmp(&right_value),
            SortDirection::Desc => right_value.total_cmp(&left_value),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

fn ensure_supported(value: &Bson) -> StoreResult<()> {
    match Comparable::from(value) {
        Comparable::Unsupported(kind) => Err(StoreError::operation_failure(format!(
            "cannot evaluate a filter value of type {kind}"
        ))),
        _ => match value {
            Bson::Array(items) => items.iter().try_for_each(ensure_supported),
            Bson::Document(doc) => doc.values().try_for_each(ensure_supported),
            _ => Ok(()),
        },
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> StoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Whether `document` matches `expr`.
    pub fn matches(document: &Document, expr: &Expr) -> StoreResult<bool> {
        DocumentEvaluator::new(document).evaluate(expr)
    }

    /// Candidates a comparison may match: each value at the path, plus the elements of
    /// any array found there.
    fn candidates(&self, field: &str) -> Vec<Comparable<'a>> {
        let mut candidates = Vec::new();

        for value in collect_path(self.document, field) {
            if let Bson::Array(items) = value {
                candidates.extend(items.iter().map(Comparable::from));
            }
            candidates.push(Comparable::from(value));
        }

        candidates
    }

    fn equals(&self, field: &str, value: &Bson) -> bool {
        let target = Comparable::from(value);
        let candidates = self.candidates(field);

        if candidates.is_empty() {
            return target == Comparable::Null;
        }

        candidates.iter().any(|candidate| candidate == &target)
    }

    fn any_of(&self, field: &str, value: &Bson) -> StoreResult<bool> {
        match value {
            Bson::Array(values) => Ok(values.iter().any(|value| self.equals(field, value))),
            _ => Err(StoreError::operation_failure("$in/$nin needs an array")),
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(!collect_path(self.document, field).is_empty() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        ensure_supported(value)?;

        match op {
            FieldOp::Eq => Ok(self.equals(field, value)),
            FieldOp::Ne => Ok(!self.equals(field, value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                let target = Comparable::from(value);

                Ok(self.candidates(field).iter().any(|candidate| {
                    match candidate.partial_cmp(&target) {
                        Some(ordering) => match op {
                            FieldOp::Gt => ordering == Ordering::Greater,
                            FieldOp::Gte => ordering != Ordering::Less,
                            FieldOp::Lt => ordering == Ordering::Less,
                            _ => ordering != Ordering::Greater,
                        },
                        None => false,
                    }
                }))
            }
            FieldOp::AnyOf => self.any_of(field, value),
            FieldOp::NoneOf => Ok(!self.any_of(field, value)?),
            FieldOp::Size => {
                let expected = match Comparable::from(value) {
                    Comparable::Number(n) => n,
                    _ => return Err(StoreError::operation_failure("$size needs a number")),
                };

                Ok(collect_path(self.document, field).iter().any(|found| match found {
                    Bson::Array(items) => items.len() as f64 == expected,
                    _ => false,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;
    use bson::doc;

    fn matches(document: Document, filter: Document) -> bool {
        let expr = parse_filter(&filter).unwrap();
        DocumentEvaluator::matches(&document, &expr).unwrap()
    }

    #[test]
    fn test_equality_normalizes_numbers() {
        assert!(matches(doc! { "a": 1 }, doc! { "a": 1.0 }));
        assert!(matches(doc! { "a": 1_i64 }, doc! { "a": 1 }));
        assert!(!matches(doc! { "a": 1 }, doc! { "a": "1" }));
    }

    #[test]
    fn test_null_matches_missing_field() {
        assert!(matches(doc! { "b": 1 }, doc! { "a": null }));
        assert!(!matches(doc! { "a": 1 }, doc! { "a": null }));
    }

    #[test]
    fn test_array_membership() {
        assert!(matches(doc! { "tags": ["x", "y"] }, doc! { "tags": "y" }));
        assert!(matches(doc! { "tags": ["x", "y"] }, doc! { "tags": ["x", "y"] }));
        assert!(matches(doc! { "n": [{ "v": 1 }, { "v": 2 }] }, doc! { "n.v": 2 }));
    }

    #[test]
    fn test_range_operators_stay_within_type() {
        assert!(matches(doc! { "a": 5 }, doc! { "a": { "$gt": 3, "$lte": 5 } }));
        assert!(!matches(doc! { "a": "5" }, doc! { "a": { "$gt": 3 } }));
    }

    #[test]
    fn test_logical_operators() {
        let document = doc! { "a": 1, "b": 2 };
        assert!(matches(document.clone(), doc! { "$or": [{ "a": 2 }, { "b": 2 }] }));
        assert!(!matches(document.clone(), doc! { "$nor": [{ "a": 1 }] }));
        assert!(matches(document.clone(), doc! { "a": { "$not": { "$gt": 1 } } }));
        assert!(matches(document, doc! { "c": { "$exists": false }, "a": { "$in": [1, 3] } }));
    }

    #[test]
    fn test_symbol_values_are_rejected() {
        let expr = parse_filter(&doc! { "a": Bson::Symbol("x".to_string()) }).unwrap();
        assert!(DocumentEvaluator::matches(&doc! { "a": "x" }, &expr).is_err());
    }

    #[test]
    fn test_sort_orders_across_types() {
        let keys = vec![Sort { field: "a".into(), direction: SortDirection::Asc }];
        assert_eq!(compare_documents(&doc! {}, &doc! { "a": 1 }, &keys), Ordering::Less);
        assert_eq!(compare_documents(&doc! { "a": 2 }, &doc! { "a": "1" }, &keys), Ordering::Less);
        assert_eq!(compare_documents(&doc! { "a": 2 }, &doc! { "a": 1.5 }, &keys), Ordering::Greater);
    }
}
