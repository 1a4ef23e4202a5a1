//! Parsing of driver-style filter documents into [`Expr`] trees.

use bson::{Bson, Document};

use docmock_core::{
    error::{StoreError, StoreResult},
    query::{Expr, FieldOp},
};

/// Parses a filter document. An empty filter matches every document.
pub fn parse_filter(filter: &Document) -> StoreResult<Expr> {
    let mut clauses = Vec::with_capacity(filter.len());

    for (key, value) in filter {
        match key.as_str() {
            "$and" => clauses.push(Expr::And(parse_clause_list(key, value)?)),
            "$or" => clauses.push(Expr::Or(parse_clause_list(key, value)?)),
            "$nor" => clauses.push(Expr::Or(parse_clause_list(key, value)?).not()),
            other if other.starts_with('$') => {
                return Err(StoreError::not_implemented(format!(
                    "top-level filter operator {other}"
                )));
            }
            field => clauses.push(parse_field(field, value)?),
        }
    }

    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => Expr::And(clauses),
    })
}

fn parse_clause_list(operator: &str, value: &Bson) -> StoreResult<Vec<Expr>> {
    match value {
        Bson::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Bson::Document(clause) => parse_filter(clause),
                _ => Err(StoreError::operation_failure(format!(
                    "{operator} entries must be documents"
                ))),
            })
            .collect(),
        _ => Err(StoreError::operation_failure(format!(
            "{operator} needs a non-empty array"
        ))),
    }
}

fn is_operator_document(value: &Bson) -> bool {
    match value {
        Bson::Document(inner) => inner.keys().next().is_some_and(|key| key.starts_with('$')),
        _ => false,
    }
}

fn parse_field(field: &str, value: &Bson) -> StoreResult<Expr> {
    let Bson::Document(operators) = value else {
        return Ok(Expr::field(field, FieldOp::Eq, value.clone()));
    };

    if !is_operator_document(value) {
        return Ok(Expr::field(field, FieldOp::Eq, value.clone()));
    }

    let mut clauses = Vec::with_capacity(operators.len());

    for (operator, argument) in operators {
        let clause = match operator.as_str() {
            "$eq" => Expr::field(field, FieldOp::Eq, argument.clone()),
            "$ne" => Expr::field(field, FieldOp::Ne, argument.clone()),
            "$gt" => Expr::field(field, FieldOp::Gt, argument.clone()),
            "$gte" => Expr::field(field, FieldOp::Gte, argument.clone()),
            "$lt" => Expr::field(field, FieldOp::Lt, argument.clone()),
            "$lte" => Expr::field(field, FieldOp::Lte, argument.clone()),
            "$in" => Expr::field(field, FieldOp::AnyOf, argument.clone()),
            "$nin" => Expr::field(field, FieldOp::NoneOf, argument.clone()),
            "$size" => Expr::field(field, FieldOp::Size, argument.clone()),
            "$exists" => Expr::Exists(field.to_string(), truthy(argument)),
            "$not" => parse_field(field, argument)?.not(),
            "$all" => match argument {
                Bson::Array(values) => Expr::And(
                    values
                        .iter()
                        .map(|value| Expr::field(field, FieldOp::Eq, value.clone()))
                        .collect(),
                ),
                _ => return Err(StoreError::operation_failure("$all needs an array")),
            },
            other => {
                return Err(StoreError::not_implemented(format!("filter operator {other}")));
            }
        };
        clauses.push(clause);
    }

    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => Expr::And(clauses),
    })
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_implicit_equality() {
        assert_eq!(
            parse_filter(&doc! { "a": 1 }).unwrap(),
            Expr::field("a", FieldOp::Eq, Bson::Int32(1))
        );
    }

    #[test]
    fn test_embedded_document_is_literal() {
        assert_eq!(
            parse_filter(&doc! { "a": { "b": 1 } }).unwrap(),
            Expr::field("a", FieldOp::Eq, Bson::Document(doc! { "b": 1 }))
        );
    }

    #[test]
    fn test_operator_document_expands_to_conjunction() {
        assert_eq!(
            parse_filter(&doc! { "a": { "$gte": 1, "$lt": 5 } }).unwrap(),
            Expr::And(vec![
                Expr::field("a", FieldOp::Gte, Bson::Int32(1)),
                Expr::field("a", FieldOp::Lt, Bson::Int32(5)),
            ])
        );
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert_eq!(parse_filter(&doc! {}).unwrap(), Expr::And(vec![]));
    }

    #[test]
    fn test_unknown_operators_are_not_implemented() {
        assert!(parse_filter(&doc! { "$where": "true" }).unwrap_err().is_not_implemented());
        assert!(
            parse_filter(&doc! { "a": { "$regex": "^x" } })
                .unwrap_err()
                .is_not_implemented()
        );
    }
}
