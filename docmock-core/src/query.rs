//! Query representation shared by the Store and its consumers.
//!
//! Filters arrive as driver-style BSON documents. The Store parses them into the [`Expr`]
//! tree defined here and evaluates that tree with a [`QueryVisitor`]. Sort specifications
//! resolve to a list of [`Sort`] keys.
//!
//! ```ignore
//! use docmock_core::query::{Expr, FieldOp, Sort};
//! use bson::{Bson, doc};
//!
//! let active = Expr::field("status", FieldOp::Eq, Bson::from("active"))
//!     .and(Expr::Exists("created_at".into(), true));
//! let keys = Sort::from_spec(&doc! { "created_at": -1 })?;
//! ```

use bson::{Bson, Document};

use crate::error::{StoreError, StoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Parses a driver-style direction value (`1` / `-1`).
    pub fn from_bson(value: &Bson) -> StoreResult<Self> {
        let direction = match value {
            Bson::Int32(v) => *v as f64,
            Bson::Int64(v) => *v as f64,
            Bson::Double(v) => *v,
            other => {
                return Err(StoreError::operation_failure(format!(
                    "invalid sort direction {other}"
                )));
            }
        };

        match direction {
            d if d == 1.0 => Ok(SortDirection::Asc),
            d if d == -1.0 => Ok(SortDirection::Desc),
            _ => Err(StoreError::operation_failure(format!(
                "invalid sort direction {direction}"
            ))),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Sort key for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The (possibly dotted) field path to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Parses a sort specification such as `{ "a": 1, "b": -1 }` into ordered sort keys.
    pub fn from_spec(spec: &Document) -> StoreResult<Vec<Sort>> {
        spec.iter()
            .map(|(field, direction)| {
                Ok(Sort {
                    field: field.clone(),
                    direction: SortDirection::from_bson(direction)?,
                })
            })
            .collect()
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to (`$eq`, or an implicit equality).
    Eq,
    /// Not equal to (`$ne`).
    Ne,
    /// Greater than (`$gt`).
    Gt,
    /// Greater than or equal to (`$gte`).
    Gte,
    /// Less than (`$lt`).
    Lt,
    /// Less than or equal to (`$lte`).
    Lte,
    /// Matches any of the values (`$in`).
    AnyOf,
    /// Matches none of the values (`$nin`).
    NoneOf,
    /// Array field has exactly this many elements (`$size`).
    Size,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression.
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The (possibly dotted) field path to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: impl Into<String>, op: FieldOp, value: Bson) -> Self {
        Expr::Field {
            field: field.into(),
            op,
            value,
        }
    }

    /// Combines this expression with another using logical AND.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression.
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
