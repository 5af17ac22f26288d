//! Predicate AST for query filters.
//!
//! A `Predicate` is an immutable boolean expression tree. Leaf nodes compare
//! a property-path expression against a literal, a literal list, or another
//! property path; interior nodes combine subtrees with and/or/not. The same
//! tree drives both remote serialization (an executor's concern) and local
//! evaluation against cached entities, which must partition any dataset
//! identically.

use crate::error::Error;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Unary date-part functions applicable to a property path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatePart {
    /// Calendar year of a timestamp.
    Year,
    /// Calendar month (1-12) of a timestamp.
    Month,
}

/// The left-hand side of a comparison: a dotted property path, optionally
/// wrapped in a date-part function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathExpr {
    /// A plain dotted property path, e.g. `"customer.companyName"`.
    Raw(String),
    /// A date-part function applied to a path, e.g. `year(hireDate)`.
    DatePart {
        /// The function to apply.
        part: DatePart,
        /// The path the function is applied to.
        path: String,
    },
}

impl PathExpr {
    /// Parse a path expression, recognising `year(...)` and `month(...)`.
    pub fn parse(expr: &str) -> Result<Self, Error> {
        let trimmed = expr.trim();
        for (prefix, part) in [("year(", DatePart::Year), ("month(", DatePart::Month)] {
            if let Some(rest) = trimmed.strip_prefix(prefix) {
                let inner = rest
                    .strip_suffix(')')
                    .ok_or_else(|| Error::InvalidPredicate(format!("unbalanced parens in '{trimmed}'")))?;
                if inner.is_empty() {
                    return Err(Error::InvalidPredicate(format!("empty path in '{trimmed}'")));
                }
                return Ok(PathExpr::DatePart {
                    part,
                    path: inner.trim().to_string(),
                });
            }
        }
        if trimmed.is_empty() {
            return Err(Error::InvalidPredicate("empty property path".to_string()));
        }
        Ok(PathExpr::Raw(trimmed.to_string()))
    }

    /// The underlying property path.
    pub fn path(&self) -> &str {
        match self {
            PathExpr::Raw(p) => p,
            PathExpr::DatePart { path, .. } => path,
        }
    }
}

/// Comparison operators supported in predicate leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Set membership against a literal list.
    In,
    /// String starts-with.
    StartsWith,
    /// String ends-with.
    EndsWith,
    /// String contains.
    Contains,
}

impl CompareOp {
    /// Parse an operator name as used in the shorthand syntax.
    pub fn parse(op: &str) -> Result<Self, Error> {
        let op = match op.to_ascii_lowercase().as_str() {
            "==" | "eq" | "equals" => CompareOp::Eq,
            "!=" | "ne" | "notequals" => CompareOp::Ne,
            "<" | "lt" => CompareOp::Lt,
            "<=" | "le" => CompareOp::Le,
            ">" | "gt" => CompareOp::Gt,
            ">=" | "ge" => CompareOp::Ge,
            "in" => CompareOp::In,
            "startswith" => CompareOp::StartsWith,
            "endswith" => CompareOp::EndsWith,
            "contains" => CompareOp::Contains,
            other => {
                return Err(Error::InvalidPredicate(format!("unknown operator '{other}'")));
            }
        };
        Ok(op)
    }
}

/// The right-hand side of a comparison.
///
/// A `Literal` operand is never re-interpreted as a property path, even when
/// its string value happens to name one; callers that want a
/// property-to-property comparison must construct `Operand::Path` explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// A literal value.
    Literal(Value),
    /// A literal list of values (for `in`).
    Values(Vec<Value>),
    /// Another property path on the candidate entity.
    Path(String),
}

/// An immutable boolean expression tree over entity property paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// A leaf comparison.
    Compare {
        /// Left-hand path expression.
        left: PathExpr,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand operand.
        right: Operand,
    },
    /// All subtrees must match. Empty matches everything.
    And(Vec<Predicate>),
    /// At least one subtree must match. Empty matches nothing.
    Or(Vec<Predicate>),
    /// Negation of the subtree.
    Not(Box<Predicate>),
}

impl Predicate {
    /// Create a comparison of a path expression against a literal value.
    ///
    /// The path accepts the `year(...)`/`month(...)` function forms.
    pub fn new(path: &str, op: CompareOp, value: impl Into<Value>) -> Result<Self, Error> {
        Ok(Predicate::Compare {
            left: PathExpr::parse(path)?,
            op,
            right: Operand::Literal(value.into()),
        })
    }

    /// Create a set-membership comparison against a literal list.
    pub fn in_values(path: &str, values: Vec<Value>) -> Result<Self, Error> {
        Ok(Predicate::Compare {
            left: PathExpr::parse(path)?,
            op: CompareOp::In,
            right: Operand::Values(values),
        })
    }

    /// Create a comparison of one property path against another.
    pub fn compare_paths(left: &str, op: CompareOp, right: &str) -> Result<Self, Error> {
        Ok(Predicate::Compare {
            left: PathExpr::parse(left)?,
            op,
            right: Operand::Path(right.trim().to_string()),
        })
    }

    /// Combine with another predicate under `and`.
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut preds) => {
                preds.push(other);
                Predicate::And(preds)
            }
            p => Predicate::And(vec![p, other]),
        }
    }

    /// Combine with another predicate under `or`.
    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut preds) => {
                preds.push(other);
                Predicate::Or(preds)
            }
            p => Predicate::Or(vec![p, other]),
        }
    }

    /// Negate this predicate.
    pub fn negate(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// Combine a list under `and`, skipping absent entries.
    ///
    /// An empty (or all-`None`) list yields a predicate that matches every
    /// candidate; a single surviving entry is returned as-is.
    pub fn and_all<I>(preds: I) -> Predicate
    where
        I: IntoIterator<Item = Option<Predicate>>,
    {
        let mut list: Vec<Predicate> = preds.into_iter().flatten().collect();
        if list.len() == 1 {
            list.remove(0)
        } else {
            Predicate::And(list)
        }
    }

    /// Combine a list under `or`, skipping absent entries.
    ///
    /// An empty (or all-`None`) list yields a predicate that matches nothing.
    pub fn or_any<I>(preds: I) -> Predicate
    where
        I: IntoIterator<Item = Option<Predicate>>,
    {
        let mut list: Vec<Predicate> = preds.into_iter().flatten().collect();
        if list.len() == 1 {
            list.remove(0)
        } else {
            Predicate::Or(list)
        }
    }

    /// Collect every property path referenced anywhere in the tree,
    /// including right-hand path operands.
    pub fn referenced_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { left, right, .. } => {
                paths.push(left.path());
                if let Operand::Path(p) = right {
                    paths.push(p);
                }
            }
            Predicate::And(list) | Predicate::Or(list) => {
                for p in list {
                    p.collect_paths(paths);
                }
            }
            Predicate::Not(inner) => inner.collect_paths(paths),
        }
    }
}
