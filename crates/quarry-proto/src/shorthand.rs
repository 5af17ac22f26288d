//! JSON shorthand predicate syntax.
//!
//! Translates the constrained object-literal shape
//! `{ "city": { "==": "London" } }` into the canonical [`Predicate`] AST.
//! The parser is deliberately isolated from the AST and the evaluator: the
//! evaluator only ever sees canonical nodes.
//!
//! Supported shapes:
//! - `{ "field": literal }` — equality shorthand
//! - `{ "field": { "op": operand } }` — any [`CompareOp`] name
//! - `{ "field": { "in": [v1, v2] } }`
//! - `{ "and": [ ... ] }`, `{ "or": [ ... ] }`, `{ "not": { ... } }`
//! - multiple keys in one object AND-combine

use crate::error::Error;
use crate::predicate::{CompareOp, Operand, PathExpr, Predicate};
use crate::value::Value;
use serde_json::Value as Json;

/// Parse a shorthand criteria object into a canonical predicate.
pub fn parse_shorthand(json: &Json) -> Result<Predicate, Error> {
    let obj = json
        .as_object()
        .ok_or_else(|| Error::InvalidPredicate("criteria must be a JSON object".to_string()))?;

    let mut parts = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        parts.push(parse_entry(key, value)?);
    }
    if parts.len() == 1 {
        Ok(parts.remove(0))
    } else {
        Ok(Predicate::And(parts))
    }
}

fn parse_entry(key: &str, value: &Json) -> Result<Predicate, Error> {
    match key {
        "and" | "or" => {
            let list = value.as_array().ok_or_else(|| {
                Error::InvalidPredicate(format!("'{key}' requires an array of criteria"))
            })?;
            let preds = list.iter().map(parse_shorthand).collect::<Result<Vec<_>, _>>()?;
            if key == "and" {
                Ok(Predicate::And(preds))
            } else {
                Ok(Predicate::Or(preds))
            }
        }
        "not" => Ok(parse_shorthand(value)?.negate()),
        path => parse_comparison(path, value),
    }
}

fn parse_comparison(path: &str, value: &Json) -> Result<Predicate, Error> {
    let left = PathExpr::parse(path)?;
    match value {
        // { field: { op: operand, ... } }
        Json::Object(ops) => {
            let mut parts = Vec::with_capacity(ops.len());
            for (op_name, operand) in ops {
                let op = CompareOp::parse(op_name)?;
                let right = if op == CompareOp::In {
                    let list = operand.as_array().ok_or_else(|| {
                        Error::InvalidPredicate("'in' requires an array operand".to_string())
                    })?;
                    Operand::Values(list.iter().map(json_to_value).collect::<Result<_, _>>()?)
                } else {
                    Operand::Literal(json_to_value(operand)?)
                };
                parts.push(Predicate::Compare {
                    left: left.clone(),
                    op,
                    right,
                });
            }
            if parts.len() == 1 {
                Ok(parts.remove(0))
            } else {
                Ok(Predicate::And(parts))
            }
        }
        // { field: literal } — equality shorthand
        other => Ok(Predicate::Compare {
            left,
            op: CompareOp::Eq,
            right: Operand::Literal(json_to_value(other)?),
        }),
    }
}

fn json_to_value(json: &Json) -> Result<Value, Error> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int64(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float64(f))
            } else {
                Err(Error::InvalidPredicate(format!("unrepresentable number {n}")))
            }
        }
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Array(_) | Json::Object(_) => Err(Error::InvalidPredicate(
            "nested arrays/objects are only valid under 'in', 'and', 'or', or 'not'".to_string(),
        )),
    }
}
