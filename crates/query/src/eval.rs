//! In-memory predicate evaluation
//!
//! An ordinary evaluator over `serde_json::Value` documents for the
//! rewritten AST. The capability validator has already rejected anything
//! the remote engine cannot run and replaced its quirky forms, so the
//! rules here stay plain: exact equality (null equals null), numeric and
//! string ordering, truthiness only for actual booleans.
//!
//! Sequence operators bind their predicate/projection argument to each
//! element of the receiver sequence.

use crate::ast::{BinaryOp, CallTarget, Expr, UnaryOp};
use cosmock_core::error::{Result, StoreError};
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Evaluate a predicate against a document.
pub fn matches(doc: &Value, predicate: &Expr) -> Result<bool> {
    Ok(truthy(&eval(doc, predicate)?))
}

/// Evaluate an expression with `ctx` as the context document.
pub fn eval(ctx: &Value, expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Constant(value) => Ok(value.clone()),
        Expr::MemberAccess { object, member, .. } => {
            let base = match object {
                Some(inner) => eval(ctx, inner)?,
                None => ctx.clone(),
            };
            Ok(access_member(&base, member))
        }
        // JSON is already the widened representation.
        Expr::Convert { operand, .. } => eval(ctx, operand),
        Expr::Unary { op, operand } => eval_unary(ctx, *op, operand),
        Expr::Binary { op, left, right } => eval_binary(ctx, *op, left, right),
        Expr::Call {
            target,
            method,
            receiver,
            args,
            ..
        } => eval_call(ctx, target, method, receiver.as_deref(), args),
    }
}

fn access_member(base: &Value, member: &str) -> Value {
    match base {
        Value::Object(map) => map.get(member).cloned().unwrap_or(Value::Null),
        // `.value` on an already-unwrapped scalar is the identity.
        other if member == "value" => other.clone(),
        _ => Value::Null,
    }
}

fn eval_unary(ctx: &Value, op: UnaryOp, operand: &Expr) -> Result<Value> {
    let value = eval(ctx, operand)?;
    match op {
        UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
        UnaryOp::Neg => match value.as_f64() {
            Some(n) => Ok(number(-n)),
            None => Err(StoreError::InvalidArgument(
                "cannot negate a non-numeric value".to_string(),
            )),
        },
    }
}

fn eval_binary(ctx: &Value, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value> {
    match op {
        BinaryOp::And => {
            let l = truthy(&eval(ctx, left)?);
            Ok(Value::Bool(l && truthy(&eval(ctx, right)?)))
        }
        BinaryOp::Or => {
            let l = truthy(&eval(ctx, left)?);
            Ok(Value::Bool(l || truthy(&eval(ctx, right)?)))
        }
        BinaryOp::Coalesce => {
            let l = eval(ctx, left)?;
            if l.is_null() {
                eval(ctx, right)
            } else {
                Ok(l)
            }
        }
        BinaryOp::Xor => {
            let l = truthy(&eval(ctx, left)?);
            let r = truthy(&eval(ctx, right)?);
            Ok(Value::Bool(l ^ r))
        }
        BinaryOp::Eq => Ok(Value::Bool(eval(ctx, left)? == eval(ctx, right)?)),
        BinaryOp::Ne => Ok(Value::Bool(eval(ctx, left)? != eval(ctx, right)?)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let l = eval(ctx, left)?;
            let r = eval(ctx, right)?;
            let holds = match compare(&l, &r) {
                Some(ordering) => match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    BinaryOp::Ge => ordering != Ordering::Less,
                    _ => unreachable!(),
                },
                // Mixed or non-orderable types never match.
                None => false,
            };
            Ok(Value::Bool(holds))
        }
    }
}

fn eval_call(
    ctx: &Value,
    target: &CallTarget,
    method: &str,
    receiver: Option<&Expr>,
    args: &[Expr],
) -> Result<Value> {
    match target {
        CallTarget::String => eval_string_call(ctx, method, receiver, args),
        CallTarget::Math => eval_math_call(ctx, method, receiver, args),
        CallTarget::Array | CallTarget::Queryable | CallTarget::Sequence => {
            eval_sequence_call(ctx, method, receiver, args)
        }
        CallTarget::Object if method == "to_string" => {
            let value = eval_receiver(ctx, receiver, args)?;
            Ok(Value::String(render(&value)))
        }
        CallTarget::Marker => Err(StoreError::InvalidArgument(format!(
            "marker call '{method}' must be rewritten before evaluation"
        ))),
        _ => Err(StoreError::InvalidArgument(format!(
            "{target}.{method} is not implemented by the in-memory evaluator"
        ))),
    }
}

/// The receiver expression, or the first argument for static-style calls.
fn eval_receiver(ctx: &Value, receiver: Option<&Expr>, args: &[Expr]) -> Result<Value> {
    match receiver {
        Some(expr) => eval(ctx, expr),
        None => match args.first() {
            Some(expr) => eval(ctx, expr),
            None => Ok(Value::Null),
        },
    }
}

fn eval_string_call(
    ctx: &Value,
    method: &str,
    receiver: Option<&Expr>,
    args: &[Expr],
) -> Result<Value> {
    let subject = eval_receiver(ctx, receiver, &[])?;
    let Some(s) = subject.as_str() else {
        // String functions over a missing or non-string field never match.
        return Ok(Value::Null);
    };
    let arg_str = |i: usize| -> Result<String> {
        let value = args
            .get(i)
            .map(|a| eval(ctx, a))
            .transpose()?
            .unwrap_or(Value::Null);
        match value {
            Value::String(s) => Ok(s),
            other => Ok(render(&other)),
        }
    };

    let result = match method {
        "contains" => Value::Bool(s.contains(&arg_str(0)?)),
        "starts_with" => Value::Bool(s.starts_with(&arg_str(0)?)),
        "ends_with" => Value::Bool(s.ends_with(&arg_str(0)?)),
        "to_lower" => Value::String(s.to_lowercase()),
        "to_upper" => Value::String(s.to_uppercase()),
        "trim_start" => Value::String(s.trim_start().to_string()),
        "trim_end" => Value::String(s.trim_end().to_string()),
        "reverse" => Value::String(s.chars().rev().collect()),
        "count" => Value::from(s.chars().count() as i64),
        "concat" => {
            let mut out = s.to_string();
            for i in 0..args.len() {
                out.push_str(&arg_str(i)?);
            }
            Value::String(out)
        }
        "index_of" => {
            let needle = arg_str(0)?;
            match s.find(&needle) {
                Some(byte_pos) => Value::from(s[..byte_pos].chars().count() as i64),
                None => Value::from(-1),
            }
        }
        "replace" => Value::String(s.replace(&arg_str(0)?, &arg_str(1)?)),
        "substring" => {
            let start = eval_int_arg(ctx, args, 0)? as usize;
            let len = eval_int_arg(ctx, args, 1)? as usize;
            Value::String(s.chars().skip(start).take(len).collect())
        }
        other => {
            return Err(StoreError::InvalidArgument(format!(
                "String.{other} is not implemented by the in-memory evaluator"
            )))
        }
    };
    Ok(result)
}

fn eval_math_call(
    ctx: &Value,
    method: &str,
    receiver: Option<&Expr>,
    args: &[Expr],
) -> Result<Value> {
    let subject = eval_receiver(ctx, receiver, args)?;
    let Some(n) = subject.as_f64() else {
        return Ok(Value::Null);
    };

    let result = match method {
        "abs" => n.abs(),
        "ceiling" => n.ceil(),
        "floor" => n.floor(),
        "round" => n.round(),
        "sign" => n.signum(),
        "sqrt" => n.sqrt(),
        "truncate" => n.trunc(),
        "exp" => n.exp(),
        "log" => n.ln(),
        "log10" => n.log10(),
        "sin" => n.sin(),
        "cos" => n.cos(),
        "tan" => n.tan(),
        "asin" => n.asin(),
        "acos" => n.acos(),
        "atan" => n.atan(),
        "pow" => {
            // Exponent follows the subject argument.
            let exp_index = if receiver.is_some() { 0 } else { 1 };
            let exponent = args
                .get(exp_index)
                .map(|a| eval(ctx, a))
                .transpose()?
                .and_then(|v| v.as_f64())
                .unwrap_or(f64::NAN);
            n.powf(exponent)
        }
        other => {
            return Err(StoreError::InvalidArgument(format!(
                "Math.{other} is not implemented by the in-memory evaluator"
            )))
        }
    };
    Ok(number(result))
}

fn eval_sequence_call(
    ctx: &Value,
    method: &str,
    receiver: Option<&Expr>,
    args: &[Expr],
) -> Result<Value> {
    let subject = eval_receiver(ctx, receiver, &[])?;
    let items: Vec<Value> = match subject {
        Value::Array(items) => items,
        // A missing or scalar field yields an empty sequence.
        Value::Null => Vec::new(),
        other => vec![other],
    };
    // The trailing `_async` suffix changes nothing in memory.
    let method = method.strip_suffix("_async").unwrap_or(method);

    let result = match method {
        "any" => match args.first() {
            Some(predicate) => {
                let mut found = false;
                for item in &items {
                    if matches(item, predicate)? {
                        found = true;
                        break;
                    }
                }
                Value::Bool(found)
            }
            None => Value::Bool(!items.is_empty()),
        },
        "contains" => {
            let needle = args
                .first()
                .map(|a| eval(ctx, a))
                .transpose()?
                .unwrap_or(Value::Null);
            Value::Bool(items.contains(&needle))
        }
        "count" => match args.first() {
            Some(predicate) => {
                let mut n = 0i64;
                for item in &items {
                    if matches(item, predicate)? {
                        n += 1;
                    }
                }
                Value::from(n)
            }
            None => Value::from(items.len() as i64),
        },
        "where" => {
            let predicate = args.first().ok_or_else(|| {
                StoreError::InvalidArgument("'where' requires a predicate".to_string())
            })?;
            let mut kept = Vec::new();
            for item in items {
                if matches(&item, predicate)? {
                    kept.push(item);
                }
            }
            Value::Array(kept)
        }
        "select" | "select_many" => {
            let projection = args.first().ok_or_else(|| {
                StoreError::InvalidArgument("'select' requires a projection".to_string())
            })?;
            let mut out = Vec::new();
            for item in &items {
                let projected = eval(item, projection)?;
                match projected {
                    Value::Array(nested) if method == "select_many" => out.extend(nested),
                    other => out.push(other),
                }
            }
            Value::Array(out)
        }
        "skip" => {
            let n = eval_int_arg(ctx, args, 0)?.max(0) as usize;
            Value::Array(items.into_iter().skip(n).collect())
        }
        "take" => {
            let n = eval_int_arg(ctx, args, 0)?.max(0) as usize;
            Value::Array(items.into_iter().take(n).collect())
        }
        "single" => {
            let mut matching = Vec::new();
            match args.first() {
                Some(predicate) => {
                    for item in items {
                        if matches(&item, predicate)? {
                            matching.push(item);
                        }
                    }
                }
                None => matching = items,
            }
            if matching.len() != 1 {
                return Err(StoreError::InvalidArgument(format!(
                    "'single' expected exactly one element, found {}",
                    matching.len()
                )));
            }
            matching.remove(0)
        }
        "order_by" | "order_by_descending" | "then_by" | "then_by_descending" => {
            let key = args.first().ok_or_else(|| {
                StoreError::InvalidArgument("ordering requires a key selector".to_string())
            })?;
            let mut keyed = Vec::with_capacity(items.len());
            for item in items {
                let k = eval(&item, key)?;
                keyed.push((k, item));
            }
            keyed.sort_by(|(a, _), (b, _)| compare(a, b).unwrap_or(Ordering::Equal));
            if method.ends_with("descending") {
                keyed.reverse();
            }
            Value::Array(keyed.into_iter().map(|(_, item)| item).collect())
        }
        "sum" | "min" | "max" | "average" => {
            let mut numbers = Vec::new();
            for item in &items {
                let v = match args.first() {
                    Some(selector) => eval(item, selector)?,
                    None => item.clone(),
                };
                if let Some(n) = v.as_f64() {
                    numbers.push(n);
                }
            }
            match method {
                "sum" => number(numbers.iter().sum()),
                "average" if numbers.is_empty() => Value::Null,
                "average" => number(numbers.iter().sum::<f64>() / numbers.len() as f64),
                "min" => numbers
                    .iter()
                    .cloned()
                    .fold(None::<f64>, |acc, n| Some(acc.map_or(n, |a| a.min(n))))
                    .map_or(Value::Null, number),
                _ => numbers
                    .iter()
                    .cloned()
                    .fold(None::<f64>, |acc, n| Some(acc.map_or(n, |a| a.max(n))))
                    .map_or(Value::Null, number),
            }
        }
        other => {
            return Err(StoreError::InvalidArgument(format!(
                "sequence operator '{other}' is not implemented by the in-memory evaluator"
            )))
        }
    };
    Ok(result)
}

fn eval_int_arg(ctx: &Value, args: &[Expr], index: usize) -> Result<i64> {
    args.get(index)
        .map(|a| eval(ctx, a))
        .transpose()?
        .and_then(|v| v.as_i64())
        .ok_or_else(|| {
            StoreError::InvalidArgument(format!("argument {index} must be an integer"))
        })
}

/// Only an actual boolean true is truthy; everything else is not a match.
fn truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TypeTag;
    use crate::validator::QueryCapabilityValidator;
    use serde_json::json;

    fn run(doc: &Value, expr: &Expr) -> bool {
        let rewritten = QueryCapabilityValidator::validate(expr).unwrap();
        matches(doc, &rewritten).unwrap()
    }

    #[test]
    fn field_equality_and_ordering() {
        let doc = json!({"name": "fred", "age": 42});
        assert!(run(&doc, &Expr::eq(Expr::field("name"), Expr::constant(json!("fred")))));
        assert!(!run(&doc, &Expr::eq(Expr::field("name"), Expr::constant(json!("f")))));
        assert!(run(
            &doc,
            &Expr::binary(BinaryOp::Gt, Expr::field("age"), Expr::constant(json!(40)))
        ));
        // Missing fields evaluate to null, never to a match.
        assert!(!run(
            &doc,
            &Expr::binary(BinaryOp::Lt, Expr::field("missing"), Expr::constant(json!(1)))
        ));
    }

    #[test]
    fn null_equals_null() {
        let doc = json!({"a": null});
        assert!(run(&doc, &Expr::eq(Expr::field("a"), Expr::Constant(Value::Null))));
        assert!(run(&doc, &Expr::is_null(Expr::field("a"))));
        assert!(run(&doc, &Expr::is_null(Expr::field("missing"))));
    }

    #[test]
    fn xor_evaluates_to_constant_false_after_rewrite() {
        let doc = json!({"a": true, "b": false});
        assert!(!run(&doc, &Expr::xor(Expr::field("a"), Expr::field("b"))));
        assert!(!run(&doc, &Expr::not(Expr::xor(Expr::field("a"), Expr::field("b")))));
    }

    #[test]
    fn string_functions() {
        let doc = json!({"name": "Frederick"});
        let call = |method: &str, arg: &str| {
            Expr::call(
                CallTarget::String,
                method,
                Some(Expr::field("name")),
                vec![Expr::constant(json!(arg))],
                true,
            )
        };
        assert!(run(&doc, &call("contains", "red")));
        assert!(run(&doc, &call("starts_with", "Fred")));
        assert!(run(&doc, &call("ends_with", "rick")));
        assert!(!run(&doc, &call("contains", "wilma")));
    }

    #[test]
    fn sequence_any_binds_elements() {
        let doc = json!({"orders": [{"total": 5}, {"total": 50}]});
        let expr = Expr::call(
            CallTarget::Sequence,
            "any",
            Some(Expr::field("orders")),
            vec![Expr::binary(
                BinaryOp::Gt,
                Expr::field("total"),
                Expr::constant(json!(10)),
            )],
            true,
        );
        assert!(run(&doc, &expr));

        let none = json!({"orders": [{"total": 1}]});
        assert!(!run(&none, &expr));
    }

    #[test]
    fn nullable_enum_comparison_does_not_raise_on_null() {
        // status is a nullable enum, absent on this document.
        let doc = json!({"id": "a"});
        let model = Expr::convert(
            Expr::member(
                Expr::field_tagged("status", TypeTag::NullableEnum),
                "value",
                TypeTag::Primitive,
            ),
            TypeTag::NullableInt,
        );
        let comparand = Expr::convert(Expr::constant(json!(2)), TypeTag::NullableInt);
        let expr = Expr::eq(model, comparand);

        // Without the rewrite the null side would not be comparable; with
        // it, the document simply does not match.
        assert!(!run(&doc, &expr));

        let set = json!({"id": "b", "status": 2});
        assert!(run(&set, &expr));
    }

    #[test]
    fn aggregates_over_sequences() {
        let doc = json!({"xs": [1, 2, 3, 4]});
        let agg = |method: &str| {
            Expr::call(
                CallTarget::Sequence,
                method,
                Some(Expr::field("xs")),
                vec![],
                true,
            )
        };
        let rewritten = QueryCapabilityValidator::validate(&agg("sum")).unwrap();
        assert_eq!(eval(&doc, &rewritten).unwrap(), json!(10));
        let rewritten = QueryCapabilityValidator::validate(&agg("average")).unwrap();
        assert_eq!(eval(&doc, &rewritten).unwrap(), json!(2.5));
        let rewritten = QueryCapabilityValidator::validate(&agg("count")).unwrap();
        assert_eq!(eval(&doc, &rewritten).unwrap(), json!(4));
        let rewritten = QueryCapabilityValidator::validate(&agg("min")).unwrap();
        assert_eq!(eval(&doc, &rewritten).unwrap(), json!(1));
        let rewritten = QueryCapabilityValidator::validate(&agg("max")).unwrap();
        assert_eq!(eval(&doc, &rewritten).unwrap(), json!(4));
    }
}
