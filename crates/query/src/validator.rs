//! Query capability validation and rewriting
//!
//! Walks a predicate tree and (a) rejects any referenced function absent
//! from the remote engine's allow-list, (b) rewrites a few expression
//! forms so in-memory evaluation agrees with the remote engine's quirks.
//! Integration tests against the live service back every entry here.
//!
//! ## Rewrites
//!
//! - Logical XOR (and its negation) becomes a constant-false comparison:
//!   the remote engine cannot express it.
//! - The `is_defined` marker becomes constant true (deeper defined vs.
//!   undefined semantics are not reproduced).
//! - The `is_null` marker becomes an explicit equals-null comparison.
//! - Equality over a widened nullable-enum member access coalesces both
//!   sides against a reserved "no value" sentinel first: naive evaluation
//!   raises on a null enum comparison while the remote engine treats it
//!   as comparable.
//!
//! Validation runs first; a rejected node never reaches rewriting.

use crate::ast::{BinaryOp, CallTarget, Expr, TypeTag, UnaryOp};
use cosmock_core::error::{Result, StoreError};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

const STRING_FUNCTIONS: &[&str] = &[
    "concat",
    "contains",
    "count",
    "ends_with",
    "index_of",
    "replace",
    "reverse",
    "starts_with",
    "substring",
    "to_lower",
    "to_upper",
    "trim_end",
    "trim_start",
];

const MATH_FUNCTIONS: &[&str] = &[
    "abs", "acos", "asin", "atan", "ceiling", "cos", "exp", "floor", "log", "log10", "pow",
    "round", "sign", "sin", "sqrt", "tan", "truncate",
];

const ARRAY_FUNCTIONS: &[&str] = &["concat", "contains", "count"];

const QUERYABLE_FUNCTIONS: &[&str] = &[
    "select",
    "contains",
    "where",
    "single",
    "select_many",
    "order_by",
    "order_by_descending",
    "then_by",
    "then_by_descending",
    "count",
    "sum",
    "min",
    "max",
    "average",
    "count_async",
    "sum_async",
    "min_async",
    "max_async",
    "average_async",
    "skip",
    "take",
];

// `any` is sequence-only: the engine supports it as a subquery but not as
// an aggregation over the queryable surface.
const SEQUENCE_FUNCTIONS: &[&str] = &[
    "select",
    "contains",
    "where",
    "single",
    "select_many",
    "order_by",
    "order_by_descending",
    "then_by",
    "then_by_descending",
    "count",
    "sum",
    "min",
    "max",
    "average",
    "count_async",
    "sum_async",
    "min_async",
    "max_async",
    "average_async",
    "skip",
    "take",
    "any",
];

const OBJECT_FUNCTIONS: &[&str] = &["to_string"];

static ALLOW_LIST: Lazy<HashMap<CallTarget, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        (CallTarget::String, STRING_FUNCTIONS),
        (CallTarget::Math, MATH_FUNCTIONS),
        (CallTarget::Array, ARRAY_FUNCTIONS),
        (CallTarget::Queryable, QUERYABLE_FUNCTIONS),
        (CallTarget::Sequence, SEQUENCE_FUNCTIONS),
        (CallTarget::Object, OBJECT_FUNCTIONS),
    ])
});

/// Reserved "no value" sentinel the nullable-enum rewrite coalesces against.
pub const NO_VALUE_SENTINEL: i32 = i32::MIN;

/// Validates a predicate against the remote engine's capabilities and
/// rewrites it for in-memory evaluation.
pub struct QueryCapabilityValidator;

impl QueryCapabilityValidator {
    /// Validate and rewrite a predicate.
    ///
    /// Fails with [`StoreError::QueryCapabilityRejected`] on the first
    /// unsupported call, before any document is scanned.
    pub fn validate(expr: &Expr) -> Result<Expr> {
        Self::visit(expr)
    }

    fn visit(expr: &Expr) -> Result<Expr> {
        match expr {
            Expr::Constant(_) => Ok(expr.clone()),
            Expr::MemberAccess {
                object,
                member,
                tag,
            } => {
                let object = match object {
                    Some(inner) => Some(Box::new(Self::visit(inner)?)),
                    None => None,
                };
                Ok(Expr::MemberAccess {
                    object,
                    member: member.clone(),
                    tag: *tag,
                })
            }
            Expr::Convert { operand, to } => Ok(Expr::Convert {
                operand: Box::new(Self::visit(operand)?),
                to: *to,
            }),
            Expr::Unary { op, operand } => Self::visit_unary(*op, operand),
            Expr::Binary { op, left, right } => Self::visit_binary(*op, left, right),
            Expr::Call { .. } => Self::visit_call(expr),
        }
    }

    fn visit_unary(op: UnaryOp, operand: &Expr) -> Result<Expr> {
        // The negation of an XOR is as inexpressible as the XOR itself.
        if op == UnaryOp::Not
            && matches!(
                operand,
                Expr::Binary {
                    op: BinaryOp::Xor,
                    ..
                }
            )
        {
            return Ok(constant_false());
        }
        Ok(Expr::Unary {
            op,
            operand: Box::new(Self::visit(operand)?),
        })
    }

    fn visit_binary(op: BinaryOp, left: &Expr, right: &Expr) -> Result<Expr> {
        if op == BinaryOp::Xor {
            return Ok(constant_false());
        }

        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            if let Some((model, comparand)) = rewrite_nullable_enum(op, left, right)
                .or_else(|| rewrite_nullable_enum(op, right, left))
            {
                return Ok(Expr::Binary {
                    op,
                    left: Box::new(Self::visit(&model)?),
                    right: Box::new(Self::visit(&comparand)?),
                });
            }
        }

        Ok(Expr::Binary {
            op,
            left: Box::new(Self::visit(left)?),
            right: Box::new(Self::visit(right)?),
        })
    }

    fn visit_call(expr: &Expr) -> Result<Expr> {
        let Expr::Call {
            target,
            method,
            receiver,
            args,
            returns_primitive,
        } = expr
        else {
            return Self::visit(expr);
        };

        Self::guard_call(target, method, receiver.as_deref(), *returns_primitive)?;

        if *target == CallTarget::Marker {
            // The markers pass the guard through the primitive-return
            // escape and are replaced before evaluation. Anything else on
            // the marker surface has no rewrite and no evaluator.
            let replacement = match method.as_str() {
                "is_defined" => Expr::Constant(Value::Bool(true)),
                "is_null" => {
                    let arg = args
                        .first()
                        .cloned()
                        .unwrap_or(Expr::Constant(Value::Null));
                    Expr::eq(arg, Expr::Constant(Value::Null))
                }
                _ => {
                    return Err(StoreError::QueryCapabilityRejected {
                        declaring: target.to_string(),
                        method: method.clone(),
                    })
                }
            };
            return Self::visit(&replacement);
        }

        let receiver = match receiver {
            Some(inner) => Some(Box::new(Self::visit(inner)?)),
            None => None,
        };
        let args = args.iter().map(Self::visit).collect::<Result<Vec<_>>>()?;
        Ok(Expr::Call {
            target: target.clone(),
            method: method.clone(),
            receiver,
            args,
            returns_primitive: *returns_primitive,
        })
    }

    fn guard_call(
        target: &CallTarget,
        method: &str,
        receiver: Option<&Expr>,
        returns_primitive: bool,
    ) -> Result<()> {
        // Calls on the emulation's own surface are the adapter's business.
        if *target == CallTarget::Emulator {
            return Ok(());
        }

        match ALLOW_LIST.get(target) {
            None => {
                // A primitive-returning call whose receiver is not the
                // queried document runs client-side in the real stack, so
                // it is allowed even off-list.
                let receiver_is_document =
                    receiver.is_some_and(|r| r.tag() == TypeTag::Document);
                if returns_primitive && !receiver_is_document {
                    return Ok(());
                }
                Err(StoreError::QueryCapabilityRejected {
                    declaring: target.to_string(),
                    method: method.to_string(),
                })
            }
            Some(allowed) if allowed.contains(&method) => Ok(()),
            Some(_) => Err(StoreError::QueryCapabilityRejected {
                declaring: target.to_string(),
                method: method.to_string(),
            }),
        }
    }
}

/// `true == false`, the constant-false comparison the engine rewrite emits.
fn constant_false() -> Expr {
    Expr::eq(
        Expr::Constant(Value::Bool(true)),
        Expr::Constant(Value::Bool(false)),
    )
}

/// Detect and rewrite a widened nullable-enum comparison.
///
/// Pattern: `Convert(member.value, int?) <op> Convert(other, int?)` where
/// the member access unwraps a nullable enum. Both sides are coalesced
/// against the reserved sentinel so a null enum compares instead of
/// raising.
fn rewrite_nullable_enum(_op: BinaryOp, model: &Expr, comparand: &Expr) -> Option<(Expr, Expr)> {
    let Expr::Convert {
        operand: model_operand,
        to: TypeTag::NullableInt,
    } = model
    else {
        return None;
    };
    let Expr::Convert {
        operand: comparand_operand,
        to: _,
    } = comparand
    else {
        return None;
    };
    let Expr::MemberAccess {
        object: Some(enum_expr),
        member,
        tag,
    } = model_operand.as_ref()
    else {
        return None;
    };
    if member != "value" || enum_expr.tag() != TypeTag::NullableEnum {
        return None;
    }

    let sentinel = Expr::convert(
        Expr::Constant(Value::from(NO_VALUE_SENTINEL)),
        TypeTag::NullableEnum,
    );

    let coalesced_model = Expr::convert(
        Expr::member(
            Expr::binary(BinaryOp::Coalesce, enum_expr.as_ref().clone(), sentinel.clone()),
            member.clone(),
            *tag,
        ),
        TypeTag::NullableInt,
    );
    let coalesced_comparand = Expr::convert(
        Expr::binary(
            BinaryOp::Coalesce,
            comparand_operand.as_ref().clone(),
            sentinel,
        ),
        TypeTag::NullableInt,
    );

    Some((coalesced_model, coalesced_comparand))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_status() -> Expr {
        Expr::field_tagged("status", TypeTag::NullableEnum)
    }

    #[test]
    fn off_list_method_on_listed_target_is_rejected() {
        let expr = Expr::call(
            CallTarget::String,
            "pad_left",
            Some(Expr::field("name")),
            vec![],
            true,
        );
        let err = QueryCapabilityValidator::validate(&expr).unwrap_err();
        assert_eq!(
            err,
            StoreError::QueryCapabilityRejected {
                declaring: "String".to_string(),
                method: "pad_left".to_string(),
            }
        );
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn unknown_target_rejected_unless_primitive_off_document() {
        // Primitive return, receiver not the document: allowed.
        let allowed = Expr::call(
            CallTarget::Other("Clock".to_string()),
            "now_seconds",
            None,
            vec![],
            true,
        );
        assert!(QueryCapabilityValidator::validate(&allowed).is_ok());

        // Same call aimed at the document type: rejected.
        let rejected = Expr::call(
            CallTarget::Other("Clock".to_string()),
            "now_seconds",
            Some(Expr::field_tagged("self", TypeTag::Document)),
            vec![],
            true,
        );
        assert!(QueryCapabilityValidator::validate(&rejected).is_err());

        // Non-primitive return: rejected.
        let rejected = Expr::call(
            CallTarget::Other("Json".to_string()),
            "parse",
            None,
            vec![],
            false,
        );
        assert!(QueryCapabilityValidator::validate(&rejected).is_err());
    }

    #[test]
    fn any_is_sequence_only() {
        let on_sequence = Expr::call(
            CallTarget::Sequence,
            "any",
            Some(Expr::field("tags")),
            vec![],
            true,
        );
        assert!(QueryCapabilityValidator::validate(&on_sequence).is_ok());

        let on_queryable = Expr::call(
            CallTarget::Queryable,
            "any",
            Some(Expr::field("tags")),
            vec![],
            true,
        );
        assert!(QueryCapabilityValidator::validate(&on_queryable).is_err());
    }

    #[test]
    fn xor_and_its_negation_become_constant_false() {
        let xor = Expr::xor(Expr::field("a"), Expr::field("b"));
        let rewritten = QueryCapabilityValidator::validate(&xor).unwrap();
        assert_eq!(rewritten, constant_false());

        let not_xor = Expr::not(Expr::xor(Expr::field("a"), Expr::field("b")));
        let rewritten = QueryCapabilityValidator::validate(&not_xor).unwrap();
        assert_eq!(rewritten, constant_false());
    }

    #[test]
    fn markers_rewrite_before_evaluation() {
        let defined = Expr::is_defined(Expr::field("a"));
        assert_eq!(
            QueryCapabilityValidator::validate(&defined).unwrap(),
            Expr::Constant(Value::Bool(true))
        );

        let is_null = Expr::is_null(Expr::field("a"));
        assert_eq!(
            QueryCapabilityValidator::validate(&is_null).unwrap(),
            Expr::eq(Expr::field("a"), Expr::Constant(Value::Null))
        );

        // No argument degrades to null == null.
        let bare = Expr::call(CallTarget::Marker, "is_null", None, vec![], true);
        assert_eq!(
            QueryCapabilityValidator::validate(&bare).unwrap(),
            Expr::eq(Expr::Constant(Value::Null), Expr::Constant(Value::Null))
        );
    }

    #[test]
    fn unknown_marker_method_is_rejected() {
        let bogus = Expr::call(CallTarget::Marker, "bogus", None, vec![], true);
        assert_eq!(
            QueryCapabilityValidator::validate(&bogus).unwrap_err(),
            StoreError::QueryCapabilityRejected {
                declaring: "Marker".to_string(),
                method: "bogus".to_string(),
            }
        );

        // Nested, too: an unknown marker deep in a tree still fails.
        let nested = Expr::and(
            Expr::eq(Expr::field("a"), Expr::constant(json!(1))),
            Expr::call(CallTarget::Marker, "is_missing", None, vec![], true),
        );
        assert!(QueryCapabilityValidator::validate(&nested).is_err());
    }

    #[test]
    fn nullable_enum_equality_coalesces_both_sides() {
        let model = Expr::convert(
            Expr::member(doc_status(), "value", TypeTag::Primitive),
            TypeTag::NullableInt,
        );
        let comparand = Expr::convert(Expr::constant(json!(2)), TypeTag::NullableInt);
        let rewritten =
            QueryCapabilityValidator::validate(&Expr::eq(model.clone(), comparand.clone()))
                .unwrap();

        // Both sides now coalesce against the sentinel before comparing.
        let Expr::Binary { op, left, right } = rewritten else {
            panic!("expected a binary node");
        };
        assert_eq!(op, BinaryOp::Eq);
        assert!(matches!(*left, Expr::Convert { .. }));
        let Expr::Convert { operand, .. } = *right else {
            panic!("expected a conversion");
        };
        assert!(matches!(
            *operand,
            Expr::Binary {
                op: BinaryOp::Coalesce,
                ..
            }
        ));

        // The flipped orientation rewrites too.
        let flipped = Expr::eq(comparand, model);
        let rewritten = QueryCapabilityValidator::validate(&flipped).unwrap();
        assert!(matches!(rewritten, Expr::Binary { op: BinaryOp::Eq, .. }));
    }

    #[test]
    fn plain_comparisons_pass_through_unchanged() {
        let expr = Expr::eq(Expr::field("name"), Expr::constant(json!("fred")));
        assert_eq!(QueryCapabilityValidator::validate(&expr).unwrap(), expr);
    }

    #[test]
    fn rejection_happens_inside_nested_trees() {
        let expr = Expr::and(
            Expr::eq(Expr::field("a"), Expr::constant(json!(1))),
            Expr::call(
                CallTarget::Other("Regex".to_string()),
                "is_match",
                Some(Expr::field_tagged("self", TypeTag::Document)),
                vec![Expr::constant(json!("^a"))],
                true,
            ),
        );
        assert!(QueryCapabilityValidator::validate(&expr).is_err());
    }
}
