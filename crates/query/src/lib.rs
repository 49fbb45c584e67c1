//! Query capability validation and in-memory evaluation
//!
//! The remote query engine supports a fixed subset of functions and has a
//! few semantic quirks around null handling. This crate makes in-memory
//! query results agree with it:
//! - [`ast`]: an explicit tagged-union predicate AST built by the caller's
//!   query layer
//! - [`QueryCapabilityValidator`]: rejects operators the remote engine
//!   does not support and rewrites a few expression forms to match its
//!   semantics
//! - [`eval`]: an ordinary in-memory evaluator for the rewritten AST
//!
//! Validation always runs first; rejected nodes never reach rewriting,
//! and rewriting always runs before evaluation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod eval;
pub mod validator;

pub use ast::{BinaryOp, CallTarget, Expr, TypeTag, UnaryOp};
pub use validator::QueryCapabilityValidator;
