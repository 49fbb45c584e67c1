//! Predicate AST
//!
//! Queries arrive as an explicit expression tree built by the caller's
//! query layer: member accesses over document fields, constants, unary and
//! binary operators, function calls, and widening conversions. Nodes carry
//! just enough type information for the capability validator's rewrites:
//! which member accesses are document-typed, which are nullable enums, and
//! which conversions widen to a nullable integer.

use serde_json::Value;

/// Lightweight type tag attached to member accesses and conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// The queried document type itself.
    Document,
    /// A nullable enum field.
    NullableEnum,
    /// A nullable integer (the widened form enum comparisons take).
    NullableInt,
    /// A primitive scalar.
    Primitive,
    /// Anything else.
    Other,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation.
    Not,
    /// Numeric negation.
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
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
    /// Logical and.
    And,
    /// Logical or.
    Or,
    /// Logical exclusive-or. The remote engine cannot express it; the
    /// validator rewrites it to a constant-false comparison.
    Xor,
    /// Null-coalescing; introduced by the nullable-enum rewrite.
    Coalesce,
}

/// Declaring type/namespace of a called function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// String functions.
    String,
    /// Numeric functions.
    Math,
    /// Array functions.
    Array,
    /// Ordered sequence operators (the queryable surface).
    Queryable,
    /// Plain sequence operators; also carries the subquery-only `any`.
    Sequence,
    /// Functions available on any value (`to_string`).
    Object,
    /// The emulation's own client surface; never validated.
    Emulator,
    /// Engine marker extensions (`is_null`, `is_defined`).
    Marker,
    /// Any other declaring type, named.
    Other(String),
}

impl std::fmt::Display for CallTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallTarget::String => write!(f, "String"),
            CallTarget::Math => write!(f, "Math"),
            CallTarget::Array => write!(f, "Array"),
            CallTarget::Queryable => write!(f, "Queryable"),
            CallTarget::Sequence => write!(f, "Sequence"),
            CallTarget::Object => write!(f, "Object"),
            CallTarget::Emulator => write!(f, "Emulator"),
            CallTarget::Marker => write!(f, "Marker"),
            CallTarget::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A predicate expression over document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Access a member of the context document (`object == None`) or of
    /// another expression's result.
    MemberAccess {
        /// The accessed object; `None` means the queried document.
        object: Option<Box<Expr>>,
        /// Member name, matching the JSON field.
        member: String,
        /// Static type of the access result.
        tag: TypeTag,
    },
    /// A constant JSON value.
    Constant(Value),
    /// A unary operator application.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// A binary operator application.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A function call.
    Call {
        /// Declaring type/namespace of the function.
        target: CallTarget,
        /// Function name, snake_case.
        method: String,
        /// Receiver expression for instance-style calls.
        receiver: Option<Box<Expr>>,
        /// Arguments. Sequence operators treat a predicate/projection
        /// argument as implicitly bound to each element.
        args: Vec<Expr>,
        /// Whether the function returns a primitive scalar.
        returns_primitive: bool,
    },
    /// A widening conversion.
    Convert {
        /// The converted expression.
        operand: Box<Expr>,
        /// Target type of the conversion.
        to: TypeTag,
    },
}

impl Expr {
    /// Access a field of the queried document.
    pub fn field(name: impl Into<String>) -> Self {
        Expr::MemberAccess {
            object: None,
            member: name.into(),
            tag: TypeTag::Other,
        }
    }

    /// Access a field of the queried document with an explicit type tag.
    pub fn field_tagged(name: impl Into<String>, tag: TypeTag) -> Self {
        Expr::MemberAccess {
            object: None,
            member: name.into(),
            tag,
        }
    }

    /// Access a member of another expression's result.
    pub fn member(object: Expr, name: impl Into<String>, tag: TypeTag) -> Self {
        Expr::MemberAccess {
            object: Some(Box::new(object)),
            member: name.into(),
            tag,
        }
    }

    /// A constant value.
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    /// A widening conversion.
    pub fn convert(operand: Expr, to: TypeTag) -> Self {
        Expr::Convert {
            operand: Box::new(operand),
            to,
        }
    }

    /// Build a binary node.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Equality comparison.
    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    /// Inequality comparison.
    pub fn ne(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Ne, left, right)
    }

    /// Logical and.
    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    /// Logical or.
    pub fn or(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Or, left, right)
    }

    /// Logical exclusive-or.
    pub fn xor(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Xor, left, right)
    }

    /// Logical negation.
    pub fn not(operand: Expr) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }
    }

    /// A function call.
    pub fn call(
        target: CallTarget,
        method: impl Into<String>,
        receiver: Option<Expr>,
        args: Vec<Expr>,
        returns_primitive: bool,
    ) -> Self {
        Expr::Call {
            target,
            method: method.into(),
            receiver: receiver.map(Box::new),
            args,
            returns_primitive,
        }
    }

    /// The engine's `is_null` marker over an expression.
    pub fn is_null(arg: Expr) -> Self {
        Self::call(CallTarget::Marker, "is_null", None, vec![arg], true)
    }

    /// The engine's `is_defined` marker over an expression.
    pub fn is_defined(arg: Expr) -> Self {
        Self::call(CallTarget::Marker, "is_defined", None, vec![arg], true)
    }

    /// Static type tag of this expression, where one is known.
    pub fn tag(&self) -> TypeTag {
        match self {
            Expr::MemberAccess { tag, .. } => *tag,
            Expr::Convert { to, .. } => *to,
            Expr::Constant(_) => TypeTag::Primitive,
            _ => TypeTag::Other,
        }
    }
}
