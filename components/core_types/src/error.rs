//! Parse and compile error types.
//!
//! Errors are returned by value from every parser and compiler function and
//! always carry the source position of the offending construct.

use crate::SourcePosition;
use std::fmt;

/// The kind of parse or compile error.
///
/// Each variant renders to exactly one user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A token other than the expected one was read
    UnexpectedToken {
        /// Text of the token that was found
        found: String,
        /// Description of what was expected
        expected: String,
    },
    /// A character sequence that forms no token
    UnknownToken(String),
    /// The name after `end` does not match the declaration
    WrongEndSuffix {
        /// Suffix written after `end`
        found: String,
        /// Name of the enclosing declaration
        expected: String,
    },
    /// A `@directive@` the compiler does not know
    UnknownDirective(String),
    /// The left side of `:=` cannot be written to
    UnassignableLeftExpression,
    /// Assignment to a `const` variable
    CantMutateConst(String),
    /// Binary operator not applicable
    UnknownBinaryOperator(String),
    /// Unary operator not applicable
    UnknownUnaryOperator(String),
    /// Type mismatch
    WrongType {
        /// Key of the type that was found
        found: String,
        /// Key or description of the expected type
        expected: String,
    },
    /// `any` used where a concrete type is required
    AnyNotAllowed,
    /// Type name not declared
    UnknownType(String),
    /// Variable declared twice in the same scope
    VariableAlreadyExists(String),
    /// Parameter name repeated in a parameter list
    ParameterAlreadyExists(String),
    /// Function with the same signature already declared
    FunctionAlreadyExists(String),
    /// Procedure with the same signature already declared
    ProcedureAlreadyExists(String),
    /// Type name declared twice
    TypeAlreadyExists(String),
    /// Variable not visible from the current scope
    UnknownVariable(String),
    /// Record has no such field
    UnknownField {
        /// Requested field name
        field: String,
        /// Key of the record type
        record: String,
    },
    /// No function matches the call signature
    UnknownFunction(String),
    /// No procedure matches the call signature
    UnknownProcedure(String),
    /// A function body can complete without returning
    NoReturn(String),
    /// `exit` outside of a loop
    UnexpectedExit,
    /// `return` outside of a function or procedure
    UnexpectedReturn,
    /// `return e` in a procedure
    UnexpectedReturnWithValue,
    /// `return` without a value in a function
    UnexpectedReturnWithoutValue,
    /// `yield` outside of a generator
    UnexpectedYield,
    /// Statement after a `return` or `raise`
    UnreachableCode,
    /// Two `when` branches for the same variant member
    VariantKindAlreadyManaged(String),
    /// A variant member has no branch and there is no `else`
    VariantKindNotManaged(String),
    /// A `when` type that is not a member of the variant
    UnknownKind(String),
    /// Record field declared twice
    FieldAlreadyExists(String),
    /// A variant listed as a member of another variant
    CantNestVariant(String),
    /// A variant listing the same member twice
    DuplicateVariantMember(String),
    /// `[]` without an expected array type
    UntypedEmptyArray,
    /// Tuple destructuring with the wrong arity
    TupleSizeMismatch {
        /// Number of items in the value
        found: usize,
        /// Number of names on the left side
        expected: usize,
    },
    /// Two member overloads collapse to the same dispatch method
    DuplicateDispatchMethod(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnexpectedToken { found, expected } => {
                write!(f, "Unexpected token {}, expected {}", found, expected)
            }
            ErrorKind::UnknownToken(t) => write!(f, "Unknown token {}", t),
            ErrorKind::WrongEndSuffix { found, expected } => {
                write!(f, "Wrong end suffix {}, expected {}", found, expected)
            }
            ErrorKind::UnknownDirective(d) => write!(f, "Unknown directive {}", d),
            ErrorKind::UnassignableLeftExpression => write!(f, "Unassignable left expression"),
            ErrorKind::CantMutateConst(v) => write!(f, "Can't mutate const {}", v),
            ErrorKind::UnknownBinaryOperator(op) => write!(f, "Unknown binary operator {}", op),
            ErrorKind::UnknownUnaryOperator(op) => write!(f, "Unknown unary operator {}", op),
            ErrorKind::WrongType { found, expected } => {
                write!(f, "Wrong type {}, expected {}", found, expected)
            }
            ErrorKind::AnyNotAllowed => write!(f, "Type any is not allowed here"),
            ErrorKind::UnknownType(t) => write!(f, "Unknown type {}", t),
            ErrorKind::VariableAlreadyExists(v) => write!(f, "Variable {} already exists", v),
            ErrorKind::ParameterAlreadyExists(p) => write!(f, "Parameter {} already exists", p),
            ErrorKind::FunctionAlreadyExists(k) => write!(f, "Function {} already exists", k),
            ErrorKind::ProcedureAlreadyExists(k) => write!(f, "Procedure {} already exists", k),
            ErrorKind::TypeAlreadyExists(t) => write!(f, "Type {} already exists", t),
            ErrorKind::UnknownVariable(v) => write!(f, "Unknown variable {}", v),
            ErrorKind::UnknownField { field, record } => {
                write!(f, "Unknown field {} in {}", field, record)
            }
            ErrorKind::UnknownFunction(k) => write!(f, "Unknown function {}", k),
            ErrorKind::UnknownProcedure(k) => write!(f, "Unknown procedure {}", k),
            ErrorKind::NoReturn(k) => write!(f, "No return for function {}", k),
            ErrorKind::UnexpectedExit => write!(f, "Unexpected exit"),
            ErrorKind::UnexpectedReturn => write!(f, "Unexpected return"),
            ErrorKind::UnexpectedReturnWithValue => write!(f, "Unexpected return with value"),
            ErrorKind::UnexpectedReturnWithoutValue => {
                write!(f, "Unexpected return without value")
            }
            ErrorKind::UnexpectedYield => write!(f, "Unexpected yield"),
            ErrorKind::UnreachableCode => write!(f, "Unreachable code"),
            ErrorKind::VariantKindAlreadyManaged(k) => {
                write!(f, "Variant kind {} already managed", k)
            }
            ErrorKind::VariantKindNotManaged(k) => write!(f, "Variant kind {} not managed", k),
            ErrorKind::UnknownKind(k) => write!(f, "Unknown kind {}", k),
            ErrorKind::FieldAlreadyExists(n) => write!(f, "Field {} already exists", n),
            ErrorKind::CantNestVariant(k) => write!(f, "Can't nest variant {}", k),
            ErrorKind::DuplicateVariantMember(k) => write!(f, "Duplicate variant member {}", k),
            ErrorKind::UntypedEmptyArray => {
                write!(f, "Empty array must be typed with the as operator")
            }
            ErrorKind::TupleSizeMismatch { found, expected } => write!(
                f,
                "Tuple with {} items when {} were expected",
                found, expected
            ),
            ErrorKind::DuplicateDispatchMethod(k) => {
                write!(f, "Duplicate method {} in variant dispatch", k)
            }
        }
    }
}

/// A parse or compile error with its source position.
///
/// # Examples
///
/// ```
/// use core_types::{CompileError, ErrorKind, SourcePosition};
///
/// let error = CompileError::new(ErrorKind::UnexpectedExit, SourcePosition::new(1, 1));
/// assert_eq!(error.message(), "Unexpected exit");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// What went wrong
    pub kind: ErrorKind,
    /// Where it went wrong
    pub position: SourcePosition,
}

impl CompileError {
    /// Create an error of the given kind at a position
    pub fn new(kind: ErrorKind, position: SourcePosition) -> Self {
        Self { kind, position }
    }

    /// The message without the position suffix
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.position)
    }
}

impl std::error::Error for CompileError {}

/// Result type for parse and compile operations
pub type CompileResult<T> = Result<T, CompileError>;
