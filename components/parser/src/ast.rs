//! Abstract Syntax Tree node definitions
//!
//! Every node carries the source position of the token that introduced it.
//! Nodes are `Clone` so declarations can be stored and re-compiled with
//! different parameter types.

use core_types::SourcePosition;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `or`
    Or,
    /// `and`
    And,
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `>=`
    Gte,
    /// `in`
    In,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `**`, repeats an item into an array
    Repeat,
}

impl BinaryOp {
    /// Source text of the operator
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Lte => "<=",
            BinaryOp::Gte => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Repeat => "**",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation
    Neg,
    /// Logical negation
    Not,
}

impl UnaryOp {
    /// Source text of the operator
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
        }
    }
}

/// A type expression
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    /// Shape of the type
    pub kind: TypeExprKind,
    /// Source location
    pub position: SourcePosition,
}

/// Shapes of type expressions
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// Built-in or declared type name
    Named(String),
    /// `[T]`
    Array(Box<TypeExpr>),
    /// `sequence(T)`
    Sequence(Box<TypeExpr>),
    /// `{name T, ...}`
    Record(Vec<FieldType>),
    /// `(a T, b U, ...)`, item names are not kept
    Tuple(Vec<TypeExpr>),
    /// `T | U | ...`
    Variant(Vec<TypeExpr>),
    /// `null`
    Null,
}

/// A field of a record type expression
#[derive(Debug, Clone, PartialEq)]
pub struct FieldType {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeExpr,
    /// Source location
    pub position: SourcePosition,
}

impl TypeExpr {
    /// Create a type expression
    pub fn new(kind: TypeExprKind, position: SourcePosition) -> Self {
        Self { kind, position }
    }

    /// Create a named type expression
    pub fn named(name: impl Into<String>, position: SourcePosition) -> Self {
        Self::new(TypeExprKind::Named(name.into()), position)
    }
}

/// An expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Shape of the expression
    pub kind: ExprKind,
    /// Source location
    pub position: SourcePosition,
}

/// Shapes of expressions
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal
    Integer(i64),
    /// Real literal
    Real(f64),
    /// Text literal
    Text(String),
    /// `true` or `false`
    Boolean(bool),
    /// `null`
    Null,
    /// Variable reference
    Variable(String),
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `a || b || ...`
    Concat(Vec<Expr>),
    /// `(a, b, ...)`
    Tuple(Vec<Expr>),
    /// `[a, b, ...]`
    Array(Vec<Expr>),
    /// `{name: value, ...}`
    Record(Vec<RecordField>),
    /// `e[i]` or `e[i..j]`
    Index {
        /// Indexed array
        indexed: Box<Expr>,
        /// Index or first index of a slice
        index: Box<Expr>,
        /// Last index of a slice
        index_to: Option<Box<Expr>>,
    },
    /// `e.field`
    Field {
        /// Record expression
        record: Box<Expr>,
        /// Field name
        field: String,
    },
    /// `f(args)`
    Call {
        /// Callable name
        name: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `e as T`
    As {
        /// Converted expression
        expr: Box<Expr>,
        /// Target type
        ty: TypeExpr,
    },
    /// `case [e] when v then r ... else r end`
    Case {
        /// Compared value, `None` for boolean guards
        case: Option<Box<Expr>>,
        /// Branches in order
        whens: Vec<CaseArm>,
        /// Default result
        otherwise: Box<Expr>,
    },
    /// `kindof e when T v then r ... [else r] end`
    Kindof {
        /// Variant value
        case: Box<Expr>,
        /// Branches in order
        whens: Vec<KindofArm>,
        /// Default result
        otherwise: Option<Box<Expr>>,
    },
}

/// `name: value` inside a record literal
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    /// Field name
    pub name: String,
    /// Field value
    pub value: Expr,
    /// Source location
    pub position: SourcePosition,
}

/// `when value then result` of a case expression
#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    /// Compared value or boolean guard
    pub when: Expr,
    /// Result
    pub then: Expr,
}

/// `when T v then result` of a kindof expression
#[derive(Debug, Clone, PartialEq)]
pub struct KindofArm {
    /// Member type
    pub ty: TypeExpr,
    /// Name bound to the narrowed value
    pub var: String,
    /// Result
    pub then: Expr,
    /// Source location
    pub position: SourcePosition,
}

impl Expr {
    /// Create an expression
    pub fn new(kind: ExprKind, position: SourcePosition) -> Self {
        Self { kind, position }
    }

    /// Create a variable reference
    pub fn variable(name: impl Into<String>, position: SourcePosition) -> Self {
        Self::new(ExprKind::Variable(name.into()), position)
    }
}

/// A sequence of statements with an optional exception clause
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Statements in order
    pub statements: Vec<Stmt>,
    /// `exception when ... end` handlers
    pub exception: Option<Box<ExceptionClause>>,
    /// Source location
    pub position: SourcePosition,
}

impl Block {
    /// Create a block without exception clause
    pub fn new(statements: Vec<Stmt>, position: SourcePosition) -> Self {
        Self {
            statements,
            exception: None,
            position,
        }
    }
}

/// Handlers of a protected block
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionClause {
    /// `when code then ...` handlers in order
    pub whens: Vec<ExceptionWhen>,
    /// `else ...` handler
    pub otherwise: Option<Block>,
}

/// `when code then ...` inside an exception clause
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionWhen {
    /// Error code
    pub value: Expr,
    /// Handler body
    pub body: Block,
}

/// `when T v then ...` of a kindof statement
#[derive(Debug, Clone, PartialEq)]
pub struct KindofBranch {
    /// Member type
    pub ty: TypeExpr,
    /// Name bound to the narrowed value
    pub var: String,
    /// Branch body
    pub body: Block,
    /// Source location
    pub position: SourcePosition,
}

/// A parameter declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Declared type, `any` makes the declaration generic
    pub ty: TypeExpr,
    /// Source location
    pub position: SourcePosition,
}

/// Function or generator declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// Function name
    pub name: String,
    /// Parameters
    pub params: Vec<Param>,
    /// Declared result type, or the yielded type of a generator
    pub return_type: TypeExpr,
    /// Body
    pub body: Block,
    /// Declared with `generator`
    pub is_generator: bool,
    /// Source location
    pub position: SourcePosition,
}

/// Procedure declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureDecl {
    /// Procedure name
    pub name: String,
    /// Parameters
    pub params: Vec<Param>,
    /// Body
    pub body: Block,
    /// Source location
    pub position: SourcePosition,
}

/// A statement
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Shape of the statement
    pub kind: StmtKind,
    /// Source location
    pub position: SourcePosition,
}

/// Shapes of statements
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `var a := e` or `const (a, b) := e`
    Var {
        /// Declared names, more than one destructures a tuple
        names: Vec<String>,
        /// Initial value
        value: Expr,
        /// Declared with `const`
        is_const: bool,
    },
    /// `type Name T`
    TypeDecl {
        /// Declared name
        name: String,
        /// Underlying type
        ty: TypeExpr,
    },
    /// `target := value`
    Assign {
        /// Written location
        target: Expr,
        /// Assigned value
        value: Expr,
    },
    /// A call used as a statement
    ProcedureCall {
        /// Procedure name
        name: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// `begin ... end`
    Block(Block),
    /// `if c then ... [elsif ...] [else ...] end if`
    If {
        /// Condition
        condition: Expr,
        /// Body when true
        then_branch: Block,
        /// `elsif` (as a nested `If`) or `else` block
        else_branch: Option<Box<Stmt>>,
    },
    /// `while c loop ... end loop`
    While {
        /// Condition
        condition: Expr,
        /// Body
        body: Block,
    },
    /// `for i in [reverse] e [.. e] loop ... end loop`
    For {
        /// Loop variable
        index: String,
        /// Iterate backwards
        reverse: bool,
        /// Range start, array or sequence
        sequence: Expr,
        /// Range end
        sequence_to: Option<Expr>,
        /// Body
        body: Block,
    },
    /// `exit [when c]`
    Exit {
        /// Optional guard
        condition: Option<Expr>,
    },
    /// `return [e]`
    Return(Option<Expr>),
    /// `yield e`
    Yield(Expr),
    /// `raise e`
    Raise(Expr),
    /// `kindof e when T v then ... [else ...] end kindof`
    Kindof {
        /// Variant value
        case: Expr,
        /// Branches in order
        whens: Vec<KindofBranch>,
        /// Default body
        otherwise: Option<Block>,
    },
    /// Function or generator declaration
    Function(FunctionDecl),
    /// Procedure declaration
    Procedure(ProcedureDecl),
    /// `@name@`
    Directive(String),
}

impl Stmt {
    /// Create a statement
    pub fn new(kind: StmtKind, position: SourcePosition) -> Self {
        Self { kind, position }
    }
}
