use serde::{Deserialize, Serialize};

/// Source position carried through lowering so diagnostics can point back at
/// the construct that produced them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Binary operators of the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Operator of an assignment statement. `Set` is plain `=`, the rest are the
/// compound forms (`+=`, `-=`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    #[default]
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl AssignOp {
    /// The binary operator a compound assignment expands to.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
        }
    }
}

/// Expression node of a scope-resolved, type-checked tree.
///
/// Names are already resolved by the front end; the lowering only maps them
/// onto storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    // ───────────────────────────── Literals ─────────────────────────────
    /// Number literal.
    Number(f64),

    /// Boolean literal.
    Bool(bool),

    /// Array literal: `[a, b, c]`.
    Array(Vec<Expr>),

    // ───────────────────────────── Storage ──────────────────────────────
    /// Read a variable in scope (local, parameter, or foreach binding).
    Var(String),

    /// Read one element of an array: `array[index]`.
    Index { array: Box<Expr>, index: Box<Expr> },

    /// Read an instance field. `class` is the static type of `object`.
    Field {
        object: Box<Expr>,
        class: String,
        field: String,
    },

    /// Read a static field of a class.
    StaticField { class: String, field: String },

    /// Read another actor's copy of a per-actor variable.
    ActorVar { actor: Box<Expr>, name: String },

    // ───────────────────────────── Operators ────────────────────────────
    /// Binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Logical not.
    Not(Box<Expr>),

    /// Arithmetic negation.
    Negate(Box<Expr>),

    /// Number of elements of an array.
    Length(Box<Expr>),

    // ───────────────────────────── Objects ──────────────────────────────
    /// Construct an instance. `constructor` picks one of the class's declared
    /// constructors; a class without constructors has an implicit empty one
    /// at index 0.
    New {
        class: String,
        #[serde(default)]
        constructor: usize,
        #[serde(default)]
        args: Vec<Expr>,
    },

    /// Statically resolved call.
    ///
    /// `class: None` calls a free function. With a class, `object` is the
    /// receiver for instance methods and `None` for static methods.
    Call {
        #[serde(default)]
        class: Option<String>,
        method: String,
        #[serde(default)]
        object: Option<Box<Expr>>,
        #[serde(default)]
        args: Vec<Expr>,
    },

    /// The instance a constructor or instance method runs against.
    This,

    /// The actor executing the current unit.
    CurrentActor,
}

impl Expr {
    pub fn number(n: f64) -> Self {
        Expr::Number(n)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn index(array: Expr, index: Expr) -> Self {
        Expr::Index {
            array: Box::new(array),
            index: Box::new(index),
        }
    }

    pub fn field(object: Expr, class: impl Into<String>, field: impl Into<String>) -> Self {
        Expr::Field {
            object: Box::new(object),
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn new_object(class: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::New {
            class: class.into(),
            constructor: 0,
            args,
        }
    }

    pub fn call(method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            class: None,
            method: method.into(),
            object: None,
            args,
        }
    }
}

/// Assignable location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Place {
    Var(String),
    Field {
        object: Expr,
        class: String,
        field: String,
    },
    StaticField {
        class: String,
        field: String,
    },
    /// `name` in the per-actor store of `actor`.
    ActorVar {
        actor: Expr,
        name: String,
    },
}

/// One `if` / `else if` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// Statement with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default)]
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn define(name: impl Into<String>, initial: Option<Expr>) -> Self {
        Stmt::new(StmtKind::Define {
            name: name.into(),
            initial,
            recursive: false,
        })
    }

    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Stmt::new(StmtKind::Assign {
            target: Place::Var(name.into()),
            index: Vec::new(),
            op: AssignOp::Set,
            value,
        })
    }

    pub fn assign_op(name: impl Into<String>, op: AssignOp, value: Expr) -> Self {
        Stmt::new(StmtKind::Assign {
            target: Place::Var(name.into()),
            index: Vec::new(),
            op,
            value,
        })
    }

    pub fn expr(expr: Expr) -> Self {
        Stmt::new(StmtKind::Expr(expr))
    }
}

/// Statement node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Declare a variable in the current scope. `recursive` forces a
    /// stack-emulated variable even outside a recursive method.
    Define {
        name: String,
        #[serde(default)]
        initial: Option<Expr>,
        #[serde(default)]
        recursive: bool,
    },

    /// `target[index...] op= value`.
    Assign {
        target: Place,
        #[serde(default)]
        index: Vec<Expr>,
        #[serde(default)]
        op: AssignOp,
        value: Expr,
    },

    /// `if` with optional `else if` arms and `else` body.
    If {
        branches: Vec<Branch>,
        #[serde(default)]
        otherwise: Option<Vec<Stmt>>,
    },

    While {
        condition: Expr,
        body: Vec<Stmt>,
    },

    /// C-style loop. `init` runs once in the loop's scope, `step` runs after
    /// each iteration (and on `continue`).
    For {
        #[serde(default)]
        init: Option<Box<Stmt>>,
        condition: Expr,
        #[serde(default)]
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },

    /// `foreach (element in array)`, optionally naming the index.
    ForEach {
        element: String,
        #[serde(default)]
        index: Option<String>,
        array: Expr,
        body: Vec<Stmt>,
    },

    /// Leave the loop `depth` levels out (0 is the innermost).
    Break {
        #[serde(default)]
        depth: u32,
    },

    /// Start the next iteration of the loop `depth` levels out.
    Continue {
        #[serde(default)]
        depth: u32,
    },

    /// Leave the current method, or the whole unit at top level.
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },

    /// Release an instance. `class` is the static type of `object`.
    Delete { object: Expr, class: String },

    /// Nested block with its own scope.
    Block(Vec<Stmt>),

    /// Expression evaluated for its effects (calls, `new`).
    Expr(Expr),
}

/// Which store a unit's variables live in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolKind {
    #[default]
    Global,
    Actor,
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolKind::Global => write!(f, "global"),
            PoolKind::Actor => write!(f, "actor"),
        }
    }
}

/// One compiled unit: the target executes each rule as its own flat list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub pool: PoolKind,
    pub body: Vec<Stmt>,
}

impl Rule {
    pub fn new(name: impl Into<String>, pool: PoolKind, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            pool,
            body,
        }
    }
}
