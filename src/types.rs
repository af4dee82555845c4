use crate::environment::Env;
use crate::{evaluator::EvalResult, source::Span};
use std::fmt; // For custom display formatting
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Expr, // The parsed expression
    pub span: Span, // The source span it covers
}

impl Node {
    pub fn new(kind: Expr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new(Expr::Integer(n), span)
    }

    pub fn new_real(n: f64, span: Span) -> Self {
        Node::new(Expr::Real(n), span)
    }

    pub fn new_symbol(name: impl Into<String>, span: Span) -> Self {
        Node::new(Expr::Symbol(name.into()), span)
    }

    pub fn new_list(elements: Vec<Node>, span: Span) -> Self {
        Node::new(Expr::List(elements), span)
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate to Expr's Display implementation
        write!(f, "{}", self.kind)
    }
}

/// A parsed carlae expression. Produced once by the parser and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64),    // e.g., 42, -7
    Real(f64),       // e.g., 2.5, 1e3
    Symbol(String),  // e.g., +, square, define
    List(Vec<Node>), // e.g., (+ 1 2), ()
}

impl Expr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::Integer(_) => "integer",
            Expr::Real(_) => "real",
            Expr::Symbol(_) => "symbol",
            Expr::List(_) => "list",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(n) => write!(f, "{}", n),
            Expr::Real(n) => write_real(f, *n),
            Expr::Symbol(s) => write!(f, "{}", s),
            Expr::List(list) => {
                write!(f, "(")?;
                let mut first = true;
                for expr in list {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", expr)?;
                    first = false;
                }
                write!(f, ")")
            }
        }
    }
}

// Integral reals keep a trailing ".0" so they read back as reals.
fn write_real(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 {
        write!(f, "{:.1}", n)
    } else {
        write!(f, "{}", n)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Number {
    Integer(i64),
    Real(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Real(n) => n,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Integer(n) => n == 0,
            Number::Real(n) => n == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{}", n),
            Number::Real(n) => write_real(f, *n),
        }
    }
}

/// Runtime values. Symbols never appear here: they are resolved straight from
/// the expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Number),
    Primitive(Primitive),
    SpecialForm(SpecialForm),
    Closure(Rc<Closure>),
}

impl Value {
    pub fn integer(n: i64) -> Self {
        Value::Number(Number::Integer(n))
    }

    pub fn real(n: f64) -> Self {
        Value::Number(Number::Real(n))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(Number::Integer(_)) => "integer",
            Value::Number(Number::Real(_)) => "real",
            Value::Primitive(_) => "primitive",
            Value::SpecialForm(_) => "special form",
            Value::Closure(_) => "closure",
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Primitive(primitive) => write!(f, "#<primitive:{}>", primitive.name),
            Value::SpecialForm(form) => write!(f, "#<special-form:{}>", form.name()),
            Value::Closure(closure) => {
                match &closure.name {
                    Some(name) => write!(f, "#<closure:{}", name)?,
                    None => write!(f, "#<lambda")?,
                }
                write!(f, " ({})>", closure.params.join(" "))
            }
        }
    }
}

pub type PrimitiveFunc = fn(&[Value], Span) -> EvalResult<Value>;

/// A native operation from the builtin table.
#[derive(Clone, Copy)]
pub struct Primitive {
    pub name: &'static str,
    pub func: PrimitiveFunc,
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive({})", self.name)
    }
}

// Function pointers don't compare reliably, names are unique in the table.
impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Forms the evaluator handles itself instead of applying.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpecialForm {
    Define,
    Lambda,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 2] = [SpecialForm::Define, SpecialForm::Lambda];

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Define => "define",
            SpecialForm::Lambda => "lambda",
        }
    }

    pub fn from_name(name: &str) -> Option<SpecialForm> {
        SpecialForm::ALL.into_iter().find(|form| form.name() == name)
    }
}

/// A user-defined procedure. `env` is the frame the closure was created in,
/// shared rather than copied so later definitions there stay visible.
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Node,
    pub env: Env,
}

// The captured environment usually contains the closure itself.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("body", &self.body.to_string())
            .finish_non_exhaustive()
    }
}

// Closures have identity semantics.
impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}
