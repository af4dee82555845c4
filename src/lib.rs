// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod primitives;
pub mod source;
pub mod types;

mod pretty_print;
mod stack;

pub use environment::{Env, EnvError, Environment};
pub use error::{Error, ErrorKind};
pub use evaluator::{
    DEFAULT_MAX_DEPTH, EvalConfig, EvalError, EvalResult, Evaluator, evaluate, evaluate_str,
    evaluate_str_with, result_and_env,
};
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::{MAX_NESTING_DEPTH, ParseError, Parser, parse, parse_str};
pub use primitives::BuiltinTable;
pub use source::Span;
pub use types::{Closure, Expr, Node, Number, Primitive, SpecialForm, Value};
