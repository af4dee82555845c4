use crate::environment::{Env, EnvError, Environment};
use crate::error::Error;
use crate::parser::parse_str;
use crate::source::Span;
use crate::stack::ensure_sufficient_stack;
use crate::types::{Closure, Expr, Node, SpecialForm, Value};
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, trace};

/// Nesting limit for evaluation when no config is given.
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError), // Errors from environment lookup
    #[error("Evaluation Error: Expected a procedure, but got: {0}")]
    NotAProcedure(String, Span), // Tried to call something that isn't a procedure
    #[error("Evaluation Error: '{name}' expects {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },
    #[error("Evaluation Error: Invalid arguments - {0}")]
    InvalidArguments(String, Span), // Wrong type of args to a primitive, overflow, division by zero
    #[error("Evaluation Error: Invalid special form - {0}")]
    InvalidSpecialForm(String, Span), // Malformed define or lambda
    #[error("Evaluation Error: Maximum recursion depth of {depth} exceeded")]
    StackExhausted { depth: usize, span: Span },
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::EnvError(EnvError::UnboundVariable(_, span))
            | EvalError::NotAProcedure(_, span)
            | EvalError::ArityMismatch { span, .. }
            | EvalError::InvalidArguments(_, span)
            | EvalError::InvalidSpecialForm(_, span)
            | EvalError::StackExhausted { span, .. } => *span,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// How many evaluations may be nested before giving up with
    /// [`EvalError::StackExhausted`].
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Tree-walking evaluator. Holds only the nesting counter; all program state
/// lives in environments.
#[derive(Debug, Default)]
pub struct Evaluator {
    config: EvalConfig,
    depth: usize,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::default()
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Evaluator { config, depth: 0 }
    }

    /// Evaluates a given AST Node within the specified environment.
    pub fn evaluate(&mut self, node: &Node, env: &Env) -> EvalResult {
        if self.depth >= self.config.max_depth {
            return Err(EvalError::StackExhausted {
                depth: self.config.max_depth,
                span: node.span,
            });
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.evaluate_node(node, env));
        self.depth -= 1;
        result
    }

    fn evaluate_node(&mut self, node: &Node, env: &Env) -> EvalResult {
        match &node.kind {
            // 1. Numbers evaluate to themselves
            Expr::Integer(n) => Ok(Value::integer(*n)),
            Expr::Real(n) => Ok(Value::real(*n)),

            // 2. Symbols: Look up in the environment
            Expr::Symbol(name) => Ok(env.borrow().lookup(name, node.span)?),

            // 3. Lists: special forms or procedure calls
            Expr::List(elements) => match elements.as_slice() {
                [] => Err(EvalError::NotAProcedure("()".to_string(), node.span)),
                [first, rest @ ..] => match first.as_symbol().and_then(SpecialForm::from_name) {
                    Some(SpecialForm::Define) => self.evaluate_define(rest, env, node.span),
                    Some(SpecialForm::Lambda) => evaluate_lambda(rest, env, node.span),
                    None => self.evaluate_procedure(first, rest, env, node.span),
                },
            },
        }
    }

    fn evaluate_procedure(
        &mut self,
        operator: &Node,
        operands: &[Node],
        env: &Env,
        span: Span,
    ) -> EvalResult {
        // 1. Evaluate the operator; a nested list here is an immediate call
        let procedure = self.evaluate(operator, env)?;

        // 2. Check if the result is something we can call
        if !matches!(procedure, Value::Primitive(_) | Value::Closure(_)) {
            return Err(not_a_procedure(&procedure, operator.span));
        }

        // 3. Evaluate the operands left to right
        let mut evaluated_args = Vec::with_capacity(operands.len());
        for operand_node in operands {
            evaluated_args.push(self.evaluate(operand_node, env)?);
        }

        // 4. Apply the procedure
        self.apply(&procedure, evaluated_args, span)
    }

    /// Applies an already evaluated procedure to evaluated arguments.
    pub fn apply(&mut self, procedure: &Value, args: Vec<Value>, span: Span) -> EvalResult {
        match procedure {
            Value::Primitive(primitive) => (primitive.func)(&args, span),
            Value::Closure(closure) => self.apply_closure(closure, args, span),
            Value::Number(_) | Value::SpecialForm(_) => Err(not_a_procedure(procedure, span)),
        }
    }

    fn apply_closure(&mut self, closure: &Closure, args: Vec<Value>, span: Span) -> EvalResult {
        if args.len() != closure.params.len() {
            return Err(EvalError::ArityMismatch {
                name: closure.name.clone().unwrap_or_else(|| "lambda".to_string()),
                expected: closure.params.len(),
                got: args.len(),
                span,
            });
        }

        // Every call gets its own frame so recursive and repeated calls never
        // see each other's arguments.
        let frame = Environment::new_enclosed(Rc::clone(&closure.env));
        {
            let mut frame = frame.borrow_mut();
            for (param, arg) in closure.params.iter().zip(args) {
                frame.define(param.as_str(), arg);
            }
        }
        trace!(
            name = closure.name.as_deref().unwrap_or("lambda"),
            depth = self.depth,
            "applying closure"
        );
        self.evaluate(&closure.body, &frame)
    }

    fn evaluate_define(&mut self, operands: &[Node], env: &Env, span: Span) -> EvalResult {
        match operands {
            // (define name expr)
            [
                Node {
                    kind: Expr::Symbol(name),
                    ..
                },
                value_expr,
            ] => {
                let value = self.evaluate(value_expr, env)?;
                trace!(%name, "define variable");
                env.borrow_mut().define(name.as_str(), value.clone());
                Ok(value)
            }
            // (define (name p1 p2 ...) body)
            [
                Node {
                    kind: Expr::List(signature),
                    span: signature_span,
                },
                body,
            ] => {
                let Some((name_node, params)) = signature.split_first() else {
                    return Err(EvalError::InvalidSpecialForm(
                        "define expects a procedure name before its parameters".to_string(),
                        *signature_span,
                    ));
                };
                let Some(name) = name_node.as_symbol() else {
                    return Err(EvalError::InvalidSpecialForm(
                        format!(
                            "procedure name must be a symbol, got {}",
                            name_node.kind.type_name()
                        ),
                        name_node.span,
                    ));
                };
                let closure = make_closure(Some(name.to_string()), params, body, env)?;
                trace!(%name, "define procedure");
                env.borrow_mut().define(name, closure.clone());
                Ok(closure)
            }
            [target, _] => Err(EvalError::InvalidSpecialForm(
                format!(
                    "define expects a symbol or (name params...), got {}",
                    target.kind.type_name()
                ),
                target.span,
            )),
            _ => Err(EvalError::InvalidSpecialForm(
                "define expects a name and exactly one expression".to_string(),
                span,
            )),
        }
    }
}

fn evaluate_lambda(operands: &[Node], env: &Env, span: Span) -> EvalResult {
    match operands {
        [
            Node {
                kind: Expr::List(params),
                ..
            },
            body,
        ] => make_closure(None, params, body, env),
        [params, _] => Err(EvalError::InvalidSpecialForm(
            format!(
                "lambda expects a parameter list, got {}",
                params.kind.type_name()
            ),
            params.span,
        )),
        _ => Err(EvalError::InvalidSpecialForm(
            "lambda expects a parameter list and exactly one body expression".to_string(),
            span,
        )),
    }
}

/// Builds a closure over `env`. Parameters must be distinct symbols.
fn make_closure(name: Option<String>, params: &[Node], body: &Node, env: &Env) -> EvalResult {
    let mut seen = HashSet::with_capacity(params.len());
    let mut names = Vec::with_capacity(params.len());
    for param in params {
        let Some(param_name) = param.as_symbol() else {
            return Err(EvalError::InvalidSpecialForm(
                format!("parameter must be a symbol, got {}", param.kind.type_name()),
                param.span,
            ));
        };
        if !seen.insert(param_name) {
            return Err(EvalError::InvalidSpecialForm(
                format!("duplicate parameter '{}'", param_name),
                param.span,
            ));
        }
        names.push(param_name.to_string());
    }
    Ok(Value::Closure(Rc::new(Closure {
        name,
        params: names,
        body: body.clone(),
        env: Rc::clone(env),
    })))
}

fn not_a_procedure(value: &Value, span: Span) -> EvalError {
    match value {
        Value::SpecialForm(form) => {
            EvalError::NotAProcedure(format!("special form '{}'", form.name()), span)
        }
        other => EvalError::NotAProcedure(other.to_string(), span),
    }
}

// --- Entry points ---

/// Evaluates `node` in `env` with the default configuration.
pub fn evaluate(node: &Node, env: &Env) -> EvalResult {
    Evaluator::new().evaluate(node, env)
}

/// Evaluates `node` and hands back the environment it ran in, creating a fresh
/// global one when none is supplied. Threading the returned environment into
/// the next call keeps earlier definitions alive.
pub fn result_and_env(node: &Node, env: Option<Env>) -> EvalResult<(Value, Env)> {
    let env = env.unwrap_or_else(Environment::new_global);
    debug!(expr = %node, "evaluating top-level form");
    let value = evaluate(node, &env)?;
    Ok((value, env))
}

/// Tokenizes, parses and evaluates `input` in `env`.
pub fn evaluate_str(input: &str, env: &Env) -> Result<Value, Error> {
    evaluate_str_with(&mut Evaluator::new(), input, env)
}

/// Like [`evaluate_str`] but with a caller-owned evaluator.
pub fn evaluate_str_with(evaluator: &mut Evaluator, input: &str, env: &Env) -> Result<Value, Error> {
    let node = parse_str(input)?;
    debug!(expr = %node, "evaluating top-level form");
    Ok(evaluator.evaluate(&node, env)?)
}
