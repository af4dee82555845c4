use std::collections::HashMap;
use std::rc::Rc;

use crate::evaluator::{EvalError, EvalResult};
use crate::source::Span;
use crate::types::{Number, Primitive, PrimitiveFunc, SpecialForm, Value};

/// The root frame shared by every environment chain. Built once, never mutated.
#[derive(Debug)]
pub struct BuiltinTable {
    entries: HashMap<&'static str, Value>,
}

thread_local! {
    static STANDARD: Rc<BuiltinTable> = Rc::new(BuiltinTable::standard());
}

impl BuiltinTable {
    pub fn standard() -> Self {
        let mut table = BuiltinTable {
            entries: HashMap::new(),
        };
        table.add_primitive("+", prim_add);
        table.add_primitive("-", prim_sub);
        table.add_primitive("*", prim_mul);
        table.add_primitive("/", prim_div);
        for form in SpecialForm::ALL {
            table.entries.insert(form.name(), Value::SpecialForm(form));
        }
        table
    }

    /// The standard table for this thread. Values hold `Rc`s, so each thread
    /// gets its own copy.
    pub fn shared() -> Rc<BuiltinTable> {
        STANDARD.with(Rc::clone)
    }

    fn add_primitive(&mut self, name: &'static str, func: PrimitiveFunc) {
        self.entries
            .insert(name, Value::Primitive(Primitive { name, func }));
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn min_arity_error(name: &str, expected: usize, actual: usize, span: Span) -> EvalError {
    EvalError::InvalidArguments(
        format!(
            "Primitive '{}' expects at least {} argument{}, got {}",
            name,
            expected,
            if expected == 1 { "" } else { "s" },
            actual
        ),
        span,
    )
}

fn overflow_error(name: &str, span: Span) -> EvalError {
    EvalError::InvalidArguments(format!("Integer overflow in '{}'", name), span)
}

// Extracts a number or reports which argument had the wrong type
fn expect_number(value: &Value, name: &str, position: usize, span: Span) -> EvalResult<Number> {
    value.as_number().ok_or_else(|| {
        EvalError::InvalidArguments(
            format!(
                "Primitive '{}' expects a number for argument {}, got {}",
                name,
                position,
                value.type_name()
            ),
            span,
        )
    })
}

/// Applies a binary operation with integer/real promotion: two integers stay
/// integral (failing on overflow), anything involving a real becomes real.
fn combine(
    left: Number,
    right: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    real_op: fn(f64, f64) -> f64,
    name: &str,
    span: Span,
) -> EvalResult<Number> {
    match (left, right) {
        (Number::Integer(a), Number::Integer(b)) => int_op(a, b)
            .map(Number::Integer)
            .ok_or_else(|| overflow_error(name, span)),
        _ => Ok(Number::Real(real_op(left.as_f64(), right.as_f64()))),
    }
}

fn fold_numbers(
    args: &[Value],
    span: Span,
    start: Number,
    int_op: fn(i64, i64) -> Option<i64>,
    real_op: fn(f64, f64) -> f64,
    operator: &str,
) -> EvalResult<Value> {
    let mut acc = start;
    for (i, value) in args.iter().enumerate() {
        let num = expect_number(value, operator, i + 1, span)?;
        acc = combine(acc, num, int_op, real_op, operator, span)?;
    }
    Ok(Value::Number(acc))
}

fn divide(dividend: Number, divisor: Number, span: Span) -> EvalResult<Number> {
    if divisor.is_zero() {
        return Err(EvalError::InvalidArguments(
            "Division by zero".to_string(),
            span,
        ));
    }
    // Quotients are always real, even for integers that divide exactly
    Ok(Number::Real(dividend.as_f64() / divisor.as_f64()))
}

pub fn prim_add(args: &[Value], span: Span) -> EvalResult<Value> {
    // (+) -> 0
    // (+ 1 2 3) -> 6
    fold_numbers(
        args,
        span,
        Number::Integer(0),
        i64::checked_add,
        |a, b| a + b,
        "+",
    )
}

pub fn prim_sub(args: &[Value], span: Span) -> EvalResult<Value> {
    // (- x) -> -x
    // (- x y z) -> x - y - z
    let Some((first, rest)) = args.split_first() else {
        return Err(min_arity_error("-", 1, 0, span));
    };
    let first_num = expect_number(first, "-", 1, span)?;

    if rest.is_empty() {
        let negated = match first_num {
            Number::Integer(n) => n
                .checked_neg()
                .map(Number::Integer)
                .ok_or_else(|| overflow_error("-", span))?,
            Number::Real(n) => Number::Real(-n),
        };
        return Ok(Value::Number(negated));
    }

    let mut result = first_num;
    for (i, value) in rest.iter().enumerate() {
        let num = expect_number(value, "-", i + 2, span)?;
        result = combine(result, num, i64::checked_sub, |a, b| a - b, "-", span)?;
    }
    Ok(Value::Number(result))
}

pub fn prim_mul(args: &[Value], span: Span) -> EvalResult<Value> {
    // (*) -> 1
    // (* 1 2 3) -> 6
    fold_numbers(
        args,
        span,
        Number::Integer(1),
        i64::checked_mul,
        |a, b| a * b,
        "*",
    )
}

pub fn prim_div(args: &[Value], span: Span) -> EvalResult<Value> {
    // (/ x) -> 1/x
    // (/ x y z) -> x / y / z
    let Some((first, rest)) = args.split_first() else {
        return Err(min_arity_error("/", 1, 0, span));
    };
    let first_num = expect_number(first, "/", 1, span)?;

    if rest.is_empty() {
        return divide(Number::Integer(1), first_num, span).map(Value::Number);
    }

    let mut result = first_num;
    for (i, value) in rest.iter().enumerate() {
        let num = expect_number(value, "/", i + 2, span)?;
        result = divide(result, num, span)?;
    }
    Ok(Value::Number(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::integer(n)
    }

    fn real(n: f64) -> Value {
        Value::real(n)
    }

    fn assert_prim(func: PrimitiveFunc, args: &[Value], expected: Value) {
        match func(args, Span::default()) {
            Ok(result) => assert_eq!(result, expected, "Args: {:?}", args),
            Err(e) => panic!("Primitive failed for args {:?}: {}", args, e),
        }
    }

    fn assert_prim_error(func: PrimitiveFunc, args: &[Value]) {
        match func(args, Span::default()) {
            Ok(result) => panic!("Expected failure for args {:?}, got {}", args, result),
            Err(e) => assert!(
                matches!(e, EvalError::InvalidArguments(..)),
                "Unexpected error kind: {:?}",
                e
            ),
        }
    }

    #[test]
    fn test_add() {
        assert_prim(prim_add, &[], int(0));
        assert_prim(prim_add, &[int(1), int(2)], int(3));
        assert_prim(prim_add, &[int(10), int(20), int(30), int(40)], int(100));
        assert_prim(prim_add, &[int(1), real(0.5)], real(1.5));
    }

    #[test]
    fn test_sub() {
        assert_prim(prim_sub, &[int(5)], int(-5));
        assert_prim(prim_sub, &[real(2.5)], real(-2.5));
        assert_prim(prim_sub, &[int(10), int(3)], int(7));
        assert_prim(prim_sub, &[int(10), int(3), int(2)], int(5));
        assert_prim(prim_sub, &[int(1), real(0.25)], real(0.75));
        assert_prim_error(prim_sub, &[]);
    }

    #[test]
    fn test_mul() {
        assert_prim(prim_mul, &[], int(1));
        assert_prim(prim_mul, &[int(7)], int(7));
        assert_prim(prim_mul, &[int(2), int(3), int(4)], int(24));
        assert_prim(prim_mul, &[int(2), real(1.5)], real(3.0));
    }

    #[test]
    fn test_div() {
        assert_prim(prim_div, &[int(10), int(2)], real(5.0));
        assert_prim(prim_div, &[int(10), int(4)], real(2.5));
        assert_prim(prim_div, &[int(20), int(2), int(5)], real(2.0));
        assert_prim(prim_div, &[int(i64::MIN), int(-1)], real(9.223372036854775808e18));
        assert_prim(prim_div, &[real(9.0), int(3)], real(3.0));
        assert_prim_error(prim_div, &[]);
    }

    #[test]
    fn test_div_single_argument_is_reciprocal() {
        assert_prim(prim_div, &[int(5)], real(0.2));
        assert_prim(prim_div, &[int(1)], real(1.0));
        assert_prim(prim_div, &[int(-1)], real(-1.0));
        assert_prim(prim_div, &[real(0.5)], real(2.0));
    }

    #[test]
    fn test_div_by_zero() {
        assert_prim_error(prim_div, &[int(1), int(0)]);
        assert_prim_error(prim_div, &[real(1.0), real(0.0)]);
        assert_prim_error(prim_div, &[int(0)]);
    }

    #[test]
    fn test_integer_overflow() {
        assert_prim_error(prim_add, &[int(i64::MAX), int(1)]);
        assert_prim_error(prim_mul, &[int(i64::MAX), int(2)]);
        assert_prim_error(prim_sub, &[int(i64::MIN)]);
    }

    #[test]
    fn test_type_errors() {
        let form = Value::SpecialForm(SpecialForm::Define);
        assert_prim_error(prim_add, &[int(1), form.clone()]);
        assert_prim_error(prim_sub, &[form.clone()]);
        assert_prim_error(prim_mul, &[form.clone(), int(1)]);
        assert_prim_error(prim_div, &[int(1), form]);
    }

    #[test]
    fn test_table_contents() {
        let table = BuiltinTable::standard();
        let mut names: Vec<&str> = table.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["*", "+", "-", "/", "define", "lambda"]);
        assert_eq!(table.len(), 6);
        assert!(!table.is_empty());
        assert!(table.get("car").is_none());
    }

    #[test]
    fn test_shared_table_is_reused() {
        assert!(Rc::ptr_eq(&BuiltinTable::shared(), &BuiltinTable::shared()));
    }
}
