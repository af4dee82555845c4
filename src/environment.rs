use crate::primitives::BuiltinTable;
use crate::source::Span;
use crate::types::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

// --- Environment Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Unbound variable: '{0}'")]
    UnboundVariable(String, Span), // Symbol name, span where lookup happened
}

/// Shared handle to a frame. Closures and child frames hold these, so a frame
/// lives as long as anything that can still see it.
pub type Env = Rc<RefCell<Environment>>;

#[derive(Debug)]
enum Parent {
    Frame(Env),
    // The builtin table is the root of every chain and has no mutation API.
    Builtins(Rc<BuiltinTable>),
}

#[derive(Debug)]
pub struct Environment {
    parent: Parent,
    bindings: HashMap<String, Value>, // Maps variable names to values
}

impl Environment {
    /// Creates a fresh global frame whose parent is this thread's builtin table.
    pub fn new_global() -> Env {
        Environment::with_builtins(BuiltinTable::shared())
    }

    /// Creates a global frame on top of an explicitly supplied builtin table.
    pub fn with_builtins(builtins: Rc<BuiltinTable>) -> Env {
        debug!(builtins = builtins.len(), "creating global environment");
        Rc::new(RefCell::new(Environment {
            parent: Parent::Builtins(builtins),
            bindings: HashMap::new(),
        }))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Env) -> Env {
        Rc::new(RefCell::new(Environment {
            parent: Parent::Frame(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Defines a variable in the *current* environment frame.
    /// Replaces the value if the variable already exists in this frame;
    /// bindings in outer frames are never touched.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Finds the nearest binding for `name`, walking outward to the builtins.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        match self.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => match &self.parent {
                Parent::Frame(outer) => outer.borrow().resolve(name),
                Parent::Builtins(builtins) => builtins.get(name),
            },
        }
    }

    /// Like [`resolve`](Self::resolve), but an unbound name is an error.
    /// `lookup_span` is where the variable was referenced.
    pub fn lookup(&self, name: &str, lookup_span: Span) -> Result<Value, EnvError> {
        self.resolve(name)
            .ok_or_else(|| EnvError::UnboundVariable(name.to_string(), lookup_span))
    }

    /// True if `name` is bound in this frame itself.
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Gets every identifier visible from this frame, builtins included.
    pub fn identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        match &self.parent {
            Parent::Frame(outer) => identifiers.extend(outer.borrow().identifiers()),
            Parent::Builtins(builtins) => {
                identifiers.extend(builtins.names().map(str::to_string))
            }
        }
        identifiers
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> Value {
        Value::integer(n)
    }

    #[test]
    fn test_define_and_lookup_global() {
        let env = Environment::new_global();
        env.borrow_mut().define("x", num(10));

        let result = env.borrow().lookup("x", Span::default());
        assert_eq!(result, Ok(num(10)));
    }

    #[test]
    fn test_lookup_unbound_global() {
        let env = Environment::new_global();
        let result = env.borrow().lookup("y", Span::default());
        assert!(matches!(result, Err(EnvError::UnboundVariable(s, _)) if s == "y"));
    }

    #[test]
    fn test_builtins_visible_from_global() {
        let env = Environment::new_global();
        assert!(matches!(env.borrow().resolve("+"), Some(Value::Primitive(p)) if p.name == "+"));
        assert!(matches!(env.borrow().resolve("define"), Some(Value::SpecialForm(_))));
        assert!(!env.borrow().is_bound_locally("+"));
    }

    #[test]
    fn test_define_and_lookup_enclosed() {
        let global_env = Environment::new_global();
        global_env.borrow_mut().define("x", num(10));

        let local_env = Environment::new_enclosed(global_env);
        local_env.borrow_mut().define("y", num(20));

        assert_eq!(local_env.borrow().lookup("y", Span::default()), Ok(num(20)));
        assert_eq!(local_env.borrow().lookup("x", Span::default()), Ok(num(10)));
    }

    #[test]
    fn test_lookup_unbound_enclosed() {
        let global_env = Environment::new_global();
        let local_env = Environment::new_enclosed(global_env);

        let span = Span::new(11, 12);
        let result = local_env.borrow().lookup("z", span);
        assert_eq!(
            result,
            Err(EnvError::UnboundVariable("z".to_string(), span))
        );
    }

    #[test]
    fn test_shadowing() {
        let global_env = Environment::new_global();
        global_env.borrow_mut().define("x", num(10));

        let local_env = Environment::new_enclosed(global_env.clone());
        local_env.borrow_mut().define("x", num(50)); // Shadow global x

        let inner_local_env = Environment::new_enclosed(local_env.clone());
        inner_local_env.borrow_mut().define("y", num(7));

        assert_eq!(inner_local_env.borrow().resolve("x"), Some(num(50)));
        assert_eq!(inner_local_env.borrow().resolve("y"), Some(num(7)));
        assert_eq!(local_env.borrow().resolve("x"), Some(num(50)));
        assert_eq!(global_env.borrow().resolve("x"), Some(num(10)));
        assert_eq!(global_env.borrow().resolve("y"), None);
    }

    #[test]
    fn test_define_only_touches_current_frame() {
        let global_env = Environment::new_global();
        global_env.borrow_mut().define("x", num(1));
        let local_env = Environment::new_enclosed(global_env.clone());

        local_env.borrow_mut().define("x", num(2));
        local_env.borrow_mut().define("x", num(3)); // Rebind in the same frame

        assert_eq!(local_env.borrow().resolve("x"), Some(num(3)));
        assert_eq!(global_env.borrow().resolve("x"), Some(num(1)));
    }

    #[test]
    fn test_shadowing_a_builtin() {
        let env = Environment::new_global();
        env.borrow_mut().define("+", num(0));
        assert_eq!(env.borrow().resolve("+"), Some(num(0)));

        // Other sessions still see the primitive
        let other = Environment::new_global();
        assert!(matches!(other.borrow().resolve("+"), Some(Value::Primitive(_))));
    }

    #[test]
    fn test_later_outer_definitions_are_visible() {
        let global_env = Environment::new_global();
        let local_env = Environment::new_enclosed(global_env.clone());
        assert_eq!(local_env.borrow().resolve("late"), None);

        global_env.borrow_mut().define("late", num(9));
        assert_eq!(local_env.borrow().resolve("late"), Some(num(9)));
    }

    #[test]
    fn test_identifiers() {
        let global_env = Environment::new_global();
        global_env.borrow_mut().define("outer", num(1));
        let local_env = Environment::new_enclosed(global_env);
        local_env.borrow_mut().define("inner", num(2));

        let ids = local_env.borrow().identifiers();
        for expected in ["inner", "outer", "+", "-", "*", "/", "define", "lambda"] {
            assert!(ids.contains(expected), "missing {}", expected);
        }
    }
}
