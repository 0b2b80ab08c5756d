//! Lexical environments.
//!
//! Scopes form a parent chain; closures capture the [`Environment`] handle
//! they were declared in, so sharing is by reference counting rather than
//! by copying bindings.

use crate::value::Value;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A shared handle to one scope in the chain. Cloning is cheap.
#[derive(Clone)]
pub struct Environment {
    scope: Rc<RefCell<Scope>>,
}

struct Scope {
    vars: FxHashMap<SmolStr, Value>,
    parent: Option<Environment>,
}

impl Environment {
    /// A fresh root scope with no parent.
    pub fn new() -> Self {
        Self {
            scope: Rc::new(RefCell::new(Scope { vars: FxHashMap::default(), parent: None })),
        }
    }

    /// A child scope that resolves misses through `self`.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            scope: Rc::new(RefCell::new(Scope {
                vars: FxHashMap::default(),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn define(&self, name: SmolStr, value: Value) {
        self.scope.borrow_mut().vars.insert(name, value);
    }

    /// Look `name` up through the scope chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.scope.borrow();
        if let Some(value) = scope.vars.get(name) {
            return Some(value.clone());
        }
        scope.parent.as_ref().and_then(|parent| parent.get(name))
    }

    /// Rebind an existing `name`, searching outward. Returns false when no
    /// scope in the chain defines it.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut scope = self.scope.borrow_mut();
        if let Some(slot) = scope.vars.get_mut(name) {
            *slot = value;
            return true;
        }
        match &scope.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }

    /// Whether `name` is bound in this scope itself, ignoring parents.
    pub fn has_local(&self, name: &str) -> bool {
        self.scope.borrow().vars.contains_key(name)
    }

    /// Two handles to the same scope.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

// Scopes can participate in reference cycles (a closure stored in the scope
// it captures), so Debug stays shallow.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.scope.borrow();
        let mut names: Vec<&SmolStr> = scope.vars.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("locals", &names)
            .field("has_parent", &scope.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_resolves_through_parent() {
        let root = Environment::new();
        root.define("x".into(), Value::Int(1));
        let child = root.child();
        assert_eq!(child.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn define_shadows_without_touching_parent() {
        let root = Environment::new();
        root.define("x".into(), Value::Int(1));
        let child = root.child();
        child.define("x".into(), Value::Int(2));
        assert_eq!(child.get("x"), Some(Value::Int(2)));
        assert_eq!(root.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn assign_walks_to_the_defining_scope() {
        let root = Environment::new();
        root.define("x".into(), Value::Int(1));
        let child = root.child();
        assert!(child.assign("x", Value::Int(9)));
        assert_eq!(root.get("x"), Some(Value::Int(9)));
    }

    #[test]
    fn assign_fails_for_unknown_name() {
        let root = Environment::new();
        assert!(!root.assign("missing", Value::Int(0)));
    }
}
