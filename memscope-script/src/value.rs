//! Runtime values.
//!
//! Values are cheap to clone: scalars copy, strings are interned handles,
//! and arrays, functions and modules clone an `Rc`.

use crate::ast::Block;
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::interp::Interpreter;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Signature shared by all host-provided functions.
pub type NativeFunc = Box<dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, RuntimeError>>;

/// A function implemented by the host.
pub struct NativeFn {
    pub name: SmolStr,
    pub func: NativeFunc,
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A function declared in script source, with its captured scope.
#[derive(Debug)]
pub struct ScriptFn {
    pub name: SmolStr,
    /// Dotted path of enclosing functions, e.g. `outer.inner`.
    pub qualname: SmolStr,
    pub params: Vec<SmolStr>,
    pub body: Rc<Block>,
    pub closure: Environment,
    pub is_async: bool,
    /// 1-based line of the `fn` keyword in its source unit.
    pub decl_line: u32,
}

/// A loaded module: its name and the scope holding its top-level bindings.
#[derive(Debug)]
pub struct ModuleHandle {
    pub name: SmolStr,
    pub env: Environment,
}

impl ModuleHandle {
    /// A binding the module itself defines. Builtins inherited from the
    /// enclosing scope are not members.
    pub fn member(&self, name: &str) -> Option<Value> {
        if self.env.has_local(name) {
            self.env.get(name)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(SmolStr),
    Array(Rc<RefCell<Vec<Value>>>),
    Function(Rc<ScriptFn>),
    Native(Rc<NativeFn>),
    Module(Rc<ModuleHandle>),
}

impl Value {
    pub fn native<F>(name: impl Into<SmolStr>, func: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Value::Native(Rc::new(NativeFn { name: name.into(), func: Box::new(func) }))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
            Value::Native(_) => "native function",
            Value::Module(_) => "module",
        }
    }

    /// Empty and zero values are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(items) => !items.borrow().is_empty(),
            Value::Function(_) | Value::Native(_) | Value::Module(_) => true,
        }
    }

    pub fn as_int(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(RuntimeError::TypeMismatch { expected: "int", got: other.type_name() }),
        }
    }

    /// Numeric coercion: ints widen to floats.
    pub fn as_float(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Int(n) => Ok(*n as f64),
            Value::Float(x) => Ok(*x),
            other => Err(RuntimeError::TypeMismatch { expected: "number", got: other.type_name() }),
        }
    }

    pub fn as_str(&self) -> Result<SmolStr, RuntimeError> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            other => Err(RuntimeError::TypeMismatch { expected: "string", got: other.type_name() }),
        }
    }

    pub fn as_array(&self) -> Result<Rc<RefCell<Vec<Value>>>, RuntimeError> {
        match self {
            Value::Array(items) => Ok(items.clone()),
            other => Err(RuntimeError::TypeMismatch { expected: "array", got: other.type_name() }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            // Mixed numerics compare by value.
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Quoted(item))?;
                }
                write!(f, "]")
            }
            Value::Function(func) => write!(f, "<fn {}>", func.name),
            Value::Native(func) => write!(f, "<native fn {}>", func.name),
            Value::Module(module) => write!(f, "<module {}>", module.name),
        }
    }
}

/// Element form used inside array displays: strings keep their quotes.
struct Quoted<'a>(&'a Value);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Str(s) => write!(f, "\"{s}\""),
            other => write!(f, "{other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Str("hi".into()).to_string(), "hi");
        let arr = Value::array(vec![Value::Int(1), Value::Str("a".into())]);
        assert_eq!(arr.to_string(), "[1, \"a\"]");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str("".into()).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
        assert!(Value::array(vec![Value::Nil]).is_truthy());
    }

    #[test]
    fn mixed_numeric_equality() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::Float(3.0), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Float(3.5));
    }

    #[test]
    fn arrays_compare_by_contents() {
        let a = Value::array(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(a, b);
    }
}
