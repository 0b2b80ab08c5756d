//! Built-in functions bound in every scope.
//!
//! Builtins live in a hidden parent scope so module member lookups never
//! see them as the module's own bindings.

use crate::env::Environment;
use crate::error::RuntimeError;
use crate::interp::Interpreter;
use crate::value::Value;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A fresh namespace with all builtins bound in a hidden parent scope.
pub fn new_env() -> Environment {
    let root = Environment::new();
    install(&root);
    root.child()
}

/// Bind every builtin directly into `env`.
pub fn install(env: &Environment) {
    env.define("print".into(), Value::native("print", print));
    env.define("println".into(), Value::native("println", println));
    env.define("len".into(), Value::native("len", len));
    env.define("push".into(), Value::native("push", push));
    env.define("pop".into(), Value::native("pop", pop));
    env.define("range".into(), Value::native("range", range));
    env.define("str".into(), Value::native("str", str_));
    env.define("clock".into(), Value::native("clock", clock));
    env.define("sleep_ms".into(), Value::native("sleep_ms", sleep_ms));
    env.define("alloc".into(), Value::native("alloc", alloc));
    env.define("args".into(), Value::native("args", args_));
    env.define("exit".into(), Value::native("exit", exit));
    env.define("memo".into(), Value::native("memo", memo));
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<(), RuntimeError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RuntimeError::ArityMismatch {
            name: SmolStr::new(name),
            expected,
            got: args.len(),
        })
    }
}

fn joined(args: &[Value]) -> String {
    args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

fn print(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    use std::io::Write;
    print!("{}", joined(args));
    let _ = std::io::stdout().flush();
    Ok(Value::Nil)
}

fn println(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    println!("{}", joined(args));
    Ok(Value::Nil)
}

fn len(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("len", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::Array(items) => Ok(Value::Int(items.borrow().len() as i64)),
        other => {
            Err(RuntimeError::TypeMismatch { expected: "string or array", got: other.type_name() })
        }
    }
}

fn push(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("push", args, 2)?;
    let items = args[0].as_array()?;
    items.borrow_mut().push(args[1].clone());
    Ok(Value::Nil)
}

fn pop(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("pop", args, 1)?;
    let items = args[0].as_array()?;
    let popped = items.borrow_mut().pop();
    popped.ok_or_else(|| RuntimeError::Builtin("pop() from an empty array".into()))
}

fn range(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    let (start, end) = match args {
        [end] => (0, end.as_int()?),
        [start, end] => (start.as_int()?, end.as_int()?),
        _ => {
            return Err(RuntimeError::Builtin(format!(
                "range() takes 1 or 2 arguments, got {}",
                args.len()
            )))
        }
    };
    Ok(Value::array((start..end).map(Value::Int).collect()))
}

fn str_(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("str", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Str(s.clone())),
        other => Ok(Value::Str(SmolStr::from(other.to_string()))),
    }
}

/// Seconds since the Unix epoch, fractional.
fn clock(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("clock", args, 0)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(Value::Float(now))
}

fn sleep_ms(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("sleep_ms", args, 1)?;
    let ms = args[0].as_float()?;
    if !ms.is_finite() || ms < 0.0 {
        return Err(RuntimeError::Builtin(format!(
            "sleep_ms() needs a non-negative finite duration, got {ms}"
        )));
    }
    std::thread::sleep(Duration::from_secs_f64(ms / 1000.0));
    Ok(Value::Nil)
}

/// Allocate an array of `n` zeros. Exists so scripts can move the memory
/// needle by a predictable amount.
fn alloc(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("alloc", args, 1)?;
    let n = args[0].as_int()?;
    if n < 0 {
        return Err(RuntimeError::Builtin(format!("alloc() needs a non-negative size, got {n}")));
    }
    Ok(Value::array(vec![Value::Int(0); n as usize]))
}

/// Script arguments as an array of strings; index 0 is the entry path.
fn args_(interp: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("args", args, 0)?;
    let items = interp.script_args().iter().map(|arg| Value::Str(arg.clone())).collect();
    Ok(Value::array(items))
}

fn exit(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("exit", args, 1)?;
    let code = args[0].as_int()?.clamp(i64::from(i32::MIN), i64::from(i32::MAX));
    Err(RuntimeError::Exit(code as i32))
}

/// Decorator: cache results by stringified arguments.
fn memo(_: &mut Interpreter, args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("memo", args, 1)?;
    let inner = args[0].clone();
    let name = match &inner {
        Value::Function(f) => f.name.clone(),
        Value::Native(f) => f.name.clone(),
        other => {
            return Err(RuntimeError::TypeMismatch {
                expected: "function",
                got: other.type_name(),
            })
        }
    };
    let cache: Rc<RefCell<FxHashMap<String, Value>>> = Rc::new(RefCell::new(FxHashMap::default()));
    Ok(Value::native(name, move |interp, call_args| {
        let key =
            call_args.iter().map(ToString::to_string).collect::<Vec<_>>().join("\u{1f}");
        if let Some(hit) = cache.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let result = interp.call_value(inner.clone(), call_args.to_vec())?;
        cache.borrow_mut().insert(key, result.clone());
        Ok(result)
    }))
}
