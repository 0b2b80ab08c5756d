//! Tree-walking evaluator.
//!
//! The executable form of a script is its syntax tree; evaluation walks it
//! directly. `return`, `break` and `continue` travel as [`RuntimeError`]
//! variants and are caught at the enclosing call or loop. A statement-level
//! hook and a cooperative interrupt flag let hosts observe and stop runs.

use crate::ast::{
    AssignTarget, BinaryOp, Block, Expr, ExprKind, FnDecl, ImportDecl, Item, ModulePath, Program,
    Stmt, StmtKind, UnaryOp, UseDecl,
};
use crate::builtins;
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::modules::{ModuleError, ModuleLoader, ModuleResolver, SourceLoader};
use crate::value::{ModuleHandle, ScriptFn, Value};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Hard ceiling on nested script calls.
pub const MAX_CALL_DEPTH: usize = 1000;

/// Called with the 1-based line of each statement before it executes.
pub type StepHook = Rc<dyn Fn(u32)>;

enum ModuleState {
    /// Top-level statements are still executing; a lookup here is a cycle.
    Loading,
    Loaded(Rc<ModuleHandle>),
}

pub struct Interpreter {
    resolver: ModuleResolver,
    /// Tried front to back; the first loader to claim a path wins.
    loaders: Vec<Box<dyn ModuleLoader>>,
    native_modules: FxHashMap<SmolStr, Rc<ModuleHandle>>,
    /// Each source module executes at most once per run.
    module_cache: FxHashMap<SmolStr, ModuleState>,
    call_depth: usize,
    /// Qualified name of the function currently executing, if any. Nested
    /// declarations extend it, e.g. `outer.inner`.
    current_qual: Option<SmolStr>,
    script_args: Vec<SmolStr>,
    interrupt: Option<Arc<AtomicBool>>,
    step_hook: Option<StepHook>,
}

impl Interpreter {
    pub fn new(resolver: ModuleResolver) -> Self {
        Self {
            resolver,
            loaders: vec![Box::new(SourceLoader)],
            native_modules: FxHashMap::default(),
            module_cache: FxHashMap::default(),
            call_depth: 0,
            current_qual: None,
            script_args: Vec::new(),
            interrupt: None,
            step_hook: None,
        }
    }

    /// Put `loader` ahead of every existing loader, including the source
    /// fallback installed by [`Interpreter::new`].
    pub fn install_loader(&mut self, loader: Box<dyn ModuleLoader>) {
        self.loaders.insert(0, loader);
    }

    /// Register a host-provided module. Native modules shadow source files
    /// with the same dotted name.
    pub fn register_native_module(&mut self, name: impl Into<SmolStr>, env: Environment) {
        let name = name.into();
        let handle = Rc::new(ModuleHandle { name: name.clone(), env });
        self.native_modules.insert(name, handle);
    }

    pub fn set_script_args(&mut self, args: Vec<SmolStr>) {
        self.script_args = args;
    }

    pub fn script_args(&self) -> &[SmolStr] {
        &self.script_args
    }

    pub fn set_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt = Some(flag);
    }

    /// Swap the statement hook, returning the previous one so callers can
    /// restore it.
    pub fn set_step_hook(&mut self, hook: Option<StepHook>) -> Option<StepHook> {
        std::mem::replace(&mut self.step_hook, hook)
    }

    /// Execute a whole source unit in `env`. Control flow escaping the top
    /// level is a fault, not a silent stop.
    pub fn run_program(&mut self, program: &Program, env: &Environment) -> Result<(), RuntimeError> {
        for item in &program.items {
            self.eval_item(item, env).map_err(reject_control)?;
        }
        Ok(())
    }

    fn eval_item(&mut self, item: &Item, env: &Environment) -> Result<(), RuntimeError> {
        match item {
            Item::Use(decl) => self.eval_use(decl, env),
            Item::Import(decl) => self.eval_import(decl, env),
            Item::Fn(decl) => self.define_function(decl, env),
            Item::Stmt(stmt) => self.eval_stmt(stmt, env),
        }
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn eval_stmt(&mut self, stmt: &Stmt, env: &Environment) -> Result<(), RuntimeError> {
        self.check_interrupt()?;
        if stmt.line > 0 {
            if let Some(hook) = self.step_hook.clone() {
                hook(stmt.line);
            }
        }
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                let value = self.eval_expr(value, env)?;
                env.define(name.clone(), value);
                Ok(())
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval_expr(value, env)?;
                self.assign(target, value, env)
            }
            StmtKind::If { cond, then_block, else_block } => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    self.exec_block(then_block, &env.child())
                } else if let Some(block) = else_block {
                    self.exec_block(block, &env.child())
                } else {
                    Ok(())
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_expr(cond, env)?.is_truthy() {
                    self.check_interrupt()?;
                    match self.exec_block(body, &env.child()) {
                        Err(RuntimeError::Break) => break,
                        Err(RuntimeError::Continue) => continue,
                        result => result?,
                    }
                }
                Ok(())
            }
            StmtKind::For { var, iter, body } => {
                let iterable = self.eval_expr(iter, env)?;
                // Iterate over a snapshot so body mutations cannot skip or
                // repeat elements.
                let items: Vec<Value> = match &iterable {
                    Value::Array(items) => items.borrow().clone(),
                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: "array",
                            got: other.type_name(),
                        })
                    }
                };
                for item in items {
                    self.check_interrupt()?;
                    let scope = env.child();
                    scope.define(var.clone(), item);
                    match self.exec_block(body, &scope) {
                        Err(RuntimeError::Break) => break,
                        Err(RuntimeError::Continue) => continue,
                        result => result?,
                    }
                }
                Ok(())
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Nil,
                };
                Err(RuntimeError::Return(value))
            }
            StmtKind::Break => Err(RuntimeError::Break),
            StmtKind::Continue => Err(RuntimeError::Continue),
            StmtKind::Fn(decl) => self.define_function(decl, env),
            StmtKind::Expr(expr) => {
                self.eval_expr(expr, env)?;
                Ok(())
            }
        }
    }

    fn assign(
        &mut self,
        target: &AssignTarget,
        value: Value,
        env: &Environment,
    ) -> Result<(), RuntimeError> {
        match target {
            AssignTarget::Name(name) => {
                if env.assign(name, value) {
                    Ok(())
                } else {
                    Err(RuntimeError::UndefinedName(name.clone()))
                }
            }
            AssignTarget::Index { target, index } => {
                let items = self.eval_expr(target, env)?.as_array()?;
                let index = self.eval_expr(index, env)?.as_int()?;
                let mut items = items.borrow_mut();
                let slot = resolve_index(index, items.len())?;
                items[slot] = value;
                Ok(())
            }
        }
    }

    fn exec_block(&mut self, block: &Block, env: &Environment) -> Result<(), RuntimeError> {
        for stmt in &block.stmts {
            self.eval_stmt(stmt, env)?;
        }
        Ok(())
    }

    /// Build the function value, apply annotations bottom-up, bind the
    /// decorated result under the declared name.
    fn define_function(&mut self, decl: &FnDecl, env: &Environment) -> Result<(), RuntimeError> {
        let qualname = match &self.current_qual {
            Some(outer) => SmolStr::from(format!("{outer}.{}", decl.name)),
            None => decl.name.clone(),
        };
        let mut value = Value::Function(Rc::new(ScriptFn {
            name: decl.name.clone(),
            qualname,
            params: decl.params.clone(),
            body: Rc::new(decl.body.clone()),
            closure: env.clone(),
            is_async: decl.is_async,
            decl_line: decl.line,
        }));
        for annotation in decl.annotations.iter().rev() {
            let decorator = env
                .get(&annotation.name)
                .ok_or_else(|| RuntimeError::UndefinedName(annotation.name.clone()))?;
            value = self.call_value(decorator, vec![value])?;
        }
        env.define(decl.name.clone(), value);
        Ok(())
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn eval_expr(&mut self, expr: &Expr, env: &Environment) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Ident(name) => {
                env.get(name).ok_or_else(|| RuntimeError::UndefinedName(name.clone()))
            }
            ExprKind::Array(elems) => {
                let mut items = Vec::with_capacity(elems.len());
                for elem in elems {
                    items.push(self.eval_expr(elem, env)?);
                }
                Ok(Value::array(items))
            }
            ExprKind::Field { target, name } => {
                let target = self.eval_expr(target, env)?;
                match target {
                    Value::Module(module) => module.member(name).ok_or_else(|| {
                        RuntimeError::UndefinedMember {
                            module: module.name.clone(),
                            name: name.clone(),
                        }
                    }),
                    other => Err(RuntimeError::TypeMismatch {
                        expected: "module",
                        got: other.type_name(),
                    }),
                }
            }
            ExprKind::Index { target, index } => {
                let items = self.eval_expr(target, env)?.as_array()?;
                let index = self.eval_expr(index, env)?.as_int()?;
                let items = items.borrow();
                let slot = resolve_index(index, items.len())?;
                Ok(items[slot].clone())
            }
            ExprKind::Call { callee, args } => {
                let callee = self.eval_expr(callee, env)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.eval_expr(arg, env)?);
                }
                self.call_value(callee, evaluated)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand, env)?;
                match op {
                    UnaryOp::Neg => match value {
                        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                        Value::Float(x) => Ok(Value::Float(-x)),
                        other => Err(RuntimeError::TypeMismatch {
                            expected: "number",
                            got: other.type_name(),
                        }),
                    },
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    let lhs = self.eval_expr(lhs, env)?;
                    if lhs.is_truthy() {
                        self.eval_expr(rhs, env)
                    } else {
                        Ok(lhs)
                    }
                }
                BinaryOp::Or => {
                    let lhs = self.eval_expr(lhs, env)?;
                    if lhs.is_truthy() {
                        Ok(lhs)
                    } else {
                        self.eval_expr(rhs, env)
                    }
                }
                _ => {
                    let lhs = self.eval_expr(lhs, env)?;
                    let rhs = self.eval_expr(rhs, env)?;
                    eval_binary(*op, &lhs, &rhs)
                }
            },
        }
    }

    // ── Calls ───────────────────────────────────────────────────────────

    pub fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match callee {
            Value::Native(native) => (native.func)(self, &args),
            Value::Function(func) => self.call_script_fn(&func, args),
            other => Err(RuntimeError::NotCallable(other.type_name())),
        }
    }

    fn call_script_fn(
        &mut self,
        func: &Rc<ScriptFn>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if args.len() != func.params.len() {
            return Err(RuntimeError::ArityMismatch {
                name: func.name.clone(),
                expected: func.params.len(),
                got: args.len(),
            });
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::RecursionLimit(MAX_CALL_DEPTH));
        }
        self.call_depth += 1;
        let saved_qual = self.current_qual.replace(func.qualname.clone());

        let scope = func.closure.child();
        for (param, arg) in func.params.iter().zip(args) {
            scope.define(param.clone(), arg);
        }
        // `async fn` runs eagerly to completion; there is no scheduler.
        let result = self.exec_block(&func.body, &scope);

        self.current_qual = saved_qual;
        self.call_depth -= 1;
        match result {
            Ok(()) => Ok(Value::Nil),
            Err(RuntimeError::Return(value)) => Ok(value),
            Err(RuntimeError::Break) => Err(RuntimeError::BreakOutsideLoop),
            Err(RuntimeError::Continue) => Err(RuntimeError::ContinueOutsideLoop),
            Err(other) => Err(other),
        }
    }

    // ── Modules ─────────────────────────────────────────────────────────

    fn eval_use(&mut self, decl: &UseDecl, env: &Environment) -> Result<(), RuntimeError> {
        let module = self.load_module(&decl.module)?;
        let member = module.member(&decl.name).ok_or_else(|| RuntimeError::UndefinedMember {
            module: module.name.clone(),
            name: decl.name.clone(),
        })?;
        let binding = decl.alias.clone().unwrap_or_else(|| decl.name.clone());
        env.define(binding, member);
        Ok(())
    }

    fn eval_import(&mut self, decl: &ImportDecl, env: &Environment) -> Result<(), RuntimeError> {
        let module = self.load_module(&decl.module)?;
        env.define(decl.module.leaf().clone(), Value::Module(module));
        Ok(())
    }

    /// Resolve, execute and cache a module. Native modules win over source
    /// files; source modules execute once and faults evict the cache entry
    /// so a later attempt can retry.
    pub fn load_module(&mut self, path: &ModulePath) -> Result<Rc<ModuleHandle>, RuntimeError> {
        let key = SmolStr::from(path.dotted());
        if let Some(module) = self.native_modules.get(&key) {
            return Ok(module.clone());
        }
        match self.module_cache.get(&key) {
            Some(ModuleState::Loaded(module)) => return Ok(module.clone()),
            Some(ModuleState::Loading) => {
                return Err(ModuleError::Cycle { name: key }.into());
            }
            None => {}
        }

        let mut unit = None;
        for loader in &self.loaders {
            if let Some(found) = loader.load(path, &self.resolver)? {
                unit = Some(found);
                break;
            }
        }
        let Some(unit) = unit else {
            return Err(ModuleError::NotFound { name: key }.into());
        };

        self.module_cache.insert(key.clone(), ModuleState::Loading);
        let env = builtins::new_env();
        if let Err(err) = self.run_program(&unit.program, &env) {
            self.module_cache.remove(&key);
            return Err(err);
        }
        let module = Rc::new(ModuleHandle { name: key.clone(), env });
        self.module_cache.insert(key, ModuleState::Loaded(module.clone()));
        Ok(module)
    }

    fn check_interrupt(&self) -> Result<(), RuntimeError> {
        if let Some(flag) = &self.interrupt {
            if flag.load(Ordering::Relaxed) {
                return Err(RuntimeError::Interrupted);
            }
        }
        Ok(())
    }
}

/// Control flow that escapes the top level of a unit.
fn reject_control(err: RuntimeError) -> RuntimeError {
    match err {
        RuntimeError::Return(_) => RuntimeError::ReturnOutsideFunction,
        RuntimeError::Break => RuntimeError::BreakOutsideLoop,
        RuntimeError::Continue => RuntimeError::ContinueOutsideLoop,
        other => other,
    }
}

/// Negative indices count from the end.
fn resolve_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved as usize >= len {
        return Err(RuntimeError::IndexOutOfBounds { index, len });
    }
    Ok(resolved as usize)
}

fn eval_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    let invalid = || RuntimeError::InvalidOperands {
        op: op.symbol(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    };
    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(SmolStr::from(format!("{a}{b}")))),
            _ if numeric_pair(lhs, rhs) => Ok(Value::Float(lhs.as_float()? + rhs.as_float()?)),
            _ => Err(invalid()),
        },
        BinaryOp::Sub => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
            _ if numeric_pair(lhs, rhs) => Ok(Value::Float(lhs.as_float()? - rhs.as_float()?)),
            _ => Err(invalid()),
        },
        BinaryOp::Mul => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
            _ if numeric_pair(lhs, rhs) => Ok(Value::Float(lhs.as_float()? * rhs.as_float()?)),
            _ => Err(invalid()),
        },
        BinaryOp::Div => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    Ok(Value::Int(a.wrapping_div(*b)))
                }
            }
            _ if numeric_pair(lhs, rhs) => {
                let b = rhs.as_float()?;
                if b == 0.0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    Ok(Value::Float(lhs.as_float()? / b))
                }
            }
            _ => Err(invalid()),
        },
        BinaryOp::Rem => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    Ok(Value::Int(a.wrapping_rem(*b)))
                }
            }
            _ if numeric_pair(lhs, rhs) => {
                let b = rhs.as_float()?;
                if b == 0.0 {
                    Err(RuntimeError::DivisionByZero)
                } else {
                    Ok(Value::Float(lhs.as_float()? % b))
                }
            }
            _ => Err(invalid()),
        },
        BinaryOp::Lt => Ok(Value::Bool(order(op, lhs, rhs)?.is_lt())),
        BinaryOp::Le => Ok(Value::Bool(order(op, lhs, rhs)?.is_le())),
        BinaryOp::Gt => Ok(Value::Bool(order(op, lhs, rhs)?.is_gt())),
        BinaryOp::Ge => Ok(Value::Bool(order(op, lhs, rhs)?.is_ge())),
        // Short-circuit forms are evaluated before operands reach here.
        BinaryOp::And | BinaryOp::Or => Err(invalid()),
    }
}

fn order(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<std::cmp::Ordering, RuntimeError> {
    let invalid = || RuntimeError::InvalidOperands {
        op: op.symbol(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    };
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ if numeric_pair(lhs, rhs) => {
            lhs.as_float()?.partial_cmp(&rhs.as_float()?).ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn numeric_pair(lhs: &Value, rhs: &Value) -> bool {
    matches!(lhs, Value::Int(_) | Value::Float(_))
        && matches!(rhs, Value::Int(_) | Value::Float(_))
}
