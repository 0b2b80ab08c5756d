//! # memscope-script - Embeddable Scripting Language
//!
//! The scripting language executed by the `memscope` profiler. Scripts are
//! plain text (`.mss` files) with functions, closures, `@name` annotations
//! and a dotted module system; the executable form of a unit is its syntax
//! tree, which hosts may rewrite before execution.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ┌────────────┐    ┌────────────┐    ┌────────────┐    ┌────────────┐
//! │   Source   │───▶│   Tokens   │───▶│   Syntax   │───▶│ Evaluation │
//! │  (.mss)    │    │  (lexer)   │    │    Tree    │    │  (interp)  │
//! └────────────┘    └────────────┘    └─────┬──────┘    └─────┬──────┘
//!                                           │                 │
//!                                  host rewrites via          │
//!                                  [`modules::ModuleLoader`]  │
//!                                           │                 ▼
//!                                           │          ┌────────────┐
//!                                           └─────────▶│  Modules   │
//!                                                      │ (cached)   │
//!                                                      └────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`lexer`]: source text to tokens, via `logos`
//! - [`parser`]: tokens to a [`ast::Program`]
//! - [`ast`]: the mutable syntax tree hosts may transform
//! - [`interp`]: tree-walking evaluator with annotations, a statement hook
//!   and a cooperative interrupt flag
//! - [`modules`]: dotted-path resolution and the loader chain
//! - [`builtins`]: functions bound in every scope (`println`, `range`,
//!   `memo`, ...)
//! - [`env`] / [`value`]: scope chains and runtime values
//!
//! ## Hosting
//!
//! Hosts drive the crate through three seams: [`modules::ModuleLoader`] to
//! change how source becomes an executable unit,
//! [`interp::Interpreter::register_native_module`] to expose host
//! functions to scripts, and [`interp::Interpreter::set_step_hook`] to
//! observe execution statement by statement.

pub mod ast;
pub mod builtins;
pub mod env;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod modules;
pub mod parser;
pub mod span;
pub mod value;

pub use env::Environment;
pub use error::{ParseError, RuntimeError};
pub use interp::{Interpreter, StepHook};
pub use value::Value;
