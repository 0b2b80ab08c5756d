//! # memscope - Script Memory Profiler
//!
//! memscope runs `.mss` scripts under line-level memory instrumentation. It
//! rewrites the source on the way in so that every function carries a probe,
//! samples the process's resident set around each probed call, and persists
//! one profile entry per completed call to a pluggable backend.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Entry Script (.mss)                      │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ parse + rewrite
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Instrumentation Layer                        │
//! │  • injector: probe import + annotation on every function        │
//! │  • loader: rewrites imported modules inside the base directory  │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ instrumented tree
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   memscope (This Crate)                         │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │    Host      │──▶│    Probe     │──▶│   Pipeline   │        │
//! │  │ (interpreter)│   │ (RSS deltas) │   │ (consumer)   │        │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘        │
//! │                                               │                │
//! │                                               ▼                │
//! │                      ┌──────────────┐   ┌──────────────┐       │
//! │                      │    Report    │◀──│    Sinks     │       │
//! │                      │    (HTML)    │   │ (JSON/SQLite)│       │
//! │                      └──────────────┘   └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`instrument`]: source rewriting
//!   - `injector`: insert the probe import and annotate unmarked functions
//!   - `loader`: interpreter plug-in that rewrites in-tree module loads
//!
//! - [`host`]: one profiling run end to end
//!   - working-directory swap with a drop guard, argv, SIGINT wiring
//!
//! - [`probe`]: the native `profiler.probe` decorator
//!   - samples RSS before/after, captures a per-statement trace
//!
//! - [`pipeline`]: background persistence with bounded-wait shutdown
//!
//! - [`sink`]: persistence backends
//!   - `json_file`: single JSON array, always left parseable
//!   - `sqlite`: content-addressed log store with per-call rows
//!
//! - [`report`]: loads either backend and renders standalone HTML
//!
//! - [`memory`]: resident-set sampling from `/proc/self/statm`
//!
//! - [`cli`]: command-line argument parsing
//!
//! - [`domain`]: the profile entry model and error types
//!
//! ## Probing Model
//!
//! Scripts do not need to opt in: the injector appends a probe annotation to
//! every function that is not already marked, and appending keeps the probe
//! innermost so it measures the function itself rather than other
//! decorators. Functions annotated with `probe` or `memo` by hand are left
//! alone. Rewriting is idempotent; transforming already-instrumented source
//! changes nothing.

pub mod cli;
pub mod domain;
pub mod host;
pub mod instrument;
pub mod memory;
pub mod pipeline;
pub mod preflight;
pub mod probe;
pub mod report;
pub mod sink;
