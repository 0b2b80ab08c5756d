//! Source rewriting.
//!
//! [`injector`] turns a parsed unit into its instrumented form; [`loader`]
//! plugs that into the interpreter's module loader chain so rewriting
//! happens at load time, scoped to the profiled directory.

pub mod injector;
pub mod loader;

pub use injector::{transform, MARKER_ANNOTATIONS, PROBE_ALIAS, PROBE_MODULE, PROBE_NAME};
pub use loader::RewritingLoader;
