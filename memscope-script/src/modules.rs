//! Module resolution and loading.
//!
//! Dot paths map to files: `util.math` resolves to `util/math.mss` under
//! the resolver's root directory, then under each extra search path in
//! order. Loading is split from resolution so hosts can change how source
//! becomes an executable unit: loaders implementing [`ModuleLoader`] are
//! consulted head-first, each may claim a load by returning a parsed unit
//! or decline with `Ok(None)` to let the chain continue. The interpreter
//! executes whatever unit the chain produced inside a fresh module
//! namespace and caches it by name.

use crate::ast::{ModulePath, Program};
use crate::error::ParseError;
use crate::parser;
use smol_str::SmolStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extension for script sources, without the leading dot.
pub const SOURCE_EXTENSION: &str = "mss";

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module `{name}` not found")]
    NotFound { name: SmolStr },

    #[error("cannot read module `{name}`: {source}")]
    Io {
        name: SmolStr,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in module `{name}`: {source}")]
    Parse {
        name: SmolStr,
        #[source]
        source: ParseError,
    },

    #[error("circular import of module `{name}`")]
    Cycle { name: SmolStr },
}

/// A parsed module ready for execution.
#[derive(Debug)]
pub struct ModuleUnit {
    pub name: SmolStr,
    pub path: PathBuf,
    pub program: Program,
}

/// Maps module paths to source files.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    root: PathBuf,
    search_paths: Vec<PathBuf>,
}

impl ModuleResolver {
    pub fn new(root: PathBuf) -> Self {
        Self { root, search_paths: Vec::new() }
    }

    /// Append a directory consulted after the root.
    pub fn add_search_path(&mut self, dir: PathBuf) {
        self.search_paths.push(dir);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the file backing `path`, or `None` when no candidate exists.
    pub fn resolve(&self, path: &ModulePath) -> Option<PathBuf> {
        let mut relative = PathBuf::new();
        for segment in &path.segments {
            relative.push(segment.as_str());
        }
        relative.set_extension(SOURCE_EXTENSION);

        std::iter::once(&self.root)
            .chain(self.search_paths.iter())
            .map(|dir| dir.join(&relative))
            .find(|candidate| candidate.is_file())
    }
}

/// A strategy for turning a resolved module into an executable unit.
///
/// Returning `Ok(None)` declines the load and lets the next loader in the
/// chain try; only a resolution the loader cannot serve should decline,
/// while read or parse failures on a claimed load are reported as errors.
pub trait ModuleLoader {
    fn load(
        &self,
        path: &ModulePath,
        resolver: &ModuleResolver,
    ) -> Result<Option<ModuleUnit>, ModuleError>;
}

/// Default loader: read the resolved file and parse it unchanged.
#[derive(Debug, Default)]
pub struct SourceLoader;

impl ModuleLoader for SourceLoader {
    fn load(
        &self,
        path: &ModulePath,
        resolver: &ModuleResolver,
    ) -> Result<Option<ModuleUnit>, ModuleError> {
        let name = SmolStr::new(path.dotted());
        let Some(origin) = resolver.resolve(path) else {
            return Ok(None);
        };
        let source = std::fs::read_to_string(&origin)
            .map_err(|e| ModuleError::Io { name: name.clone(), source: e })?;
        let program = parser::parse(&source)
            .map_err(|e| ModuleError::Parse { name: name.clone(), source: e })?;
        log::debug!("loaded module `{name}` from {}", origin.display());
        Ok(Some(ModuleUnit { name, path: origin, program }))
    }
}
