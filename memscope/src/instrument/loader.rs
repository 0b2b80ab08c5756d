//! Load-time instrumentation, scoped to the profiled directory.

use crate::instrument::injector;
use memscope_script::ast::ModulePath;
use memscope_script::modules::{
    ModuleError, ModuleLoader, ModuleResolver, ModuleUnit, SOURCE_EXTENSION,
};
use memscope_script::parser;
use smol_str::SmolStr;
use std::path::{Path, PathBuf};

/// Loader that rewrites every module resolved inside `base_dir` before it
/// executes. Anything else is declined so the plain source loader serves
/// it: modules that do not resolve, files outside the scope, files without
/// the script extension.
#[derive(Debug)]
pub struct RewritingLoader {
    base_dir: PathBuf,
}

impl RewritingLoader {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn claims(&self, origin: &Path) -> bool {
        origin.extension().and_then(|ext| ext.to_str()) == Some(SOURCE_EXTENSION)
            && origin.starts_with(&self.base_dir)
    }
}

impl ModuleLoader for RewritingLoader {
    fn load(
        &self,
        path: &ModulePath,
        resolver: &ModuleResolver,
    ) -> Result<Option<ModuleUnit>, ModuleError> {
        let Some(origin) = resolver.resolve(path) else {
            return Ok(None);
        };
        if !self.claims(&origin) {
            return Ok(None);
        }
        let name = SmolStr::new(path.dotted());
        let source = std::fs::read_to_string(&origin)
            .map_err(|e| ModuleError::Io { name: name.clone(), source: e })?;
        match injector::transform(&source, &origin) {
            Ok(program) => {
                log::debug!("instrumented module `{name}` from {}", origin.display());
                Ok(Some(ModuleUnit { name, path: origin, program }))
            }
            Err(err) => {
                // A module that cannot be instrumented still runs, just
                // without probes.
                log::warn!("instrumentation failed for `{name}`: {err}; running it unmodified");
                let program = parser::parse(&source)
                    .map_err(|e| ModuleError::Parse { name: name.clone(), source: e })?;
                Ok(Some(ModuleUnit { name, path: origin, program }))
            }
        }
    }
}
