//! Script execution host.
//!
//! One `run` owns the whole lifecycle: resolve and transform the entry,
//! swap the working directory, stage the interpreter with builtins, argv,
//! the `profiler` module and the rewriting loader, execute, then flush the
//! pipeline. Everything scoped to the run is released on every exit path.

use crate::domain::HostError;
use crate::instrument::{self, RewritingLoader};
use crate::pipeline::Pipeline;
use crate::probe;
use crate::sink::ProfileSink;
use memscope_script::modules::ModuleResolver;
use memscope_script::{builtins, Interpreter, RuntimeError};
use smol_str::SmolStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub struct RunConfig {
    pub entry: PathBuf,
    /// Arguments the script sees after its own path.
    pub script_args: Vec<String>,
    pub sink: Box<dyn ProfileSink>,
    /// How long shutdown waits for queued entries to persist.
    pub flush_timeout: Duration,
    /// Print the instrumented entry tree to stderr before running.
    pub dump_tree: bool,
    /// Extra module search directories beyond the entry's own.
    pub search_paths: Vec<PathBuf>,
}

/// Execute the configured script and return the process exit code.
///
/// Faults inside the script are reported here and folded into the code;
/// only failures to stage the run at all surface as `HostError`.
pub fn run(config: RunConfig) -> Result<i32, HostError> {
    let entry = config
        .entry
        .canonicalize()
        .map_err(|source| HostError::ResolveEntry { path: config.entry.clone(), source })?;
    let entry_dir = entry.parent().unwrap_or_else(|| Path::new("/")).to_path_buf();

    let source = std::fs::read_to_string(&entry)
        .map_err(|source| HostError::ReadEntry { path: entry.clone(), source })?;

    // For the entry script a transform failure is fatal; only dynamically
    // loaded modules get the untransformed fallback.
    let program = instrument::transform(&source, &entry)?;
    if config.dump_tree {
        eprintln!("{program:#?}");
    }

    let _cwd = CwdGuard::enter(&entry_dir)?;

    let pipeline = Pipeline::new();
    pipeline.set_sink(config.sink);

    let mut resolver = ModuleResolver::new(entry_dir.clone());
    for dir in &config.search_paths {
        resolver.add_search_path(dir.clone());
    }

    let mut interp = Interpreter::new(resolver);
    let mut args: Vec<SmolStr> = Vec::with_capacity(config.script_args.len() + 1);
    args.push(SmolStr::from(entry.display().to_string()));
    args.extend(config.script_args.iter().map(|arg| SmolStr::from(arg.as_str())));
    interp.set_script_args(args);

    let flag = interrupt_flag();
    flag.store(false, Ordering::Relaxed);
    interp.set_interrupt(Arc::clone(flag));

    probe::register(&mut interp, pipeline.handle());
    interp.install_loader(Box::new(RewritingLoader::new(entry_dir)));

    let env = builtins::new_env();
    let code = match interp.run_program(&program, &env) {
        Ok(()) => 0,
        Err(RuntimeError::Exit(code)) => code,
        Err(RuntimeError::Interrupted) => {
            eprintln!("Interrupted");
            // 128 + SIGINT
            130
        }
        Err(err) => {
            eprintln!("Error: {err}");
            1
        }
    };

    pipeline.shutdown(config.flush_timeout);
    Ok(code)
}

/// Route Ctrl-C to the interpreter's interrupt flag so a run stops at the
/// next statement boundary instead of dying mid-write.
pub fn install_interrupt_handler() {
    interrupt_flag();
    // Registration has to go through the raw signal API; the handler body
    // only touches an atomic.
    #[allow(unsafe_code)]
    unsafe {
        libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t);
    }
}

static INTERRUPT: OnceLock<Arc<AtomicBool>> = OnceLock::new();

fn interrupt_flag() -> &'static Arc<AtomicBool> {
    INTERRUPT.get_or_init(|| Arc::new(AtomicBool::new(false)))
}

extern "C" fn handle_sigint(_signal: libc::c_int) {
    if let Some(flag) = INTERRUPT.get() {
        flag.store(true, Ordering::Relaxed);
    }
}

/// Restores the original working directory when the run ends, fault or not.
struct CwdGuard {
    original: PathBuf,
}

impl CwdGuard {
    fn enter(dir: &Path) -> Result<Self, HostError> {
        let original = std::env::current_dir()
            .map_err(|source| HostError::Chdir { path: dir.to_path_buf(), source })?;
        std::env::set_current_dir(dir)
            .map_err(|source| HostError::Chdir { path: dir.to_path_buf(), source })?;
        Ok(Self { original })
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Err(err) = std::env::set_current_dir(&self.original) {
            log::warn!(
                "could not restore working directory to {}: {err}",
                self.original.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SinkError;
    use std::sync::Mutex;

    // run() swaps the process working directory, so these tests serialize.
    static CWD_LOCK: Mutex<()> = Mutex::new(());

    struct NullSink;

    impl ProfileSink for NullSink {
        fn handle(&self, _entry: &crate::domain::ProfileEntry) -> Result<(), SinkError> {
            Ok(())
        }

        fn close(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn config_for(entry: PathBuf) -> RunConfig {
        RunConfig {
            entry,
            script_args: Vec::new(),
            sink: Box::new(NullSink),
            flush_timeout: Duration::from_secs(2),
            dump_tree: false,
            search_paths: Vec::new(),
        }
    }

    fn write_script(dir: &tempfile::TempDir, name: &str, source: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_missing_entry_is_a_resolve_error() {
        let err = run(config_for(PathBuf::from("/no/such/script.mss"))).unwrap_err();
        assert!(matches!(err, HostError::ResolveEntry { .. }));
    }

    #[test]
    fn test_cwd_guard_restores_on_drop() {
        let _serial = CWD_LOCK.lock().unwrap();
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        {
            let _guard = CwdGuard::enter(dir.path()).unwrap();
            let inside = std::env::current_dir().unwrap();
            assert_eq!(inside.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
        }
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn test_explicit_exit_code_passes_through() {
        let _serial = CWD_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let entry = write_script(&dir, "entry.mss", "exit(7);\n");
        assert_eq!(run(config_for(entry)).unwrap(), 7);
    }

    #[test]
    fn test_script_args_include_the_entry_path() {
        let _serial = CWD_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let entry = write_script(&dir, "entry.mss", "exit(len(args()));\n");
        let mut config = config_for(entry);
        config.script_args = vec!["--fast".to_string(), "input.txt".to_string()];
        assert_eq!(run(config).unwrap(), 3);
    }

    #[test]
    fn test_script_fault_maps_to_one() {
        let _serial = CWD_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let entry = write_script(&dir, "entry.mss", "let x = 1 / 0;\n");
        assert_eq!(run(config_for(entry)).unwrap(), 1);
    }

    #[test]
    fn test_entry_syntax_error_aborts_before_running() {
        let _serial = CWD_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let entry = write_script(&dir, "entry.mss", "fn broken( {\n");
        let err = run(config_for(entry)).unwrap_err();
        assert!(matches!(err, HostError::Transform(_)));
    }
}
