//! The `probe` decorator, the in-language face of the profiler.
//!
//! Scripts see it as the `probe` member of the native `profiler` module.
//! Applied to a function it returns a wrapper that samples resident memory
//! around each call, captures a per-statement trace for script functions,
//! and emits one [`ProfileEntry`] per completed call. Calls that raise
//! produce no entry; the error passes through untouched.

use crate::domain::ProfileEntry;
use crate::instrument::{PROBE_MODULE, PROBE_NAME};
use crate::memory;
use crate::pipeline::PipelineHandle;
use memscope_script::value::ScriptFn;
use memscope_script::{Environment, Interpreter, RuntimeError, StepHook, Value};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Register the native `profiler` module on `interp`, wiring its `probe`
/// member to `handle`.
pub fn register(interp: &mut Interpreter, handle: PipelineHandle) {
    let env = Environment::new();
    env.define(PROBE_NAME.into(), decorator(handle));
    interp.register_native_module(PROBE_MODULE, env);
}

fn decorator(handle: PipelineHandle) -> Value {
    Value::native(PROBE_NAME, move |_interp, args| {
        if args.len() != 1 {
            return Err(RuntimeError::ArityMismatch {
                name: PROBE_NAME.into(),
                expected: 1,
                got: args.len(),
            });
        }
        instrumented(&args[0], handle.clone())
    })
}

/// Build the wrapper around `target`. Script functions get a step trace
/// headed by their qualified name and declaration line; native functions
/// have no statements to trace, so their log stays empty.
fn instrumented(target: &Value, handle: PipelineHandle) -> Result<Value, RuntimeError> {
    let (label, script): (SmolStr, Option<Rc<ScriptFn>>) = match target {
        Value::Function(func) => (func.qualname.clone(), Some(Rc::clone(func))),
        Value::Native(func) => (func.name.clone(), None),
        other => {
            return Err(RuntimeError::TypeMismatch {
                expected: "function",
                got: other.type_name(),
            })
        }
    };
    let inner = target.clone();

    Ok(Value::native(label.clone(), move |interp, args| {
        let timestamp = epoch_seconds();
        let Some(mem_before) = memory::rss_mib() else {
            // No baseline sample means nothing to record; stay out of the way.
            return interp.call_value(inner.clone(), args.to_vec());
        };

        let log_buf = Rc::new(RefCell::new(String::new()));
        let prev_hook = script.as_ref().map(|func| {
            log_buf
                .borrow_mut()
                .push_str(&format!("{} (line {})\n", func.qualname, func.decl_line));
            let buf = Rc::clone(&log_buf);
            let hook: StepHook = Rc::new(move |line| {
                if let Some(rss) = memory::rss_mib() {
                    buf.borrow_mut().push_str(&format!("line {line} rss {rss:.3} MiB\n"));
                }
            });
            interp.set_step_hook(Some(hook))
        });

        let result = interp.call_value(inner.clone(), args.to_vec());
        // Restore before propagating so an enclosing probe keeps its trace.
        if let Some(prev) = prev_hook {
            interp.set_step_hook(prev);
        }
        let value = result?;

        let Some(mem_after) = memory::rss_mib() else {
            return Ok(value);
        };
        handle.emit(ProfileEntry::new(
            label.as_str(),
            mem_before,
            mem_after,
            timestamp,
            log_buf.take(),
        ));
        Ok(value)
    }))
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SinkError;
    use crate::pipeline::Pipeline;
    use crate::sink::ProfileSink;
    use memscope_script::modules::ModuleResolver;
    use memscope_script::{builtins, parser};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct CollectingSink(Arc<Mutex<Vec<ProfileEntry>>>);

    impl ProfileSink for CollectingSink {
        fn handle(&self, entry: &ProfileEntry) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(entry.clone());
            Ok(())
        }

        fn close(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn run_profiled(source: &str) -> (Result<(), RuntimeError>, Vec<ProfileEntry>) {
        let sink = CollectingSink::default();
        let pipeline = Pipeline::new();
        pipeline.set_sink(Box::new(sink.clone()));

        let program = parser::parse(source).unwrap();
        let mut interp = Interpreter::new(ModuleResolver::new(std::env::temp_dir()));
        register(&mut interp, pipeline.handle());
        let env = builtins::new_env();
        let outcome = interp.run_program(&program, &env);

        pipeline.shutdown(Duration::from_secs(5));
        let entries = sink.0.lock().unwrap().clone();
        (outcome, entries)
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_probed_call_records_one_entry() {
        let (outcome, entries) = run_profiled(
            r#"
use profiler.probe as __ms_probe;

@__ms_probe
fn f() {
    let xs = alloc(64);
    sleep_ms(5);
    return len(xs);
}

f();
"#,
        );
        outcome.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.func, "f");
        assert!(entry.timestamp > 0.0);
        assert!((entry.mem_diff - (entry.mem_after - entry.mem_before)).abs() < f64::EPSILON);
        assert!(entry.log.starts_with("f (line"));
        assert!(entry.log.contains("rss"));
    }

    #[test]
    fn test_raising_call_records_nothing() {
        let (outcome, entries) = run_profiled(
            r#"
use profiler.probe as __ms_probe;

@__ms_probe
fn g() {
    return 1 / 0;
}

g();
"#,
        );
        assert!(matches!(outcome, Err(RuntimeError::DivisionByZero)));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_wrapper_preserves_the_result() {
        let source = r#"
use profiler.probe as __ms_probe;

@__ms_probe
fn double(x) {
    return x * 2;
}

let r = double(21);
"#;
        let sink = CollectingSink::default();
        let pipeline = Pipeline::new();
        pipeline.set_sink(Box::new(sink.clone()));
        let program = parser::parse(source).unwrap();
        let mut interp = Interpreter::new(ModuleResolver::new(std::env::temp_dir()));
        register(&mut interp, pipeline.handle());
        let env = builtins::new_env();
        interp.run_program(&program, &env).unwrap();
        pipeline.shutdown(Duration::from_secs(5));

        assert_eq!(env.get("r"), Some(Value::Int(42)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_nested_probes_each_record() {
        let (outcome, entries) = run_profiled(
            r#"
use profiler.probe as __ms_probe;

@__ms_probe
fn inner() {
    return alloc(16);
}

@__ms_probe
fn outer() {
    return len(inner());
}

outer();
"#,
        );
        outcome.unwrap();
        assert_eq!(entries.len(), 2);
        // The inner call completes first, so its entry lands first.
        assert_eq!(entries[0].func, "inner");
        assert_eq!(entries[1].func, "outer");
        assert!(entries[0].log.starts_with("inner (line"));
        assert!(entries[1].log.starts_with("outer (line"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_native_target_gets_empty_log() {
        let (outcome, entries) = run_profiled(
            r#"
use profiler.probe as p;

let wrapped = p(len);
wrapped([1, 2, 3]);
"#,
        );
        outcome.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].func, "len");
        assert!(entries[0].log.is_empty());
    }

    #[test]
    fn test_decorator_rejects_non_functions() {
        let (outcome, entries) = run_profiled(
            r#"
use profiler.probe as p;

p(42);
"#,
        );
        assert!(matches!(
            outcome,
            Err(RuntimeError::TypeMismatch { expected: "function", .. })
        ));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_decorator_wants_exactly_one_argument() {
        let (outcome, _) = run_profiled(
            r#"
use profiler.probe as p;

p();
"#,
        );
        assert!(matches!(outcome, Err(RuntimeError::ArityMismatch { .. })));
    }
}
