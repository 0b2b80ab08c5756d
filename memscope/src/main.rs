//! # memscope - Main Entry Point
//!
//! Supports two operational modes:
//! - **Profile** (`memscope app.mss [args...]`): instrument the script, run it,
//!   persist one entry per probed call
//! - **Report** (`memscope --report data.json`): render recorded data to HTML

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use memscope::cli::{Args, Backend};
use memscope::domain::SinkError;
use memscope::host::{self, RunConfig};
use memscope::preflight::{check_report_data, run_preflight_checks};
use memscope::report;
use memscope::sink::{JsonFileSink, ProfileSink, SqliteSink};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOTFOUND: i32 = 2;
const EXIT_UNSUPPORTED: i32 = 3;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(code) => code,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("not found") {
        EXIT_NOTFOUND
    } else if msg.contains("sampling unavailable") {
        EXIT_UNSUPPORTED
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<i32> {
    let args = Args::parse();

    if let Some(data) = args.report {
        return render_report(&data, args.out);
    }

    let Some(script) = args.script else {
        anyhow::bail!(
            "Missing required argument: SCRIPT or --report\n\n\
             Usage:\n  \
             memscope app.mss              Profile a script\n  \
             memscope --report data.json   Render recorded data\n\n\
             Run 'memscope --help' for more options"
        );
    };

    run_preflight_checks(&script)?;
    host::install_interrupt_handler();

    let output = args.output.unwrap_or_else(|| default_output(args.backend));
    let sink = build_sink(args.backend, &output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    info!("recording profile entries to {}", output.display());

    let code = host::run(RunConfig {
        entry: script,
        script_args: args.args,
        sink,
        flush_timeout: flush_duration(args.flush_timeout),
        dump_tree: args.dump_tree,
        search_paths: args.path,
    })?;
    Ok(code)
}

fn render_report(data: &Path, out: Option<PathBuf>) -> Result<i32> {
    check_report_data(data)?;
    let out = out.unwrap_or_else(|| data.with_extension("html"));
    report::write_report(data, &out)
        .with_context(|| format!("Failed to render {}", data.display()))?;
    println!("report written to {}", out.display());
    Ok(EXIT_SUCCESS)
}

fn default_output(backend: Backend) -> PathBuf {
    match backend {
        Backend::Json => PathBuf::from("memscope_profile.json"),
        Backend::Sqlite => PathBuf::from("memscope_profile.db"),
    }
}

fn build_sink(backend: Backend, output: &Path) -> Result<Box<dyn ProfileSink>, SinkError> {
    Ok(match backend {
        Backend::Json => Box::new(JsonFileSink::create(output)?),
        Backend::Sqlite => Box::new(SqliteSink::create(output)?),
    })
}

/// clap accepts any float for `--flush-timeout`; clamp it to something sane.
fn flush_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs.min(3600.0))
    } else {
        Duration::ZERO
    }
}
