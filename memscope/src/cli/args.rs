//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "memscope",
    about = "Profile per-call memory usage of memscope scripts",
    after_help = "\
EXAMPLES:
    memscope app.mss                          Profile with the JSON backend
    memscope app.mss --backend sqlite         Content-addressed SQLite store
    memscope app.mss --path lib -- input.csv  Extra module dir, script args
    memscope --report memscope_profile.json   Render an HTML report"
)]
pub struct Args {
    /// Script to profile
    #[arg(value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Arguments passed through to the script
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Persistence backend for profile entries
    #[arg(long, value_enum, default_value_t = Backend::Json)]
    pub backend: Backend,

    /// Output file (default memscope_profile.json or .db)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Seconds to wait for queued entries on shutdown
    #[arg(long, value_name = "SECS", default_value = "2.0")]
    pub flush_timeout: f64,

    /// Print the instrumented syntax tree to stderr before running
    #[arg(long)]
    pub dump_tree: bool,

    /// Additional module search directories
    #[arg(long, value_name = "DIR")]
    pub path: Vec<PathBuf>,

    /// Render an HTML report from recorded data instead of running a script
    #[arg(long, value_name = "DATA", conflicts_with = "script")]
    pub report: Option<PathBuf>,

    /// Where to write the rendered report (default next to the data)
    #[arg(long, value_name = "FILE", requires = "report")]
    pub out: Option<PathBuf>,
}

/// Where profile entries are persisted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Single JSON array file
    Json,
    /// SQLite store with content-addressed logs
    Sqlite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_with_passthrough_args() {
        let args =
            Args::try_parse_from(["memscope", "app.mss", "--fast", "input.csv"]).unwrap();
        assert_eq!(args.script, Some(PathBuf::from("app.mss")));
        assert_eq!(args.args, vec!["--fast".to_string(), "input.csv".to_string()]);
        assert_eq!(args.backend, Backend::Json);
    }

    #[test]
    fn test_report_conflicts_with_script() {
        let result = Args::try_parse_from(["memscope", "app.mss", "--report", "data.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_out_requires_report() {
        let result = Args::try_parse_from(["memscope", "--out", "report.html"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_backend_and_output_parse() {
        let args = Args::try_parse_from([
            "memscope",
            "app.mss",
            "--backend",
            "sqlite",
            "--output",
            "run.db",
        ])
        .unwrap();
        assert_eq!(args.backend, Backend::Sqlite);
        assert_eq!(args.output, Some(PathBuf::from("run.db")));
    }
}
