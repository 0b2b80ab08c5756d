//! Pre-flight checks for memscope
//!
//! Validates the target and platform before a profiling run starts.
//! Provides clear, actionable error messages when requirements aren't met.

use crate::memory;
use anyhow::{bail, Result};
use memscope_script::modules::SOURCE_EXTENSION;
use std::path::Path;

/// Run all pre-flight checks before executing a script
pub fn run_preflight_checks(script: &Path) -> Result<()> {
    check_script_exists(script)?;
    check_extension(script);
    check_sampling_supported()?;
    Ok(())
}

/// Check if the target script exists and is a file
fn check_script_exists(script: &Path) -> Result<()> {
    if !script.exists() {
        bail!(
            "Script not found: {}\n\n\
             Make sure the path is correct and the file exists.",
            script.display()
        );
    }
    if !script.is_file() {
        bail!(
            "Not a file: {}\n\n\
             The target must be a script file, not a directory.",
            script.display()
        );
    }
    Ok(())
}

/// Warn when the target does not carry the expected extension
fn check_extension(script: &Path) {
    let extension = script.extension().and_then(|ext| ext.to_str());
    if extension != Some(SOURCE_EXTENSION) {
        eprintln!(
            "warning: {} does not end in .{SOURCE_EXTENSION}; running it anyway",
            script.display()
        );
    }
}

/// Check that resident-memory sampling works on this platform
fn check_sampling_supported() -> Result<()> {
    if !memory::sampling_available() {
        bail!(
            "Memory sampling unavailable on this platform.\n\n\
             memscope reads /proc/self/statm, which only exists on Linux.\n\
             Run on a Linux host or inside a container."
        );
    }
    Ok(())
}

/// Check that persisted report data exists before rendering
pub fn check_report_data(data: &Path) -> Result<()> {
    if !data.exists() {
        bail!(
            "Report data not found: {}\n\n\
             Run a script first to produce it, or pass the right path.",
            data.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_script_says_not_found() {
        let err = check_script_exists(Path::new("/no/such/target.mss")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_directory_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_script_exists(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Not a file"));
    }

    #[test]
    fn test_missing_report_data_says_not_found() {
        let err = check_report_data(Path::new("/no/such/profile.json")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_existing_report_data_passes() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("profile.json");
        std::fs::write(&data, "[]").unwrap();
        check_report_data(&data).unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_full_preflight_passes_for_a_real_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("entry.mss");
        std::fs::write(&script, "exit(0);\n").unwrap();
        run_preflight_checks(&script).unwrap();
    }
}
