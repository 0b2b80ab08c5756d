//! Resident set size sampling for the current process.
//!
//! Probes read memory around every instrumented call, so this path stays
//! cheap: one small `/proc` read, no syscalls beyond it. Platforms without
//! `/proc` report `None` and the probe layer degrades instead of failing.

/// RSS in MiB, or `None` when the platform offers no reading.
pub fn rss_mib() -> Option<f64> {
    rss_bytes().map(|bytes| bytes as f64 / (1024.0 * 1024.0))
}

/// Whether this process can observe its own resident set size.
pub fn sampling_available() -> bool {
    rss_bytes().is_some()
}

#[cfg(target_os = "linux")]
fn rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    // `getconf PAGESIZE`, but practically it's always 4096.
    resident_pages(&statm).map(|pages| pages * 4096)
}

#[cfg(not(target_os = "linux"))]
fn rss_bytes() -> Option<u64> {
    None
}

/// Second field of `/proc/self/statm`: pages resident in real memory.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn resident_pages(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resident_pages_parse() {
        assert_eq!(resident_pages("48167 11232 4543 12 0 8612 0"), Some(11232));
    }

    #[test]
    fn test_resident_pages_rejects_garbage() {
        assert_eq!(resident_pages(""), None);
        assert_eq!(resident_pages("48167"), None);
        assert_eq!(resident_pages("48167 pages"), None);
    }

    #[test]
    fn test_rss_mib_live() {
        if cfg!(target_os = "linux") {
            let rss = rss_mib().unwrap();
            assert!(rss > 0.0);
        }
    }
}
