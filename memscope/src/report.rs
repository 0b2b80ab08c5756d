//! Standalone HTML reports over persisted profile data.
//!
//! The loader understands both backends and always hands entries over in
//! timestamp order, so the renderer never cares where the data came from.

use crate::domain::{ProfileEntry, ReportError};
use rusqlite::{Connection, OpenFlags};
use std::fmt::Write as _;
use std::path::Path;

/// Read entries from a JSON array file or a SQLite store, ordered by
/// timestamp ascending.
pub fn load_entries(path: &Path) -> Result<Vec<ProfileEntry>, ReportError> {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match extension {
        "json" => {
            let text = std::fs::read_to_string(path)?;
            let mut entries: Vec<ProfileEntry> = serde_json::from_str(&text)?;
            entries.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
            Ok(entries)
        }
        "db" | "sqlite" | "sqlite3" => load_sqlite(path),
        _ => Err(ReportError::UnknownFormat { path: path.to_path_buf() }),
    }
}

fn load_sqlite(path: &Path) -> Result<Vec<ProfileEntry>, ReportError> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare(
        "SELECT e.func, e.mem_before, e.mem_after, e.mem_diff, e.timestamp, l.log_text
         FROM entries e JOIN logs l ON e.log_hash = l.hash
         ORDER BY e.timestamp ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ProfileEntry {
            func: row.get(0)?,
            mem_before: row.get(1)?,
            mem_after: row.get(2)?,
            mem_diff: row.get(3)?,
            timestamp: row.get(4)?,
            log: row.get(5)?,
        })
    })?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Load `data` and write the rendered report to `out`.
pub fn write_report(data: &Path, out: &Path) -> Result<(), ReportError> {
    let entries = load_entries(data)?;
    std::fs::write(out, render_html(&entries))?;
    Ok(())
}

/// Render a self-contained HTML page: run totals, the heaviest calls, and
/// a per-call section with the captured step log.
pub fn render_html(entries: &[ProfileEntry]) -> String {
    let net: f64 = entries.iter().map(|e| e.mem_diff).sum();
    let peak = entries.iter().map(|e| e.mem_after).fold(0.0_f64, f64::max);

    let mut heaviest: Vec<&ProfileEntry> = entries.iter().collect();
    heaviest.sort_by(|a, b| b.mem_diff.total_cmp(&a.mem_diff));
    heaviest.truncate(5);

    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str("<title>memscope report</title>\n<style>\n");
    page.push_str(
        "body { font-family: sans-serif; margin: 2em; }\n\
         table { border-collapse: collapse; }\n\
         th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }\n\
         th:first-child, td:first-child { text-align: left; }\n\
         pre { background: #f6f6f6; padding: 8px; overflow-x: auto; }\n",
    );
    page.push_str("</style>\n</head>\n<body>\n<h1>memscope report</h1>\n");

    let _ = writeln!(
        page,
        "<p>Total calls: {} &middot; Net change: {net:.3} MiB &middot; Peak usage: {peak:.3} MiB</p>",
        entries.len()
    );

    page.push_str("<h2>Heaviest calls</h2>\n<table>\n");
    page.push_str("<tr><th>function</th><th>diff (MiB)</th><th>after (MiB)</th></tr>\n");
    for entry in &heaviest {
        let _ = writeln!(
            page,
            "<tr><td>{}</td><td>{:.3}</td><td>{:.3}</td></tr>",
            escape_html(&entry.func),
            entry.mem_diff,
            entry.mem_after
        );
    }
    page.push_str("</table>\n");

    page.push_str("<h2>Calls</h2>\n");
    for entry in entries {
        let _ = writeln!(
            page,
            "<h3>{}</h3>\n<p>timestamp {:.3} &middot; before {:.3} MiB &middot; \
             after {:.3} MiB &middot; diff {:.3} MiB</p>",
            escape_html(&entry.func),
            entry.timestamp,
            entry.mem_before,
            entry.mem_after,
            entry.mem_diff
        );
        if !entry.log.is_empty() {
            let _ = writeln!(page, "<pre>{}</pre>", escape_html(&entry.log));
        }
    }

    page.push_str("</body>\n</html>\n");
    page
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ProfileSink, SqliteSink};
    use std::path::PathBuf;

    fn entry(func: &str, diff: f64, timestamp: f64, log: &str) -> ProfileEntry {
        ProfileEntry::new(func, 100.0, 100.0 + diff, timestamp, log.to_string())
    }

    #[test]
    fn test_json_entries_come_back_in_timestamp_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let out_of_order =
            vec![entry("late", 1.0, 20.0, ""), entry("early", 2.0, 10.0, "")];
        std::fs::write(&path, serde_json::to_string_pretty(&out_of_order).unwrap()).unwrap();

        let loaded = load_entries(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].func, "early");
        assert_eq!(loaded[1].func, "late");
    }

    #[test]
    fn test_sqlite_entries_come_back_in_timestamp_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.db");
        let sink = SqliteSink::create(&path).unwrap();
        sink.handle(&entry("late", 1.0, 20.0, "trace a")).unwrap();
        sink.handle(&entry("early", 2.0, 10.0, "trace b")).unwrap();
        sink.close().unwrap();

        let loaded = load_entries(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].func, "early");
        assert_eq!(loaded[0].log, "trace b");
        assert_eq!(loaded[1].func, "late");
        assert_eq!(loaded[1].log, "trace a");
    }

    #[test]
    fn test_unrecognized_extension_is_rejected() {
        let err = load_entries(&PathBuf::from("profile.csv")).unwrap_err();
        assert!(matches!(err, ReportError::UnknownFormat { .. }));
    }

    #[test]
    fn test_html_carries_names_totals_and_escaped_logs() {
        let entries = vec![
            entry("alpha", 3.0, 1.0, "line 2 rss 100.000 MiB\n"),
            entry("beta", 1.0, 2.0, "<script>alert(1)</script>"),
        ];
        let html = render_html(&entries);
        assert!(html.contains("Total calls: 2"));
        assert!(html.contains("Net change: 4.000 MiB"));
        assert!(html.contains("alpha"));
        assert!(html.contains("beta"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert(1)"));
    }

    #[test]
    fn test_write_report_produces_a_standalone_page() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("profile.json");
        std::fs::write(&data, serde_json::to_string(&vec![entry("f", 1.0, 1.0, "")]).unwrap())
            .unwrap();
        let out = dir.path().join("report.html");

        write_report(&data, &out).unwrap();
        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_empty_data_still_renders() {
        let html = render_html(&[]);
        assert!(html.contains("Total calls: 0"));
        assert!(html.contains("Peak usage: 0.000 MiB"));
    }
}
