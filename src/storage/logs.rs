//! Log-file read helpers.
//!
//! Each job has one append-only log. Writers (the run supervisor and the
//! native scheduler's output redirection) append delimited sections; these
//! helpers only read, truncating to the last N lines and/or a character cap
//! so callers never pull an unbounded file into memory-facing surfaces.

use std::path::Path;

use super::StoreError;

/// Read the tail of a log file.
///
/// `lines` keeps only the last N lines; `max_chars` then caps the result to
/// its last N characters (cutting on a character boundary). A missing log
/// reads as empty — a job may simply never have run.
pub async fn tail(
    path: &Path,
    lines: Option<usize>,
    max_chars: Option<usize>,
) -> Result<String, StoreError> {
    let body = match tokio::fs::read_to_string(path).await {
        Ok(body) => body,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(truncate(&body, lines, max_chars))
}

fn truncate(body: &str, lines: Option<usize>, max_chars: Option<usize>) -> String {
    let mut out: String = match lines {
        Some(n) => {
            let all: Vec<&str> = body.lines().collect();
            let start = all.len().saturating_sub(n);
            all[start..].join("\n")
        }
        None => body.to_string(),
    };
    if let Some(cap) = max_chars {
        if out.chars().count() > cap {
            let skip = out.chars().count() - cap;
            out = out.chars().skip(skip).collect();
        }
    }
    out
}
