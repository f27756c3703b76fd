//! Index build and load progress reporting.
//!
//! Reports observable progress while the engine loads or rebuilds its
//! index, so callers see how much embedding work is left and when search
//! is ready. Progress is emitted on **stderr** so stdout remains parseable
//! for scripts.

use std::io::Write;

/// A single progress event for an index build or load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexProgressEvent {
    /// Reading persisted files or preparing lexical statistics.
    Loading,
    /// `n` fragments embedded out of `total`.
    Embedding { n: u64, total: u64 },
    /// Writing the index files.
    Persisting,
    /// The new snapshot is live.
    Ready { fragments: u64, vectors: u64 },
}

/// Reports index progress. Implementations write to stderr (human or JSON).
pub trait IndexProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the engine.
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr: "index  embedding  1,234 / 5,000 fragments".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = human_line(&event);
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

fn human_line(event: &IndexProgressEvent) -> String {
    match event {
        IndexProgressEvent::Loading => "index  loading...\n".to_string(),
        IndexProgressEvent::Embedding { n, total } => format!(
            "index  embedding  {} / {} fragments\n",
            format_number(*n),
            format_number(*total)
        ),
        IndexProgressEvent::Persisting => "index  saving...\n".to_string(),
        IndexProgressEvent::Ready { fragments, vectors } => format!(
            "index  ready  {} fragments, {} vectors\n",
            format_number(*fragments),
            format_number(*vectors)
        ),
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = json_event(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn json_event(event: &IndexProgressEvent) -> serde_json::Value {
    match event {
        IndexProgressEvent::Loading => serde_json::json!({
            "event": "progress",
            "phase": "loading"
        }),
        IndexProgressEvent::Embedding { n, total } => serde_json::json!({
            "event": "progress",
            "phase": "embedding",
            "n": n,
            "total": total
        }),
        IndexProgressEvent::Persisting => serde_json::json!({
            "event": "progress",
            "phase": "persisting"
        }),
        IndexProgressEvent::Ready { fragments, vectors } => serde_json::json!({
            "event": "ready",
            "fragments": fragments,
            "vectors": vectors
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn human_embedding_line() {
        let line = human_line(&IndexProgressEvent::Embedding { n: 1234, total: 5000 });
        assert_eq!(line, "index  embedding  1,234 / 5,000 fragments\n");
    }

    #[test]
    fn json_ready_event() {
        let obj = json_event(&IndexProgressEvent::Ready {
            fragments: 10,
            vectors: 7,
        });
        assert_eq!(obj["event"], "ready");
        assert_eq!(obj["vectors"], 7);
    }
}
