//! Index progress reporting.
//!
//! Progress goes to **stderr** so stdout stays parseable for scripts.
//! Human output is shown only when stderr is a terminal.

use std::io::Write;

/// A single progress event from the indexer.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexProgressEvent {
    /// Reading the source (walking the repo, parsing the CSV). Total unknown.
    Discovering { source: String },
    /// `n` documents embedded and written out of `total`.
    Embedding { source: String, n: u64, total: u64 },
}

pub trait IndexProgressReporter: Send + Sync {
    fn report(&self, event: IndexProgressEvent);
}

/// "index repo  embedding  1,234 / 5,000 documents"
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = render(&event);
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", line);
        let _ = err.flush();
    }
}

pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

fn render(event: &IndexProgressEvent) -> String {
    match event {
        IndexProgressEvent::Discovering { source } => format!("index {}  discovering...", source),
        IndexProgressEvent::Embedding { source, n, total } => format!(
            "index {}  embedding  {} / {} documents",
            source,
            format_number(*n),
            format_number(*total)
        ),
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Pick a reporter: human output on a TTY, silence otherwise.
pub fn reporter_for_tty() -> Box<dyn IndexProgressReporter> {
    if atty::is(atty::Stream::Stderr) {
        Box::new(StderrProgress)
    } else {
        Box::new(NoProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn render_embedding_line() {
        let line = render(&IndexProgressEvent::Embedding {
            source: "repo".to_string(),
            n: 1234,
            total: 5000,
        });
        assert_eq!(line, "index repo  embedding  1,234 / 5,000 documents");
    }
}
