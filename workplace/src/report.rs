// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::operations::ErrorDetails;
use crate::util::sync::lock_or_recover;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// Display hint attached to a report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Default,
    Headline,
    Note,
    Ok,
    Warning,
    Error,
}

impl ReportFormat {
    pub fn css_class(&self) -> &'static str {
        match self {
            ReportFormat::Default => "report-default",
            ReportFormat::Headline => "report-headline",
            ReportFormat::Note => "report-note",
            ReportFormat::Ok => "report-ok",
            ReportFormat::Warning => "report-warning",
            ReportFormat::Error => "report-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub format: ReportFormat,
    pub text: String,
}

#[derive(Debug, Default)]
struct ReportBuffer {
    entries: Vec<ReportEntry>,
    delivered: usize,
}

/// Append-only progress log shared between a worker thread and the requests polling it.
///
/// Entries are delivered at most once: every drain starts where the previous one stopped,
/// so concatenating all drains yields exactly the appended lines in emission order.
#[derive(Debug, Default)]
pub struct ReportSink {
    buffer: Mutex<ReportBuffer>,
}

impl ReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ReportBuffer> {
        lock_or_recover(&self.buffer, "Report buffer")
    }

    pub fn append(&self, line: impl Into<String>, format: ReportFormat) {
        self.lock().entries.push(ReportEntry {
            format,
            text: line.into(),
        });
    }

    pub fn append_line(&self, line: impl Into<String>) {
        self.append(line, ReportFormat::Default);
    }

    pub fn append_error(&self, details: &ErrorDetails) {
        let mut buffer = self.lock();
        buffer.entries.push(ReportEntry {
            format: ReportFormat::Error,
            text: format!("Error: {}", details.message),
        });
        if let Some(detail) = &details.detail {
            buffer.entries.push(ReportEntry {
                format: ReportFormat::Note,
                text: detail.clone(),
            });
        }
    }

    /// Text of every entry appended since the previous drain, one line per entry.
    pub fn drain_since_last_read(&self) -> String {
        render_text(&self.drain_entries())
    }

    pub fn drain_entries(&self) -> Vec<ReportEntry> {
        let mut buffer = self.lock();
        let start = buffer.delivered;
        let pending = buffer.entries[start..].to_vec();
        buffer.delivered = buffer.entries.len();
        pending
    }

    /// Full content, leaving the delivery cursor untouched.
    pub fn snapshot_text(&self) -> String {
        render_text(&self.lock().entries)
    }

    pub fn snapshot_entries(&self) -> Vec<ReportEntry> {
        self.lock().entries.clone()
    }

    pub fn has_errors(&self) -> bool {
        self.lock()
            .entries
            .iter()
            .any(|entry| entry.format == ReportFormat::Error)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn render_text(entries: &[ReportEntry]) -> String {
    let mut text = String::new();
    for entry in entries {
        text.push_str(&entry.text);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::ErrorOrigin;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn second_drain_without_append_is_empty() {
        let sink = ReportSink::new();
        sink.append_line("first");
        assert_eq!(sink.drain_since_last_read(), "first\n");
        assert_eq!(sink.drain_since_last_read(), "");
    }

    #[test]
    fn interleaved_drains_deliver_each_line_once() {
        let sink = ReportSink::new();
        let mut delivered = String::new();

        sink.append_line("a");
        sink.append("b", ReportFormat::Headline);
        delivered.push_str(&sink.drain_since_last_read());
        delivered.push_str(&sink.drain_since_last_read());
        sink.append("c", ReportFormat::Ok);
        delivered.push_str(&sink.drain_since_last_read());
        sink.append_line("d");
        sink.append_line("e");
        delivered.push_str(&sink.drain_since_last_read());

        assert_eq!(delivered, "a\nb\nc\nd\ne\n");
        assert_eq!(sink.snapshot_text(), delivered);
    }

    #[test]
    fn snapshot_does_not_move_cursor() {
        let sink = ReportSink::new();
        sink.append_line("kept");
        assert_eq!(sink.snapshot_text(), "kept\n");
        assert_eq!(sink.drain_since_last_read(), "kept\n");
    }

    #[test]
    fn append_error_adds_message_and_detail() {
        let sink = ReportSink::new();
        let details = ErrorDetails {
            origin: ErrorOrigin::Domain,
            kind: "conflict".to_string(),
            message: "conflict: resource locked".to_string(),
            detail: Some("/sites/default/index.html".to_string()),
        };
        sink.append_error(&details);

        let entries = sink.drain_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].format, ReportFormat::Error);
        assert!(entries[0].text.contains("conflict: resource locked"));
        assert_eq!(entries[1].format, ReportFormat::Note);
        assert!(sink.has_errors());
    }

    #[test]
    fn concurrent_writer_and_reader_lose_nothing() {
        let sink = Arc::new(ReportSink::new());
        let writer_sink = sink.clone();
        let writer = thread::spawn(move || {
            for index in 0..500 {
                writer_sink.append_line(format!("line {}", index));
            }
        });

        let mut delivered = String::new();
        while !writer.is_finished() {
            delivered.push_str(&sink.drain_since_last_read());
        }
        writer.join().expect("writer thread");
        delivered.push_str(&sink.drain_since_last_read());

        let expected: String = (0..500).map(|index| format!("line {}\n", index)).collect();
        assert_eq!(delivered, expected);
    }
}
