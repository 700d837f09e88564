// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Load-warning collector with dedupe and a bounded queue.
//!
//! Failures that do not abort a request (a sector that did not decode, a
//! portal into nothing, a failed reload) accumulate here and are surfaced as
//! one summary text instead of one report per request.

use std::collections::VecDeque;
use std::fmt;

/// One accumulated warning or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// File or logical source the problem belongs to.
    pub file_name: String,
    /// 1-based line, 0 when not applicable.
    pub line: usize,
    /// Human-readable message.
    pub message: String,
    /// Whether the problem prevented the load from completing.
    pub fatal: bool,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{} - {}", self.file_name, self.line, self.message)
        } else {
            write!(f, "{} - {}", self.file_name, self.message)
        }
    }
}

/// Bounded, deduplicating warning queue.
#[derive(Debug)]
pub struct LoadWarnings {
    queue: VecDeque<LoadWarning>,
    max: usize,
}

impl Default for LoadWarnings {
    fn default() -> Self {
        Self::new(256)
    }
}

impl LoadWarnings {
    /// Create a collector keeping at most `max` entries (oldest dropped first).
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
        }
    }

    /// Record a warning, ignoring exact duplicates already queued.
    pub fn push(&mut self, warning: LoadWarning) {
        if self.queue.contains(&warning) {
            return;
        }
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(warning);
    }

    /// Record a non-fatal problem.
    pub fn warn(&mut self, file_name: impl Into<String>, message: impl Into<String>) {
        self.push(LoadWarning {
            file_name: file_name.into(),
            line: 0,
            message: message.into(),
            fatal: false,
        });
    }

    /// Record a problem that prevented a load.
    pub fn error(&mut self, file_name: impl Into<String>, message: impl Into<String>) {
        self.push(LoadWarning {
            file_name: file_name.into(),
            line: 0,
            message: message.into(),
            fatal: true,
        });
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether any queued entry is fatal.
    pub fn has_fatal(&self) -> bool {
        self.queue.iter().any(|w| w.fatal)
    }

    /// Queued entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LoadWarning> {
        self.queue.iter()
    }

    /// Drop everything queued.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Summary text for `name`, or `None` when nothing is queued.
    ///
    /// Fatal entries come first under a "failed to load" header; otherwise the
    /// header reads "loaded with warnings".
    pub fn summary(&self, name: &str) -> Option<String> {
        if self.queue.is_empty() {
            return None;
        }
        let join = |fatal: bool| {
            self.queue
                .iter()
                .filter(|w| w.fatal == fatal)
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        };
        let fatal = join(true);
        let warning = join(false);
        Some(match (fatal.is_empty(), warning.is_empty()) {
            (false, false) => format!("{name} failed to load:\n\n{fatal}\n{warning}"),
            (false, true) => format!("{name} failed to load:\n\n{fatal}"),
            _ => format!("{name} loaded with warnings:\n\n{warning}"),
        })
    }

    /// Summary text for `name`, clearing the queue.
    pub fn take_summary(&mut self, name: &str) -> Option<String> {
        let summary = self.summary(name);
        self.clear();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_dropped() {
        let mut w = LoadWarnings::default();
        w.warn("SECBASE.LEV", "sector 3: bad adjoin");
        w.warn("SECBASE.LEV", "sector 3: bad adjoin");
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn oldest_entry_is_evicted_at_capacity() {
        let mut w = LoadWarnings::new(2);
        w.warn("a", "1");
        w.warn("a", "2");
        w.warn("a", "3");
        let messages: Vec<_> = w.iter().map(|x| x.message.as_str()).collect();
        assert_eq!(messages, vec!["2", "3"]);
    }

    #[test]
    fn summary_headers_follow_severity() {
        let mut w = LoadWarnings::default();
        assert_eq!(w.summary("X"), None);

        w.warn("X.LEV", "odd wall");
        assert_eq!(
            w.summary("X").as_deref(),
            Some("X loaded with warnings:\n\nX.LEV - odd wall")
        );

        w.push(LoadWarning {
            file_name: "X.O".into(),
            line: 12,
            message: "unreadable".into(),
            fatal: true,
        });
        assert_eq!(
            w.take_summary("X").as_deref(),
            Some("X failed to load:\n\nX.O:12 - unreadable\nX.LEV - odd wall")
        );
        assert!(w.is_empty());
    }

    #[test]
    fn fatal_only_summary_has_no_trailing_section() {
        let mut w = LoadWarnings::default();
        w.error("X.LEV", "missing");
        assert!(w.has_fatal());
        assert_eq!(
            w.summary("X").as_deref(),
            Some("X failed to load:\n\nX.LEV - missing")
        );
    }
}
