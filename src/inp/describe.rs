//! Description comment handling
//!
//!     Comment lines (`;`) preceding a data line become that record's
//!     description; runs of comment lines join with newlines. Header rows
//!     (`;;`) are only headers at the top of a section, before any data or
//!     single-`;` comment line; after that, a `;;` line is an ordinary
//!     comment. The buffer here scopes that state per section, so no
//!     cross-section leakage is possible.
//!
//!     Data lines may also carry a trailing comment after their tokens; it is
//!     split off before tokenization and attached to the same record.

use once_cell::sync::Lazy;
use regex::Regex;

/// Accumulates comment lines until the next data line claims them.
#[derive(Debug, Default)]
pub struct DescriptionBuffer {
    parts: Vec<String>,
    past_header: bool,
}

impl DescriptionBuffer {
    pub fn new() -> DescriptionBuffer {
        DescriptionBuffer::default()
    }

    /// Feed a comment line. Returns `false` when the line was a header row
    /// (still in the section's header block) and was discarded.
    pub fn push_comment(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start();
        if !self.past_header && trimmed.starts_with(";;") {
            return false;
        }
        // An accepted comment ends the header block just like a data line.
        self.past_header = true;
        let body = trimmed
            .trim_start_matches(';')
            .trim()
            .trim_end_matches(';')
            .trim();
        self.parts.push(body.to_string());
        true
    }

    /// A data line was seen; header rows are no longer recognized.
    pub fn mark_data_seen(&mut self) {
        self.past_header = true;
    }

    /// Take the accumulated description, if any, clearing the buffer.
    pub fn take(&mut self) -> Option<String> {
        if self.parts.is_empty() {
            return None;
        }
        let text = self.parts.join("\n");
        self.parts.clear();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

static TRAILING_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ ;]*;").unwrap());

/// Split a data line into its token text and an optional trailing comment.
///
/// The separator swallows any run of spaces and semicolons up to and
/// including the first semicolon, so `J1  1  2  ;; note` yields `("J1  1  2",
/// "note")`.
pub fn split_trailing_comment(line: &str) -> (&str, Option<&str>) {
    match TRAILING_COMMENT.find(line) {
        Some(m) => {
            let comment = line[m.end()..].trim();
            let data = &line[..m.start()];
            (data, if comment.is_empty() { None } else { Some(comment) })
        }
        None => (line, None),
    }
}

/// Escape a description for single-line storage: literal newlines become
/// `\n` escape sequences.
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Inverse of [`escape`].
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
