//! Section location pass
//!
//!     The first pass over a document's lines finds every `[LABEL]` line,
//!     matches it against the registry, and records the half-open body range of
//!     each section (the lines between one label and the next). Matching is
//!     tolerant by design: comparison uses the first five significant characters
//!     of the label, case-insensitively, so `[TREATMENTS]` finds the
//!     `[TREATMENT]` grammar.
//!
//!     Unmatched labels are retained, not rejected — their bodies are simply
//!     skipped, and the caller can inspect what was ignored.

use std::collections::HashMap;
use std::ops::Range;

use crate::inp::schema::{self, SectionKind};

/// Where each recognized section's body sits in the document's line vector.
#[derive(Debug, Clone, Default)]
pub struct SectionIndex {
    ranges: HashMap<SectionKind, Range<usize>>,
    /// Recognized kinds in the order their labels appeared.
    order: Vec<SectionKind>,
    /// Label lines that matched no schema, verbatim.
    unmatched: Vec<String>,
}

impl SectionIndex {
    /// Scan `lines` for section labels and compute body ranges.
    ///
    /// A duplicated label keeps only its last occurrence: the earlier body is
    /// dropped from the index, matching last-wins semantics for repeated
    /// sections.
    pub fn build(lines: &[String]) -> SectionIndex {
        let mut index = SectionIndex::default();
        let mut open: Option<(SectionKind, usize)> = None;

        for (lineno, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if !trimmed.starts_with('[') {
                continue;
            }
            if let Some((kind, start)) = open.take() {
                index.close(kind, start..lineno);
            }
            match schema::match_label(trimmed) {
                Some(kind) => open = Some((kind, lineno + 1)),
                None => index.unmatched.push(trimmed.to_string()),
            }
        }
        if let Some((kind, start)) = open {
            index.close(kind, start..lines.len());
        }
        index
    }

    fn close(&mut self, kind: SectionKind, range: Range<usize>) {
        if self.ranges.insert(kind, range).is_none() {
            self.order.push(kind);
        }
    }

    /// Body range of a section, when the document contains it.
    pub fn range(&self, kind: SectionKind) -> Option<Range<usize>> {
        self.ranges.get(&kind).cloned()
    }

    /// Recognized sections in order of appearance.
    pub fn kinds(&self) -> impl Iterator<Item = SectionKind> + '_ {
        self.order.iter().copied()
    }

    /// Labels present in the document that matched no known grammar.
    pub fn unmatched_labels(&self) -> &[String] {
        &self.unmatched
    }
}
