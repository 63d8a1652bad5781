//! Document model
//!
//!     A `Document` is the parsed form of one INP file: a store of extracted
//!     records keyed by section, plus the support-file manifest and whatever
//!     section labels went unrecognized. Reading happens in two passes
//!     (locate, then extract per section); the merged entity views are
//!     computed on demand so the store always holds what the file said.
//!
//!     Writing is canonical: sections in registry order, deterministic
//!     fixed-width layout, descriptions as comment lines. Reading back a
//!     written document yields the same records.

use std::fs;
use std::path::Path;

use crate::inp::error::InpError;
use crate::inp::extract::{Extractor, InfiltrationKind, Recovery};
use crate::inp::locate::SectionIndex;
use crate::inp::merge::{self, Store};
use crate::inp::record::Record;
use crate::inp::render;
use crate::inp::schema::{self, SectionKind, COMPOSITES, SCHEMAS};
use crate::inp::support::{self, SupportFiles};

/// Whether referenced support files must resolve at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupportFilePolicy {
    /// References are kept verbatim and never touched.
    #[default]
    Off,
    /// Every reference is resolved, fingerprinted and normalized; a missing
    /// file fails the load.
    Required,
}

/// Load-time behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub recovery: Recovery,
    pub support_files: SupportFilePolicy,
    /// Merge subclass sections onto their primaries in `get_elements`.
    pub subclass_merge: bool,
    /// Merge composite groups into one entity per identity in `get_elements`.
    pub composite_merge: bool,
}

impl Default for LoadOptions {
    fn default() -> LoadOptions {
        LoadOptions {
            recovery: Recovery::Strict,
            support_files: SupportFilePolicy::Off,
            subclass_merge: true,
            composite_merge: true,
        }
    }
}

/// One parsed INP document.
#[derive(Debug, Default)]
pub struct Document {
    store: Store,
    support: SupportFiles,
    unmatched: Vec<String>,
    options: LoadOptions,
}

impl Document {
    /// An empty document, ready for `add_elements`.
    pub fn new() -> Document {
        Document::default()
    }

    /// Read and parse a file; support files resolve relative to its directory.
    pub fn load(path: impl AsRef<Path>, options: LoadOptions) -> Result<Document, InpError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let base_dir = path.parent().map(Path::to_path_buf);
        Document::parse(&text, base_dir.as_deref(), options)
    }

    /// Parse document text.
    pub fn parse(
        text: &str,
        base_dir: Option<&Path>,
        options: LoadOptions,
    ) -> Result<Document, InpError> {
        // Non-breaking spaces show up in hand-edited files and would otherwise
        // glue two tokens together.
        let text = text.replace('\u{a0}', " ");
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let index = SectionIndex::build(&lines);

        // The options section decides the infiltration column set, so it is
        // extracted ahead of everything else.
        let mut store = Store::new();
        let mut infiltration = None;
        if let Some(range) = index.range(SectionKind::Options) {
            let extractor = Extractor {
                lines: &lines[range.clone()],
                base: range.start,
                recovery: options.recovery,
                infiltration: None,
            };
            let records = extractor.extract(schema::schema(SectionKind::Options))?;
            if let Some(record) = records.first() {
                if let Some(method) = record.text("INFILTRATION") {
                    infiltration = Some(InfiltrationKind::from_option(method)?);
                }
            }
            store.insert(SectionKind::Options, records);
        }

        for kind in index.kinds() {
            if kind == SectionKind::Options {
                continue;
            }
            let range = index.range(kind).expect("indexed section has a range");
            let extractor = Extractor {
                lines: &lines[range.clone()],
                base: range.start,
                recovery: options.recovery,
                infiltration,
            };
            store.insert(kind, extractor.extract(schema::schema(kind))?);
        }

        let support = match options.support_files {
            SupportFilePolicy::Off => SupportFiles::default(),
            SupportFilePolicy::Required => support::resolve(&mut store, base_dir)?,
        };

        Ok(Document {
            store,
            support,
            unmatched: index.unmatched_labels().to_vec(),
            options,
        })
    }

    /// The merged entity view of a section.
    ///
    /// Primaries gain their subclass fields, and the composite pseudo-section
    /// folds its members together, unless the corresponding merge was turned
    /// off at load time (in which case raw records come back).
    pub fn get_elements(&self, kind: SectionKind) -> Result<Vec<Record>, InpError> {
        if let Some(spec) = COMPOSITES.iter().find(|c| c.output == kind) {
            if !self.options.composite_merge {
                let mut all = Vec::new();
                for member in spec.members {
                    all.extend(self.raw(*member).iter().cloned());
                }
                return Ok(all);
            }
            return merge::merge_composite(spec, &self.store);
        }
        let section = schema::schema(kind);
        if section.joins.is_empty() || !self.options.subclass_merge {
            return Ok(self.raw(kind).to_vec());
        }
        merge::join_subclasses(section, self.raw(kind), &self.store)
    }

    /// `get_elements` addressed by element-class name.
    pub fn get_elements_by_name(&self, name: &str) -> Result<Vec<Record>, InpError> {
        let kind = SectionKind::from_name(name)
            .ok_or_else(|| InpError::UnknownElementClass(name.to_string()))?;
        self.get_elements(kind)
    }

    /// Add merged entities to the document, splitting them across the primary
    /// section and its subclass or composite member sections.
    pub fn add_elements(&mut self, kind: SectionKind, entities: &[Record]) {
        if let Some(spec) = COMPOSITES.iter().find(|c| c.output == kind) {
            for (member, records) in merge::split_composite(spec, entities) {
                self.store.entry(member).or_default().extend(records);
            }
            return;
        }
        let section = schema::schema(kind);
        if section.joins.is_empty() {
            self.store
                .entry(kind)
                .or_default()
                .extend(entities.iter().cloned());
            return;
        }
        let split = merge::split_subclasses(section, entities);
        self.store.entry(kind).or_default().extend(split.primary);
        for (secondary, records) in split.secondaries {
            self.store.entry(secondary).or_default().extend(records);
        }
    }

    /// Serialize to canonical text: sections in registry order, skipping the
    /// composite pseudo-section and anything empty.
    pub fn get_text(&self) -> Result<String, InpError> {
        let infiltration = self.infiltration()?;
        let mut sections = Vec::new();
        for section in SCHEMAS {
            if !section.label.starts_with('[') {
                continue;
            }
            let records = self.raw(section.kind);
            if let Some(text) = render::render_section(section, records, infiltration)? {
                sections.push(text);
            }
        }
        Ok(sections.join("\n"))
    }

    /// Write canonical text to a file.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), InpError> {
        fs::write(path.as_ref(), self.get_text()?)?;
        Ok(())
    }

    /// Support files referenced by the document, with content fingerprints.
    pub fn support_files(&self) -> &SupportFiles {
        &self.support
    }

    /// Section labels present in the source that matched no known grammar.
    pub fn unmatched_labels(&self) -> &[String] {
        &self.unmatched
    }

    /// Sections with at least one record, in canonical order.
    pub fn section_kinds(&self) -> Vec<SectionKind> {
        SCHEMAS
            .iter()
            .map(|s| s.kind)
            .filter(|kind| !self.raw(*kind).is_empty())
            .collect()
    }

    /// Raw extracted records of a section, unmerged.
    pub fn raw(&self, kind: SectionKind) -> &[Record] {
        self.store.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The document's active infiltration method, from its options.
    fn infiltration(&self) -> Result<Option<InfiltrationKind>, InpError> {
        let Some(record) = self.raw(SectionKind::Options).first() else {
            return Ok(None);
        };
        match record.text("INFILTRATION") {
            Some(method) => Ok(Some(InfiltrationKind::from_option(method)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "\
[OPTIONS]
FLOW_UNITS     CFS
INFILTRATION   HORTON

[JUNCTIONS]
;;Name  Elev  MaxD  InitD  SurD  Apond
;;----  ----  ----  -----  ----  -----
J1      20.5  15    0      0     0

[COORDINATES]
J1  10  20

[TAGS]
Node  J1  basin-a
";

    #[test]
    fn test_parse_and_merged_view() {
        let doc = Document::parse(SMALL, None, LoadOptions::default()).unwrap();
        let junctions = doc.get_elements(SectionKind::Junctions).unwrap();
        assert_eq!(junctions.len(), 1);
        assert_eq!(junctions[0].number("XCoordinate"), Some(10.0));
        assert_eq!(junctions[0].text("Tag"), Some("basin-a"));
    }

    #[test]
    fn test_merge_can_be_disabled() {
        let options = LoadOptions {
            subclass_merge: false,
            ..LoadOptions::default()
        };
        let doc = Document::parse(SMALL, None, options).unwrap();
        let junctions = doc.get_elements(SectionKind::Junctions).unwrap();
        assert!(!junctions[0].contains("XCoordinate"));
    }

    #[test]
    fn test_written_text_parses_back() {
        let doc = Document::parse(SMALL, None, LoadOptions::default()).unwrap();
        let text = doc.get_text().unwrap();
        let again = Document::parse(&text, None, LoadOptions::default()).unwrap();
        assert_eq!(
            doc.get_elements(SectionKind::Junctions).unwrap(),
            again.get_elements(SectionKind::Junctions).unwrap()
        );
    }

    #[test]
    fn test_add_elements_splits_subclasses() {
        let mut doc = Document::new();
        let mut entity = Record::new();
        entity.set("Name", crate::inp::value::Value::text("J9"));
        entity.set("InvertElevation", crate::inp::value::Value::Number(5.0));
        entity.set("XCoordinate", crate::inp::value::Value::Number(1.0));
        entity.set("YCoordinate", crate::inp::value::Value::Number(2.0));
        doc.add_elements(SectionKind::Junctions, &[entity]);
        assert_eq!(doc.raw(SectionKind::Junctions).len(), 1);
        assert_eq!(doc.raw(SectionKind::Coordinates).len(), 1);
        assert!(!doc.raw(SectionKind::Junctions)[0].contains("XCoordinate"));
    }

    #[test]
    fn test_section_kinds_follow_canonical_order() {
        let doc = Document::parse(SMALL, None, LoadOptions::default()).unwrap();
        assert_eq!(
            doc.section_kinds(),
            vec![
                SectionKind::Options,
                SectionKind::Junctions,
                SectionKind::Coordinates,
                SectionKind::Tags,
            ]
        );
    }

    #[test]
    fn test_unknown_element_class() {
        let doc = Document::new();
        let err = doc.get_elements_by_name("Pipes").unwrap_err();
        assert!(matches!(err, InpError::UnknownElementClass(_)));
    }

    #[test]
    fn test_nonbreaking_spaces_are_token_separators() {
        let text = "[JUNCTIONS]\nJ1\u{a0}20.5\u{a0}15 0 0 0\n";
        let doc = Document::parse(text, None, LoadOptions::default()).unwrap();
        assert_eq!(doc.raw(SectionKind::Junctions)[0].number("MaxDepth"), Some(15.0));
    }
}
