//! Line-to-record extraction
//!
//!     The second pass turns each located section body into records, driven by
//!     the section's schema. Plain tables go through the generic extractor in
//!     this module; marker-driven token shapes are resolved in [`shapes`],
//!     grouped point sections in [`groups`], multi-line block grammars in
//!     [`blocks`], and parameter/value sections in [`keyvalue`].
//!
//!     Extraction is strict by default: a line whose token shape matches no
//!     declared variant is an error naming the section and line number. In
//!     tolerant mode two specific deviations are recovered instead — missing
//!     trailing columns parse as nulls, and excess trailing tokens that are
//!     all non-numeric become the record's description.

pub mod blocks;
pub mod groups;
pub mod keyvalue;
pub mod shapes;

use std::collections::HashMap;

use crate::inp::describe::{split_trailing_comment, unescape, DescriptionBuffer};
use crate::inp::error::InpError;
use crate::inp::record::{Record, NAME, ORDINAL};
use crate::inp::schema::{IdentityRule, Layout, SectionKind, SectionSchema};
use crate::inp::value::Value;

/// How lines that don't fit any declared shape are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recovery {
    #[default]
    Strict,
    Tolerant,
}

/// Which infiltration column set is active, per the document's
/// `INFILTRATION` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfiltrationKind {
    GreenAmpt,
    Horton,
}

impl InfiltrationKind {
    /// Resolve the `INFILTRATION` option value; variants such as
    /// `MODIFIED_HORTON` select the same column set as their base method.
    pub fn from_option(value: &str) -> Result<InfiltrationKind, InpError> {
        let upper = value.to_ascii_uppercase();
        if upper.contains("HORTON") {
            Ok(InfiltrationKind::Horton)
        } else if upper.contains("GREEN") {
            Ok(InfiltrationKind::GreenAmpt)
        } else {
            Err(InpError::format(
                "[OPTIONS]",
                None,
                format!("unrecognized INFILTRATION method '{}'", value),
            ))
        }
    }
}

/// Per-section extraction context: the body lines, their absolute offset for
/// error reporting, and document-level extraction state.
pub struct Extractor<'a> {
    pub lines: &'a [String],
    pub base: usize,
    pub recovery: Recovery,
    pub infiltration: Option<InfiltrationKind>,
}

impl<'a> Extractor<'a> {
    /// Extract one section's records.
    pub fn extract(&self, schema: &'static SectionSchema) -> Result<Vec<Record>, InpError> {
        match schema.layout {
            Layout::Table => self.extract_table(schema),
            Layout::KeyValue => keyvalue::extract(self, schema),
            Layout::Custom => match schema.kind {
                SectionKind::Title => Ok(groups::extract_notes(self)),
                SectionKind::Patterns => groups::extract_patterns(self, schema),
                SectionKind::Curves => groups::extract_curves(self, schema),
                SectionKind::TimeSeries => groups::extract_timeseries(self, schema),
                SectionKind::Profiles => groups::extract_profiles(self, schema),
                SectionKind::Hydrographs => blocks::extract_hydrographs(self, schema),
                SectionKind::SnowPacks => blocks::extract_snowpacks(self, schema),
                SectionKind::Controls => blocks::extract_controls(self, schema),
                SectionKind::Transects => blocks::extract_transects(self, schema),
                other => unreachable!("no custom extractor for {:?}", other),
            },
        }
    }

    /// Generic fixed-width table extraction.
    fn extract_table(&self, schema: &'static SectionSchema) -> Result<Vec<Record>, InpError> {
        let mut records = Vec::new();
        let mut buffer = DescriptionBuffer::new();
        let mut seen: HashMap<String, ()> = HashMap::new();
        let mut group: Option<String> = None;
        let mut ordinal: i64 = 0;

        for (offset, raw) in self.lines.iter().enumerate() {
            let lineno = self.base + offset + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with(';') {
                if schema.descriptions {
                    buffer.push_comment(line);
                }
                continue;
            }
            buffer.mark_data_seen();

            let (data, trailing) = split_trailing_comment(line);
            let tokens = tokenize(data, schema.max_splits);
            if tokens.is_empty() {
                continue;
            }

            let shaped = shapes::apply(schema, &tokens, self, lineno)?;
            let mut record = Record::new();
            for (field, cell) in schema.fields.iter().zip(shaped.cells.iter()) {
                if let Some(token) = cell {
                    let value = field.ty.parse(token).map_err(|reason| {
                        InpError::format(schema.label, Some(lineno), reason)
                    })?;
                    record.set(field.name, value);
                }
            }

            if schema.descriptions {
                if let Some(comment) = trailing {
                    // Trailing comments are one physical line; `\n` escapes let
                    // them carry multi-line text.
                    buffer.mark_data_seen();
                    buffer.push_comment(&format!(";{}", unescape(comment)));
                }
                if let Some(extra) = shaped.recovered {
                    buffer.push_comment(&format!(";{}", extra));
                }
                if let Some(desc) = buffer.take() {
                    record.set(schema.desc_field, Value::text(desc));
                }
            }

            self.assign_identity(schema, &mut record, &mut group, &mut ordinal);
            if let SectionKind::Files = schema.kind {
                ordinal += 1;
                let name = format!(
                    "{}:{}:{}",
                    record.render("Usage"),
                    record.render("FileType"),
                    ordinal
                );
                record.set(ORDINAL, Value::Int(ordinal));
                record.set(NAME, Value::text(name));
            }

            if let Some(identity) = identity_of(schema, &record) {
                if seen.insert(identity.clone(), ()).is_some() {
                    return Err(InpError::format(
                        schema.label,
                        Some(lineno),
                        format!("duplicate identity '{}'", identity),
                    ));
                }
            }
            records.push(record);
        }
        Ok(records)
    }

    fn assign_identity(
        &self,
        schema: &SectionSchema,
        record: &mut Record,
        group: &mut Option<String>,
        ordinal: &mut i64,
    ) {
        match schema.identity {
            IdentityRule::Field(_) => {
                // Identity is the field's own value; nothing to synthesize.
            }
            IdentityRule::Joined(fields) => {
                // Sections that already carry a `Name` column (tags) keep it;
                // their joined identity is only used for duplicate detection.
                if crate::inp::schema::field_index(schema, NAME).is_none() {
                    let name = fields
                        .iter()
                        .map(|f| record.render(f))
                        .collect::<Vec<_>>()
                        .join(":");
                    record.set(NAME, Value::text(name));
                }
            }
            IdentityRule::GroupOrdinal => {
                let field = schema.group_field.unwrap_or(NAME);
                let current = record.render(field);
                if group.as_deref() != Some(current.as_str()) {
                    *group = Some(current.clone());
                    *ordinal = 0;
                }
                *ordinal += 1;
                record.set(ORDINAL, Value::Int(*ordinal));
                record.set(NAME, Value::text(format!("{}:{}", current, ordinal)));
            }
            IdentityRule::None => {}
        }
    }
}

/// The identity string used for duplicate detection, when the schema has one.
fn identity_of(schema: &SectionSchema, record: &Record) -> Option<String> {
    match schema.identity {
        IdentityRule::Field(field) => record.text(field).map(str::to_string),
        IdentityRule::Joined(fields) => Some(
            fields
                .iter()
                .map(|f| record.render(f))
                .collect::<Vec<_>>()
                .join(":"),
        ),
        IdentityRule::GroupOrdinal | IdentityRule::None => None,
    }
}

/// Split a data line on whitespace runs. With `max_splits = Some(n)` at most
/// `n + 1` tokens come back and the final token keeps its interior spacing
/// (formulas, pattern lists, file paths).
pub fn tokenize(data: &str, max_splits: Option<usize>) -> Vec<String> {
    match max_splits {
        None => data.split_whitespace().map(str::to_string).collect(),
        Some(n) => {
            let mut tokens = Vec::with_capacity(n + 1);
            let mut rest = data.trim();
            for _ in 0..n {
                if rest.is_empty() {
                    break;
                }
                match rest.find(char::is_whitespace) {
                    Some(pos) => {
                        tokens.push(rest[..pos].to_string());
                        rest = rest[pos..].trim_start();
                    }
                    None => {
                        tokens.push(rest.to_string());
                        rest = "";
                    }
                }
            }
            if !rest.is_empty() {
                tokens.push(rest.trim_end().to_string());
            }
            tokens
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inp::schema::{self, SectionKind};

    fn extract(kind: SectionKind, body: &str, recovery: Recovery) -> Result<Vec<Record>, InpError> {
        let lines: Vec<String> = body.lines().map(str::to_string).collect();
        let extractor = Extractor {
            lines: &lines,
            base: 0,
            recovery,
            infiltration: Some(InfiltrationKind::Horton),
        };
        extractor.extract(schema::schema(kind))
    }

    #[test]
    fn test_plain_table_line() {
        let records = extract(
            SectionKind::Junctions,
            ";;Name  Elev  MaxD  InitD  SurD  Apond\n\
             ;;----  ----  ----  -----  ----  -----\n\
             J1      20.5  15    0      0     0",
            Recovery::Strict,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("Name"), Some("J1"));
        assert_eq!(records[0].number("InvertElevation"), Some(20.5));
        assert!(!records[0].contains("Description"));
    }

    #[test]
    fn test_description_and_trailing_comment_attach() {
        let records = extract(
            SectionKind::Junctions,
            "; upstream junction\nJ1  20.5  15  0  0  0  ; by the weir",
            Recovery::Strict,
        )
        .unwrap();
        assert_eq!(
            records[0].text("Description"),
            Some("upstream junction\nby the weir")
        );
    }

    #[test]
    fn test_double_semicolon_comment_after_plain_comment_is_kept() {
        let records = extract(
            SectionKind::Junctions,
            "; upstream junction\n;; relined in 2004\nJ1  20.5  15  0  0  0",
            Recovery::Strict,
        )
        .unwrap();
        assert_eq!(
            records[0].text("Description"),
            Some("upstream junction\nrelined in 2004")
        );
    }

    #[test]
    fn test_escaped_newline_in_trailing_comment_decodes() {
        let records = extract(
            SectionKind::Junctions,
            "J1  20.5  15  0  0  0  ; built 1987\\nrelined 2004",
            Recovery::Strict,
        )
        .unwrap();
        assert_eq!(
            records[0].text("Description"),
            Some("built 1987\nrelined 2004")
        );
    }

    #[test]
    fn test_strict_rejects_short_line() {
        let err = extract(SectionKind::Junctions, "J1  20.5  15", Recovery::Strict).unwrap_err();
        assert!(matches!(err, InpError::Format { .. }));
    }

    #[test]
    fn test_tolerant_pads_short_line() {
        let records =
            extract(SectionKind::Junctions, "J1  20.5  15", Recovery::Tolerant).unwrap();
        assert_eq!(records[0].number("MaxDepth"), Some(15.0));
        assert!(!records[0].contains("InitDepth"));
    }

    #[test]
    fn test_tolerant_recovers_unmarked_comment() {
        let records = extract(
            SectionKind::Junctions,
            "J1  20.5  15  0  0  0  north outfall basin",
            Recovery::Tolerant,
        )
        .unwrap();
        assert_eq!(records[0].text("Description"), Some("north outfall basin"));
    }

    #[test]
    fn test_duplicate_identity_is_an_error() {
        let err = extract(
            SectionKind::Junctions,
            "J1  1  2  0  0  0\nJ1  3  4  0  0  0",
            Recovery::Strict,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate identity"));
    }

    #[test]
    fn test_group_ordinal_resets_per_group() {
        let records = extract(
            SectionKind::Vertices,
            "C1  0  0\nC1  1  1\nC2  5  5",
            Recovery::Strict,
        )
        .unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name().unwrap()).collect();
        assert_eq!(names, vec!["C1:1", "C1:2", "C2:1"]);
    }

    #[test]
    fn test_files_identity_includes_ordinal() {
        let records = extract(
            SectionKind::Files,
            "USE  RAINFALL  rain.dat\nSAVE  OUTFLOWS  out flows.txt",
            Recovery::Strict,
        )
        .unwrap();
        assert_eq!(records[0].name(), Some("USE:RAINFALL:1"));
        assert_eq!(records[1].name(), Some("SAVE:OUTFLOWS:2"));
        assert_eq!(records[1].text("FileName"), Some("out flows.txt"));
    }

    #[test]
    fn test_capped_tokenize_keeps_interior_spacing() {
        assert_eq!(
            tokenize("N1  TSS  C * R / (0.5 + R)", Some(2)),
            vec!["N1", "TSS", "C * R / (0.5 + R)"]
        );
        assert_eq!(tokenize("a b c", None), vec!["a", "b", "c"]);
    }
}
