//! Canonical serialization
//!
//!     Writing is deterministic: sections come out in registry order, each as
//!     a `;;` header row, a dash divider, and fixed-width data rows whose
//!     column widths are computed per section from the widest cell. Record
//!     descriptions precede their row as `;` comment lines.
//!
//!     Sections with custom on-disk grammars (patterns, curves, transects,
//!     hydrographs, controls, ...) are packed in [`packers`].

pub mod packers;

use crate::inp::error::InpError;
use crate::inp::extract::InfiltrationKind;
use crate::inp::record::Record;
use crate::inp::schema::{
    Layout, SectionKind, SectionSchema, INFILTRATION_GREEN_AMPT, INFILTRATION_HORTON,
};

/// Separator between columns.
pub(crate) const SEP: &str = "   ";

/// Render one section, label line included. Empty sections render nothing.
pub fn render_section(
    schema: &'static SectionSchema,
    records: &[Record],
    infiltration: Option<InfiltrationKind>,
) -> Result<Option<String>, InpError> {
    if records.is_empty() {
        return Ok(None);
    }
    let body = match schema.layout {
        Layout::Table => render_table(schema, records, infiltration)?,
        Layout::KeyValue => packers::pack_keyvalue(schema, records),
        Layout::Custom => match schema.kind {
            SectionKind::Title => packers::pack_notes(records),
            SectionKind::Patterns => packers::pack_patterns(schema, records)?,
            SectionKind::Curves => packers::pack_curves(records),
            SectionKind::TimeSeries => packers::pack_timeseries(records),
            SectionKind::Profiles => packers::pack_profiles(records),
            SectionKind::Hydrographs => packers::pack_hydrographs(records),
            SectionKind::SnowPacks => packers::pack_snowpacks(schema, records),
            SectionKind::Controls => packers::pack_controls(records),
            SectionKind::Transects => packers::pack_transects(records),
            other => unreachable!("no packer for {:?}", other),
        },
    };
    Ok(Some(format!("{}\n{}", schema.label, body)))
}

/// The column set a table section writes: infiltration writes only the active
/// method's columns, every other section writes its full field table.
fn visible_fields(
    schema: &'static SectionSchema,
    infiltration: Option<InfiltrationKind>,
) -> Result<Vec<&'static str>, InpError> {
    if schema.kind != SectionKind::Infiltration {
        return Ok(schema.fields.iter().map(|f| f.name).collect());
    }
    let method = infiltration.ok_or_else(|| {
        InpError::format(
            schema.label,
            None,
            "cannot write infiltration lines without an INFILTRATION option",
        )
    })?;
    Ok(match method {
        InfiltrationKind::GreenAmpt => INFILTRATION_GREEN_AMPT.to_vec(),
        InfiltrationKind::Horton => INFILTRATION_HORTON.to_vec(),
    })
}

fn render_table(
    schema: &'static SectionSchema,
    records: &[Record],
    infiltration: Option<InfiltrationKind>,
) -> Result<String, InpError> {
    let names = visible_fields(schema, infiltration)?;
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| names.iter().map(|name| record.render(name)).collect())
        .collect();
    let widths = column_widths(&names, &rows);

    let mut out = String::new();
    push_header(&mut out, &names, &widths);
    let mut last_group: Option<String> = None;
    for (record, row) in records.iter().zip(&rows) {
        if let Some(field) = schema.group_field {
            let group = record.render(field);
            if last_group.is_some() && last_group.as_deref() != Some(group.as_str()) {
                out.push('\n');
            }
            last_group = Some(group);
        }
        push_description(&mut out, record, schema);
        push_row(&mut out, row, &widths, "");
    }
    Ok(out)
}

/// Per-column width: the widest of the column name and every cell.
pub(crate) fn column_widths(names: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            rows.iter()
                .map(|row| row.get(i).map_or(0, String::len))
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect()
}

pub(crate) fn push_header(out: &mut String, names: &[&str], widths: &[usize]) {
    let name_row: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    push_row(out, &name_row, widths, ";;");
    let dash_row: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(out, &dash_row, widths, ";;");
}

/// One fixed-width row: cells padded to their column width, trailing
/// whitespace trimmed. The first column carries two extra trailing spaces so
/// names stand apart from the data columns.
pub(crate) fn push_row(out: &mut String, cells: &[String], widths: &[usize], prefix: &str) {
    out.push_str(prefix);
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i > 0 {
            out.push_str(SEP);
        }
        out.push_str(cell);
        if i + 1 < cells.len() {
            for _ in cell.len()..*width {
                out.push(' ');
            }
            if i == 0 {
                out.push_str("  ");
            }
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out.push('\n');
}

/// Write a record's description as `;` comment lines before its row. Stored
/// `\n` escape sequences count as line breaks.
pub(crate) fn push_description(out: &mut String, record: &Record, schema: &SectionSchema) {
    if let Some(desc) = record.text(schema.desc_field) {
        for line in crate::inp::describe::unescape(desc).lines() {
            out.push(';');
            out.push_str(line);
            out.push('\n');
        }
    }
}

/// Sort key helper used by packers that group records: first-appearance order
/// of a field's value.
pub(crate) fn group_order<'a>(records: &'a [Record], field: &str) -> Vec<&'a str> {
    let mut order: Vec<&str> = Vec::new();
    for record in records {
        let value = record.text(field).unwrap_or_default();
        if !order.contains(&value) {
            order.push(value);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inp::schema;
    use crate::inp::value::Value;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut rec = Record::new();
        for (field, value) in pairs {
            rec.set(*field, value.clone());
        }
        rec
    }

    #[test]
    fn test_table_layout_and_widths() {
        let records = vec![
            record(&[
                ("Name", Value::text("J1")),
                ("InvertElevation", Value::Number(20.5)),
                ("MaxDepth", Value::Number(15.0)),
                ("InitDepth", Value::Number(0.0)),
                ("SurchargeDepth", Value::Number(0.0)),
                ("PondedArea", Value::Number(0.0)),
            ]),
            record(&[
                ("Name", Value::text("JUNCTION-22")),
                ("InvertElevation", Value::Number(18.0)),
                ("MaxDepth", Value::Number(15.0)),
                ("InitDepth", Value::Number(0.0)),
                ("SurchargeDepth", Value::Number(0.0)),
                ("PondedArea", Value::Number(0.0)),
            ]),
        ];
        let text = render_section(schema::schema(schema::SectionKind::Junctions), &records, None)
            .unwrap()
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[JUNCTIONS]");
        assert!(lines[1].starts_with(";;Name"));
        assert!(lines[2].starts_with(";;----"));
        // Both data rows align: the elevation column starts at the same offset.
        let col = lines[4].find("18").unwrap();
        assert_eq!(&lines[3][col..col + 4], "20.5");
        assert!(lines[3].starts_with("J1 "));
    }

    #[test]
    fn test_description_precedes_row() {
        let records = vec![record(&[
            ("Name", Value::text("J1")),
            ("InvertElevation", Value::Number(1.0)),
            ("Description", Value::text("two\nlines")),
        ])];
        let text = render_section(schema::schema(schema::SectionKind::Junctions), &records, None)
            .unwrap()
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[3], ";two");
        assert_eq!(lines[4], ";lines");
        assert!(lines[5].starts_with("J1"));
    }

    #[test]
    fn test_group_change_emits_blank_line() {
        let point = |link: &str, x: f64| {
            record(&[
                ("Link", Value::text(link)),
                ("XCoordinate", Value::Number(x)),
                ("YCoordinate", Value::Number(0.0)),
            ])
        };
        let records = vec![point("C1", 0.0), point("C1", 1.0), point("C2", 5.0)];
        let text = render_section(schema::schema(schema::SectionKind::Vertices), &records, None)
            .unwrap()
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[3].starts_with("C1"));
        assert!(lines[4].starts_with("C1"));
        assert_eq!(lines[5], "");
        assert!(lines[6].starts_with("C2"));
    }

    #[test]
    fn test_escaped_newlines_in_description_split_into_comment_lines() {
        let records = vec![record(&[
            ("Name", Value::text("J1")),
            ("InvertElevation", Value::Number(1.0)),
            ("Description", Value::text("two\\nlines")),
        ])];
        let text = render_section(schema::schema(schema::SectionKind::Junctions), &records, None)
            .unwrap()
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[3], ";two");
        assert_eq!(lines[4], ";lines");
    }

    #[test]
    fn test_empty_section_renders_nothing() {
        let none = render_section(schema::schema(schema::SectionKind::Junctions), &[], None).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_infiltration_writes_active_columns_only() {
        let records = vec![record(&[
            ("Name", Value::text("S1")),
            ("MaxRate", Value::Number(3.0)),
            ("MinRate", Value::Number(0.5)),
            ("Decay", Value::Number(4.0)),
            ("DryTime", Value::Number(7.0)),
            ("MaxInfil", Value::Number(0.0)),
        ])];
        let text = render_section(
            schema::schema(schema::SectionKind::Infiltration),
            &records,
            Some(InfiltrationKind::Horton),
        )
        .unwrap()
        .unwrap();
        assert!(text.contains("MaxRate"));
        assert!(!text.contains("SuctionHead"));
    }
}
