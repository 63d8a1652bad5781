//! Custom section packers
//!
//!     Inverse of the custom extractors: grouped point records fold back into
//!     header-plus-continuation runs, block records back into their multi-line
//!     grammars, and key/value records back into parameter lines. Each packer
//!     reproduces the canonical shape the matching extractor accepts, so a
//!     write/read cycle is the identity.

use crate::inp::describe::unescape;
use crate::inp::error::InpError;
use crate::inp::extract::blocks::{RAIN_GAGE, RAIN_GAGE_DESCRIPTION};
use crate::inp::record::Record;
use crate::inp::render::{column_widths, group_order, push_header, push_row, SEP};
use crate::inp::schema::{SectionKind, SectionSchema, SNOWPACK_SLICES};

const MONTH_ORDER: [&str; 13] = [
    "ALL", "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

const RESPONSE_ORDER: [&str; 3] = ["SHORT", "MEDIUM", "LONG"];

fn push_comment_lines(out: &mut String, text: &str) {
    for line in unescape(text).lines() {
        out.push(';');
        out.push_str(line);
        out.push('\n');
    }
}

fn record_desc<'a>(record: &'a Record, schema: &SectionSchema) -> Option<&'a str> {
    record.text(schema.desc_field)
}

/// Options, report, map and evaporation: one parameter line per set field,
/// parameter names padded to a shared width.
pub fn pack_keyvalue(schema: &'static SectionSchema, records: &[Record]) -> String {
    let record = &records[0];
    let mut out = String::new();
    match schema.kind {
        SectionKind::Map => {
            if record.contains("LLXCoordinate") {
                out.push_str(&format!(
                    "DIMENSIONS  {}  {}  {}  {}\n",
                    record.render("LLXCoordinate"),
                    record.render("LLYCoordinate"),
                    record.render("URXCoordinate"),
                    record.render("URYCoordinate"),
                ));
            }
            if record.contains("Units") {
                out.push_str(&format!("UNITS       {}\n", record.render("Units")));
            }
        }
        SectionKind::Evaporation => {
            if let Some(kind) = record.text("Type") {
                out.push_str(kind);
                if let Some(params) = record.text("Parameters") {
                    out.push_str("  ");
                    out.push_str(params);
                }
                out.push('\n');
            }
            if let Some(recovery) = record.text("Recovery") {
                out.push_str(&format!("RECOVERY  {}\n", recovery));
            }
            if let Some(dry_only) = record.text("DryOnly") {
                out.push_str(&format!("DRY_ONLY  {}\n", dry_only));
            }
        }
        _ => {
            let present: Vec<&str> = schema
                .fields
                .iter()
                .map(|f| f.name)
                .filter(|name| record.contains(name))
                .collect();
            let width = present.iter().map(|n| n.len()).max().unwrap_or(0);
            for name in present {
                out.push_str(name);
                for _ in name.len()..width {
                    out.push(' ');
                }
                out.push_str(SEP);
                out.push_str(&record.render(name));
                out.push('\n');
            }
        }
    }
    out
}

/// Free-text notes come back out verbatim.
pub fn pack_notes(records: &[Record]) -> String {
    let mut out = records[0].render("NotesText");
    out.push('\n');
    out
}

/// Values per pattern and values per output row for each cycle type.
fn pattern_layout(pattern_type: &str) -> Option<(usize, usize)> {
    match pattern_type.to_ascii_uppercase().as_str() {
        "MONTHLY" => Some((12, 6)),
        "DAILY" => Some((7, 7)),
        "HOURLY" => Some((24, 6)),
        "WEEKEND" => Some((24, 6)),
        _ => None,
    }
}

pub fn pack_patterns(
    schema: &'static SectionSchema,
    records: &[Record],
) -> Result<String, InpError> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut descs: Vec<Option<String>> = Vec::new();

    for pattern in group_order(records, "Pattern") {
        let points: Vec<&Record> = records
            .iter()
            .filter(|r| r.text("Pattern") == Some(pattern))
            .collect();
        let pattern_type = points[0].render("Type");
        let per_row = match pattern_layout(&pattern_type) {
            Some((total, per_row)) => {
                if points.len() != total {
                    return Err(InpError::format(
                        schema.label,
                        None,
                        format!(
                            "{} pattern '{}' has {} values, expected {}",
                            pattern_type,
                            pattern,
                            points.len(),
                            total
                        ),
                    ));
                }
                per_row
            }
            None => 6,
        };
        for (i, chunk) in points.chunks(per_row).enumerate() {
            let mut row = vec![pattern.to_string()];
            // The cycle type appears on the first row of a pattern only.
            row.push(if i == 0 {
                pattern_type.clone()
            } else {
                String::new()
            });
            row.extend(chunk.iter().map(|p| p.render("Multiplier")));
            // Comments ride with the row holding the point they precede.
            let chunk_descs: Vec<&str> = chunk
                .iter()
                .filter_map(|p| p.text(schema.desc_field))
                .collect();
            descs.push(if chunk_descs.is_empty() {
                None
            } else {
                Some(chunk_descs.join("\n"))
            });
            rows.push(row);
        }
    }

    // Width table covers the widest row; multiplier columns are unlabeled.
    let max_cols = rows.iter().map(Vec::len).max().unwrap_or(3);
    let mut names: Vec<&str> = vec!["Pattern", "Type", "Multipliers"];
    names.resize(max_cols.max(names.len()), "");
    let widths = column_widths(&names, &rows);
    let mut out = String::new();
    push_header(&mut out, &names, &widths);
    for (row, desc) in rows.iter().zip(&descs) {
        if let Some(desc) = desc {
            push_comment_lines(&mut out, desc);
        }
        push_row(&mut out, row, &widths, "");
    }
    Ok(out)
}

pub fn pack_curves(records: &[Record]) -> String {
    let names = ["Curve", "Type", "XCoordinate", "YCoordinate"];
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.render("Curve"),
                String::new(),
                r.render("XCoordinate"),
                r.render("YCoordinate"),
            ]
        })
        .collect();
    let mut typed_rows = rows;
    // The curve type appears on the first row of each curve only.
    let mut last_curve: Option<String> = None;
    for (record, row) in records.iter().zip(typed_rows.iter_mut()) {
        let curve = record.render("Curve");
        if last_curve.as_deref() != Some(curve.as_str()) {
            row[1] = record.render("Type");
            last_curve = Some(curve);
        }
    }
    let widths = column_widths(&names, &typed_rows);

    let mut out = String::new();
    push_header(&mut out, &names, &widths);
    let mut last: Option<String> = None;
    for (record, row) in records.iter().zip(&typed_rows) {
        let curve = record.render("Curve");
        if last.is_some() && last.as_deref() != Some(curve.as_str()) {
            out.push('\n');
        }
        if let Some(desc) = record.text("Description") {
            push_comment_lines(&mut out, desc);
        }
        push_row(&mut out, row, &widths, "");
        last = Some(curve);
    }
    out
}

pub fn pack_timeseries(records: &[Record]) -> String {
    let names = ["TimeSeries", "Date", "Time", "Value"];
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            if r.contains("FileName") {
                vec![r.render("TimeSeries"), "FILE".to_string(), r.render("FileName")]
            } else if let Some(datetime) = r.text("DateTime") {
                let (date, time) = datetime.split_once(' ').unwrap_or((datetime, ""));
                vec![
                    r.render("TimeSeries"),
                    date.to_string(),
                    time.to_string(),
                    r.render("Value"),
                ]
            } else {
                vec![
                    r.render("TimeSeries"),
                    r.render("Duration"),
                    r.render("Value"),
                ]
            }
        })
        .collect();
    let widths = column_widths(&names, &rows);

    let mut out = String::new();
    push_header(&mut out, &names, &widths);
    let mut last: Option<String> = None;
    for (record, row) in records.iter().zip(&rows) {
        let series = record.render("TimeSeries");
        if last.is_some() && last.as_deref() != Some(series.as_str()) {
            out.push('\n');
        }
        if let Some(desc) = record.text("Description") {
            push_comment_lines(&mut out, desc);
        }
        push_row(&mut out, row, &widths, "");
        last = Some(series);
    }
    out
}

/// Profiles: quoted profile name, up to five links per line.
pub fn pack_profiles(records: &[Record]) -> String {
    let mut out = String::new();
    out.push_str(";;Name           Links\n");
    out.push_str(";;-------------- ----------\n");
    for profile in group_order(records, "Profile") {
        let links: Vec<String> = records
            .iter()
            .filter(|r| r.text("Profile") == Some(profile))
            .map(|r| r.render("Link"))
            .collect();
        for chunk in links.chunks(5) {
            out.push_str(&format!("\"{}\"{}{}\n", profile, SEP, chunk.join(" ")));
        }
    }
    out
}

fn month_position(month: &str) -> usize {
    let upper = month.to_ascii_uppercase();
    MONTH_ORDER
        .iter()
        .position(|m| upper.starts_with(m))
        .unwrap_or(MONTH_ORDER.len())
}

fn response_position(response: &str) -> usize {
    let upper = response.to_ascii_uppercase();
    RESPONSE_ORDER
        .iter()
        .position(|r| upper.starts_with(r))
        .unwrap_or(RESPONSE_ORDER.len())
}

/// Hydrographs: one rain gage line per group, then response rows ordered by
/// month (All first) and response term.
pub fn pack_hydrographs(records: &[Record]) -> String {
    let names = [
        "UHGroup", "Month", "Response", "R", "T", "K", "IAmax", "IArec", "IAini",
    ];
    let mut sorted: Vec<&Record> = records.iter().collect();
    let groups = group_order(records, "UHGroup");
    sorted.sort_by_key(|r| {
        (
            groups
                .iter()
                .position(|g| Some(*g) == r.text("UHGroup"))
                .unwrap_or(usize::MAX),
            month_position(r.text("Month").unwrap_or_default()),
            response_position(r.text("Response").unwrap_or_default()),
        )
    });
    let rows: Vec<Vec<String>> = sorted
        .iter()
        .map(|r| names.iter().map(|n| r.render(n)).collect())
        .collect();
    let widths = column_widths(&names, &rows);

    let mut out = String::new();
    push_header(&mut out, &names, &widths);
    let mut last_group: Option<String> = None;
    for (record, row) in sorted.iter().zip(&rows) {
        let group = record.render("UHGroup");
        if last_group.as_deref() != Some(group.as_str()) {
            if last_group.is_some() {
                out.push('\n');
            }
            if let Some(desc) = record.text(RAIN_GAGE_DESCRIPTION) {
                push_comment_lines(&mut out, desc);
            }
            out.push_str(&format!("{}{}{}\n", group, SEP, record.render(RAIN_GAGE)));
            last_group = Some(group);
        }
        if let Some(desc) = record.text("Description") {
            push_comment_lines(&mut out, desc);
        }
        push_row(&mut out, row, &widths, "");
    }
    out
}

/// Snow packs: one line per parameter category that has any column set.
pub fn pack_snowpacks(schema: &'static SectionSchema, records: &[Record]) -> String {
    let mut out = String::new();
    for record in records {
        if let Some(desc) = record_desc(record, schema) {
            push_comment_lines(&mut out, desc);
        }
        for (category, range) in SNOWPACK_SLICES {
            let fields = &schema.fields[range.clone()];
            if !fields.iter().any(|f| record.contains(f.name)) {
                continue;
            }
            let mut cells = vec![record.render("Name"), category.to_string()];
            for field in fields {
                if record.contains(field.name) {
                    cells.push(record.render(field.name));
                }
            }
            out.push_str(&cells.join(SEP));
            out.push('\n');
        }
    }
    out
}

/// Rule-grammar words that lead a line of rule text.
const RULE_KEYWORDS: [&str; 6] = ["IF", "THEN", "ELSE", "AND", "OR", "PRIORITY"];

/// Upper-case a line's leading keyword, leaving condition text untouched.
fn canonical_rule_line(line: &str) -> String {
    let trimmed = line.trim();
    let (head, rest) = match trimmed.find(char::is_whitespace) {
        Some(pos) => (&trimmed[..pos], &trimmed[pos..]),
        None => (trimmed, ""),
    };
    match RULE_KEYWORDS.iter().find(|k| head.eq_ignore_ascii_case(k)) {
        Some(keyword) => format!("{}{}", keyword, rest),
        None => trimmed.to_string(),
    }
}

pub fn pack_controls(records: &[Record]) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if let Some(desc) = record.text("Description") {
            push_comment_lines(&mut out, desc);
        }
        out.push_str(&format!("RULE {}\n", record.render("RuleName")));
        if let Some(text) = record.text("RuleText") {
            for line in unescape(text).lines() {
                out.push_str(&canonical_rule_line(line));
                out.push('\n');
            }
        }
    }
    out
}

/// Transects: NC roughness line, X1 geometry line (with its two placeholder
/// zeros), then GR lines carrying five elevation/station pairs each.
pub fn pack_transects(records: &[Record]) -> String {
    let sep = "     ";
    let mut out = String::new();
    let mut first = true;
    for transect in group_order(records, "TransectName") {
        let points: Vec<&Record> = records
            .iter()
            .filter(|r| r.text("TransectName") == Some(transect))
            .collect();
        let head = points[0];
        if !first {
            out.push('\n');
        }
        first = false;
        if let Some(desc) = head.text("Description") {
            push_comment_lines(&mut out, desc);
        }
        out.push_str(&format!(
            "NC{sep}{}{sep}{}{sep}{}\n",
            head.render("LeftBankRoughness"),
            head.render("RightBankRoughness"),
            head.render("ChannelRoughness"),
        ));
        out.push_str(&format!(
            "X1{sep}{}{sep}{}{sep}{}{sep}{}{sep}0{sep}0{sep}{}{sep}{}{sep}{}\n",
            transect,
            head.render("StationCount"),
            head.render("LeftBankStation"),
            head.render("RightBankStation"),
            head.render("MeanderModifier"),
            head.render("StationsModifier"),
            head.render("ElevationsModifier"),
        ));
        for chunk in points.chunks(5) {
            let pairs: Vec<String> = chunk
                .iter()
                .map(|p| format!("{} {}", p.render("Elevation_ft"), p.render("Station_ft")))
                .collect();
            out.push_str(&format!("GR{sep}{}\n", pairs.join(sep)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inp::record::{NAME, ORDINAL};
    use crate::inp::schema;
    use crate::inp::value::Value;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut rec = Record::new();
        for (field, value) in pairs {
            rec.set(*field, value.clone());
        }
        rec
    }

    fn pattern_points(name: &str, kind: &str, count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                record(&[
                    ("Pattern", Value::text(name)),
                    ("Type", Value::text(kind)),
                    ("Multiplier", Value::Number(1.0 + i as f64 / 10.0)),
                    (ORDINAL, Value::Int(i as i64 + 1)),
                    (NAME, Value::text(format!("{}:{}", name, i + 1))),
                ])
            })
            .collect()
    }

    #[test]
    fn test_hourly_pattern_packs_four_rows_of_six() {
        let text = pack_patterns(
            schema::schema(schema::SectionKind::Patterns),
            &pattern_points("P1", "HOURLY", 24),
        )
        .unwrap();
        let data: Vec<&str> = text.lines().filter(|l| !l.starts_with(";;")).collect();
        assert_eq!(data.len(), 4);
        assert!(data[0].contains("HOURLY"));
        assert!(!data[1].contains("HOURLY"));
    }

    #[test]
    fn test_pattern_count_mismatch_is_an_error() {
        let err = pack_patterns(
            schema::schema(schema::SectionKind::Patterns),
            &pattern_points("P1", "MONTHLY", 5),
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected 12"));
    }

    #[test]
    fn test_curves_blank_type_after_first_row() {
        let records = vec![
            record(&[
                ("Curve", Value::text("SC1")),
                ("Type", Value::text("Storage")),
                ("XCoordinate", Value::Number(0.0)),
                ("YCoordinate", Value::Number(100.0)),
            ]),
            record(&[
                ("Curve", Value::text("SC1")),
                ("Type", Value::text("Storage")),
                ("XCoordinate", Value::Number(5.0)),
                ("YCoordinate", Value::Number(500.0)),
            ]),
            record(&[
                ("Curve", Value::text("PC1")),
                ("Type", Value::text("Pump1")),
                ("XCoordinate", Value::Number(0.0)),
                ("YCoordinate", Value::Number(10.0)),
            ]),
        ];
        let text = pack_curves(&records);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[2].contains("Storage"));
        assert!(!lines[3].contains("Storage"));
        // Blank line separates curves.
        assert_eq!(lines[4], "");
        assert!(lines[5].contains("Pump1"));
    }

    #[test]
    fn test_timeseries_file_row() {
        let records = vec![record(&[
            ("TimeSeries", Value::text("TS1")),
            ("FileName", Value::text("\"rain.dat\"")),
        ])];
        let text = pack_timeseries(&records);
        assert!(text.contains("TS1"));
        assert!(text.contains("FILE"));
        assert!(text.contains("\"rain.dat\""));
    }

    #[test]
    fn test_profiles_quote_names_and_chunk_links() {
        let records: Vec<Record> = (1..=7)
            .map(|i| {
                record(&[
                    ("Profile", Value::text("Main Branch")),
                    ("Link", Value::text(format!("C{}", i))),
                ])
            })
            .collect();
        let text = pack_profiles(&records);
        let data: Vec<&str> = text.lines().filter(|l| !l.starts_with(";;")).collect();
        assert_eq!(data.len(), 2);
        assert!(data[0].starts_with("\"Main Branch\""));
        assert!(data[1].ends_with("C6 C7"));
    }

    #[test]
    fn test_hydrographs_emit_gage_row_and_month_order() {
        let mk = |month: &str, response: &str| {
            record(&[
                ("UHGroup", Value::text("UH1")),
                ("Month", Value::text(month)),
                ("Response", Value::text(response)),
                ("R", Value::Number(0.1)),
                ("T", Value::Number(1.0)),
                ("K", Value::Number(2.0)),
                (RAIN_GAGE, Value::text("RG1")),
            ])
        };
        let text = pack_hydrographs(&[mk("Jul", "Short"), mk("All", "Short")]);
        let data: Vec<&str> = text.lines().filter(|l| !l.starts_with(";;")).collect();
        assert_eq!(data[0], format!("UH1{}RG1", SEP));
        assert!(data[1].contains("All"));
        assert!(data[2].contains("Jul"));
    }

    #[test]
    fn test_snowpack_lines_per_category() {
        let rec = record(&[
            ("Name", Value::text("SP1")),
            ("PlowMinCoeff", Value::Number(0.001)),
            ("PlowMaxCoeff", Value::Number(0.002)),
            ("RmvlStartDepth", Value::Number(1.0)),
        ]);
        let text = pack_snowpacks(schema::schema(schema::SectionKind::SnowPacks), &[rec]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("PLOWABLE"));
        assert!(lines[1].contains("REMOVAL"));
        assert!(!text.contains("IMPERVIOUS"));
    }

    #[test]
    fn test_controls_round_out_rule_text() {
        let rec = record(&[
            ("RuleName", Value::text("R1")),
            ("RuleText", Value::text("IF NODE J1 DEPTH > 2\nTHEN PUMP P1 STATUS = ON")),
            ("Description", Value::text("storm rule")),
        ]);
        let text = pack_controls(&[rec]);
        assert_eq!(
            text,
            ";storm rule\nRULE R1\nIF NODE J1 DEPTH > 2\nTHEN PUMP P1 STATUS = ON\n"
        );
    }

    #[test]
    fn test_rule_keywords_are_capitalized() {
        let rec = record(&[
            ("RuleName", Value::text("R1")),
            (
                "RuleText",
                Value::text("if NODE J1 DEPTH > 2\nand SIMULATION TIME > 1\nthen PUMP P1 STATUS = ON\npriority 5"),
            ),
        ]);
        let text = pack_controls(&[rec]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "IF NODE J1 DEPTH > 2");
        assert_eq!(lines[2], "AND SIMULATION TIME > 1");
        assert_eq!(lines[3], "THEN PUMP P1 STATUS = ON");
        assert_eq!(lines[4], "PRIORITY 5");
    }

    #[test]
    fn test_transect_block_shape() {
        let mk = |elev: f64, station: f64| {
            record(&[
                ("TransectName", Value::text("T1")),
                ("StationCount", Value::Int(4)),
                ("LeftBankRoughness", Value::Number(0.015)),
                ("RightBankRoughness", Value::Number(0.015)),
                ("ChannelRoughness", Value::Number(0.030)),
                ("LeftBankStation", Value::Number(10.0)),
                ("RightBankStation", Value::Number(90.0)),
                ("MeanderModifier", Value::Number(1.0)),
                ("StationsModifier", Value::Number(0.0)),
                ("ElevationsModifier", Value::Number(0.0)),
                ("Elevation_ft", Value::Number(elev)),
                ("Station_ft", Value::Number(station)),
            ])
        };
        let text = pack_transects(&[mk(100.0, 0.0), mk(95.0, 10.0)]);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("NC"));
        assert!(lines[1].starts_with("X1"));
        assert!(lines[1].contains("0     0"));
        assert!(lines[2].starts_with("GR"));
        assert!(lines[2].contains("100 0"));
        assert!(lines[2].contains("95 10"));
    }
}
