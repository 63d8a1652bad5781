//! Grouped point sections
//!
//!     Patterns, curves, time series and profiles store one logical object as a
//!     run of lines sharing a leading name, with continuation lines that omit
//!     repeated columns. Each point becomes its own record with a synthesized
//!     `<group>:<ordinal>` identity; the ordinal resets when the group value
//!     changes and continues across continuation lines.

use crate::inp::describe::{split_trailing_comment, DescriptionBuffer};
use crate::inp::error::InpError;
use crate::inp::extract::{tokenize, Extractor};
use crate::inp::record::{Record, NAME, ORDINAL};
use crate::inp::schema::SectionSchema;
use crate::inp::value::{looks_numeric, FieldType, Value};

/// The notes section is free text: kept verbatim, interior blank lines and
/// all, with only the trailing blank run stripped.
pub fn extract_notes(ctx: &Extractor<'_>) -> Vec<Record> {
    let mut lines: Vec<&str> = ctx.lines.iter().map(|l| l.trim_end()).collect();
    while lines.last() == Some(&"") {
        lines.pop();
    }
    while lines.first() == Some(&"") {
        lines.remove(0);
    }
    if lines.is_empty() {
        return Vec::new();
    }
    let mut record = Record::new();
    record.set("NotesText", Value::text(lines.join("\n")));
    vec![record]
}

struct GroupState {
    group: Option<String>,
    ordinal: i64,
}

impl GroupState {
    fn new() -> GroupState {
        GroupState {
            group: None,
            ordinal: 0,
        }
    }

    /// Advance the ordinal, resetting when the group value changes. Returns
    /// `true` when this starts a new group.
    fn advance(&mut self, group: &str) -> bool {
        let fresh = self.group.as_deref() != Some(group);
        if fresh {
            self.group = Some(group.to_string());
            self.ordinal = 0;
        }
        self.ordinal += 1;
        fresh
    }

    fn stamp(&self, record: &mut Record) {
        record.set(ORDINAL, Value::Int(self.ordinal));
        record.set(
            NAME,
            Value::text(format!(
                "{}:{}",
                self.group.as_deref().unwrap_or_default(),
                self.ordinal
            )),
        );
    }
}

fn number(
    schema: &'static SectionSchema,
    lineno: usize,
    token: &str,
) -> Result<Value, InpError> {
    FieldType::Number
        .parse(token)
        .map_err(|reason| InpError::format(schema.label, Some(lineno), reason))
}

/// Patterns: a header line names the pattern and its cycle type, then carries
/// multipliers; continuation lines repeat the name only. One record per
/// multiplier; preceding comments attach to the first record of the line
/// they precede.
pub fn extract_patterns(
    ctx: &Extractor<'_>,
    schema: &'static SectionSchema,
) -> Result<Vec<Record>, InpError> {
    let mut records = Vec::new();
    let mut buffer = DescriptionBuffer::new();
    let mut state = GroupState::new();
    let mut current_type: Option<String> = None;

    for (offset, raw) in ctx.lines.iter().enumerate() {
        let lineno = ctx.base + offset + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(';') {
            buffer.push_comment(line);
            continue;
        }
        buffer.mark_data_seen();
        let mut desc = buffer.take();
        let (data, _) = split_trailing_comment(line);
        let tokens = tokenize(data, None);
        if tokens.len() < 2 {
            return Err(InpError::format(
                schema.label,
                Some(lineno),
                "pattern line needs a name and at least one value",
            ));
        }

        // A non-numeric second token is a cycle type: this line starts a
        // pattern. Numeric means a continuation carrying only multipliers.
        let multipliers: &[String] = if looks_numeric(&tokens[1]) {
            &tokens[1..]
        } else {
            current_type = Some(tokens[1].clone());
            &tokens[2..]
        };
        let pattern_type = current_type.clone().ok_or_else(|| {
            InpError::format(
                schema.label,
                Some(lineno),
                "continuation line before any pattern header",
            )
        })?;

        for token in multipliers {
            state.advance(&tokens[0]);
            let mut record = Record::new();
            record.set("Pattern", Value::text(tokens[0].clone()));
            record.set("Type", Value::text(pattern_type.clone()));
            record.set("Multiplier", number(schema, lineno, token)?);
            if let Some(desc) = desc.take() {
                record.set(schema.desc_field, Value::text(desc));
            }
            state.stamp(&mut record);
            records.push(record);
        }
    }
    Ok(records)
}

/// Curves: a header line carries the curve type between the name and the
/// first point; continuation lines omit it and inherit the current type.
pub fn extract_curves(
    ctx: &Extractor<'_>,
    schema: &'static SectionSchema,
) -> Result<Vec<Record>, InpError> {
    let mut records = Vec::new();
    let mut buffer = DescriptionBuffer::new();
    let mut state = GroupState::new();
    let mut current_type: Option<String> = None;

    for (offset, raw) in ctx.lines.iter().enumerate() {
        let lineno = ctx.base + offset + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(';') {
            buffer.push_comment(line);
            continue;
        }
        buffer.mark_data_seen();
        let desc = buffer.take();
        let (data, _) = split_trailing_comment(line);
        let tokens = tokenize(data, None);

        let (x, y) = if tokens.len() == 4 && !looks_numeric(&tokens[1]) {
            current_type = Some(tokens[1].clone());
            (&tokens[2], &tokens[3])
        } else if tokens.len() == 3 {
            (&tokens[1], &tokens[2])
        } else {
            return Err(InpError::format(
                schema.label,
                Some(lineno),
                format!("curve line with {} tokens", tokens.len()),
            ));
        };
        let curve_type = current_type.clone().ok_or_else(|| {
            InpError::format(
                schema.label,
                Some(lineno),
                "curve point before any curve header",
            )
        })?;

        state.advance(&tokens[0]);
        let mut record = Record::new();
        record.set("Curve", Value::text(tokens[0].clone()));
        record.set("Type", Value::text(curve_type));
        record.set("XCoordinate", number(schema, lineno, x)?);
        record.set("YCoordinate", number(schema, lineno, y)?);
        if let Some(desc) = desc {
            record.set(schema.desc_field, Value::text(desc));
        }
        state.stamp(&mut record);
        records.push(record);
    }
    Ok(records)
}

/// Time series lines come in three forms: an external-file reference, a
/// duration/value pair, or a date + time + value triple.
pub fn extract_timeseries(
    ctx: &Extractor<'_>,
    schema: &'static SectionSchema,
) -> Result<Vec<Record>, InpError> {
    let mut records = Vec::new();
    let mut buffer = DescriptionBuffer::new();
    let mut state = GroupState::new();

    for (offset, raw) in ctx.lines.iter().enumerate() {
        let lineno = ctx.base + offset + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with(';') {
            buffer.push_comment(line);
            continue;
        }
        buffer.mark_data_seen();
        let desc = buffer.take();
        let (data, _) = split_trailing_comment(line);
        let tokens = tokenize(data, None);
        if tokens.len() < 2 {
            return Err(InpError::format(
                schema.label,
                Some(lineno),
                "time series line needs a name and values",
            ));
        }

        state.advance(&tokens[0]);
        let mut record = Record::new();
        record.set("TimeSeries", Value::text(tokens[0].clone()));
        if tokens[1].eq_ignore_ascii_case("FILE") {
            // The path may contain spaces; everything after the keyword is it.
            record.set("FileName", Value::text(tokens[2..].join(" ")));
        } else if tokens.len() == 3 {
            record.set("Duration", number(schema, lineno, &tokens[1])?);
            record.set("Value", number(schema, lineno, &tokens[2])?);
        } else if tokens.len() == 4 {
            record.set(
                "DateTime",
                Value::text(format!("{} {}", tokens[1], tokens[2])),
            );
            record.set("Value", number(schema, lineno, &tokens[3])?);
        } else {
            return Err(InpError::format(
                schema.label,
                Some(lineno),
                format!("time series line with {} tokens", tokens.len()),
            ));
        }
        if let Some(desc) = desc {
            record.set(schema.desc_field, Value::text(desc));
        }
        state.stamp(&mut record);
        records.push(record);
    }
    Ok(records)
}

/// Profiles: a possibly-quoted profile name followed by link names; a profile
/// may continue over several lines and the ordinal runs across them.
pub fn extract_profiles(
    ctx: &Extractor<'_>,
    schema: &'static SectionSchema,
) -> Result<Vec<Record>, InpError> {
    let mut records = Vec::new();
    let mut state = GroupState::new();

    for (offset, raw) in ctx.lines.iter().enumerate() {
        let lineno = ctx.base + offset + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let (data, _) = split_trailing_comment(line);
        let (profile, rest) = split_profile_name(data).ok_or_else(|| {
            InpError::format(schema.label, Some(lineno), "unterminated quoted name")
        })?;
        for link in tokenize(rest, None) {
            state.advance(profile);
            let mut record = Record::new();
            record.set("Profile", Value::text(profile));
            record.set("Link", Value::text(link));
            state.stamp(&mut record);
            records.push(record);
        }
    }
    Ok(records)
}

/// Split off a leading profile name, honoring double quotes around names that
/// contain spaces. Returns the unquoted name and the remainder of the line.
fn split_profile_name(data: &str) -> Option<(&str, &str)> {
    let data = data.trim_start();
    if let Some(rest) = data.strip_prefix('"') {
        let end = rest.find('"')?;
        Some((&rest[..end], &rest[end + 1..]))
    } else {
        match data.find(char::is_whitespace) {
            Some(pos) => Some((&data[..pos], &data[pos..])),
            None => Some((data, "")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inp::extract::Recovery;
    use crate::inp::schema::{self, SectionKind};

    fn run<F, T>(body: &str, f: F) -> T
    where
        F: FnOnce(&Extractor<'_>) -> T,
    {
        let lines: Vec<String> = body.lines().map(str::to_string).collect();
        let ctx = Extractor {
            lines: &lines,
            base: 0,
            recovery: Recovery::Strict,
            infiltration: None,
        };
        f(&ctx)
    }

    #[test]
    fn test_pattern_continuation_inherits_type() {
        let records = run(
            "; weekday flow\nP1  HOURLY  1.0  1.1  1.2\nP1  1.3  1.4",
            |ctx| extract_patterns(ctx, schema::schema(SectionKind::Patterns)).unwrap(),
        );
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.text("Type") == Some("HOURLY")));
        assert_eq!(records[4].name(), Some("P1:5"));
        assert_eq!(records[4].number("Multiplier"), Some(1.4));
        // The comment belongs to the line it precedes, so only the first
        // record of that line carries it.
        assert_eq!(records[0].text("Description"), Some("weekday flow"));
        assert!(records[1..].iter().all(|r| !r.contains("Description")));
    }

    #[test]
    fn test_curve_continuation_and_ordinal_reset() {
        let records = run(
            "SC1  Storage  0  100\nSC1  5  500\nPC1  Pump1  0  10",
            |ctx| extract_curves(ctx, schema::schema(SectionKind::Curves)).unwrap(),
        );
        assert_eq!(records[1].text("Type"), Some("Storage"));
        assert_eq!(records[1].name(), Some("SC1:2"));
        assert_eq!(records[2].name(), Some("PC1:1"));
        assert_eq!(records[2].text("Type"), Some("Pump1"));
    }

    #[test]
    fn test_timeseries_three_forms() {
        let records = run(
            "TS1  FILE  rain gauge.dat\nTS2  0.25  1.5\nTS3  07/01/2019  12:00  0.5",
            |ctx| extract_timeseries(ctx, schema::schema(SectionKind::TimeSeries)).unwrap(),
        );
        assert_eq!(records[0].text("FileName"), Some("rain gauge.dat"));
        assert!(!records[0].contains("Value"));
        assert_eq!(records[1].number("Duration"), Some(0.25));
        assert_eq!(records[2].text("DateTime"), Some("07/01/2019 12:00"));
        assert_eq!(records[2].number("Value"), Some(0.5));
    }

    #[test]
    fn test_timeseries_extra_token_is_an_error() {
        let err = run("TS1  07/01/2019  12:00  0.5  0.9", |ctx| {
            extract_timeseries(ctx, schema::schema(SectionKind::TimeSeries))
        })
        .unwrap_err();
        assert!(err.to_string().contains("5 tokens"));
    }

    #[test]
    fn test_timeseries_comment_attaches_to_adjacent_line() {
        let records = run(
            "; july storm\nTS1  0.0  0.5\n; peak hour\nTS1  0.25  1.5",
            |ctx| extract_timeseries(ctx, schema::schema(SectionKind::TimeSeries)).unwrap(),
        );
        assert_eq!(records[0].text("Description"), Some("july storm"));
        assert_eq!(records[1].text("Description"), Some("peak hour"));
    }

    #[test]
    fn test_profile_quoted_name_spans_lines() {
        let records = run(
            "\"Main Branch\"  C1  C2\n\"Main Branch\"  C3",
            |ctx| extract_profiles(ctx, schema::schema(SectionKind::Profiles)).unwrap(),
        );
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].text("Profile"), Some("Main Branch"));
        assert_eq!(records[2].name(), Some("Main Branch:3"));
    }
}
