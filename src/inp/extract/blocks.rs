//! Multi-line block grammars
//!
//!     Four sections spread one logical object over several differently-shaped
//!     lines: unit hydrographs (a rain gage line plus response rows), snow
//!     packs (one line per parameter category, merged by name), transects
//!     (roughness, geometry and station lines) and control rules (a header
//!     line plus free rule text). Each is an explicit little state machine; no
//!     reflection, no shared generic walker.

use std::collections::HashMap;

use crate::inp::describe::{split_trailing_comment, DescriptionBuffer};
use crate::inp::error::InpError;
use crate::inp::extract::{tokenize, Extractor};
use crate::inp::record::{Record, NAME, ORDINAL};
use crate::inp::schema::{SectionSchema, SNOWPACK_SLICES};
use crate::inp::value::{FieldType, Value};

/// Field carrying a hydrograph group's rain gage on every record of the group.
pub const RAIN_GAGE: &str = "RainGage";
/// Description of the rain gage line itself, kept apart from record notes.
pub const RAIN_GAGE_DESCRIPTION: &str = "RainGageDescription";

const UH_RESPONSES: [&str; 3] = ["Short", "Medium", "Long"];

fn number(
    schema: &'static SectionSchema,
    lineno: usize,
    token: &str,
) -> Result<Value, InpError> {
    FieldType::Number
        .parse(token)
        .map_err(|reason| InpError::format(schema.label, Some(lineno), reason))
}

/// Unit hydrographs: a two-token line binds a group to its rain gage; nine
/// tokens are one response row; fourteen tokens carry all three responses of
/// a month on one line and expand to three records.
pub fn extract_hydrographs(
    ctx: &Extractor<'_>,
    schema: &'static SectionSchema,
) -> Result<Vec<Record>, InpError> {
    let mut records = Vec::new();
    let mut buffer = DescriptionBuffer::new();
    let mut gages: HashMap<String, (String, Option<String>)> = HashMap::new();

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
        let (data, _) = split_trailing_comment(line);
        let tokens = tokenize(data, None);

        match tokens.len() {
            2 => {
                gages.insert(tokens[0].clone(), (tokens[1].clone(), buffer.take()));
            }
            9 => {
                let desc = buffer.take();
                records.push(hydrograph_record(
                    schema, &gages, lineno, &tokens[0], &tokens[1], &tokens[2], &tokens[3..6],
                    &tokens[6..9], desc,
                )?);
            }
            14 => {
                // One line per month carrying Short, Medium and Long in turn;
                // the initial-abstraction columns are shared by all three.
                let desc = buffer.take();
                for (slot, response) in UH_RESPONSES.iter().enumerate() {
                    let rtk = &tokens[2 + 3 * slot..5 + 3 * slot];
                    records.push(hydrograph_record(
                        schema,
                        &gages,
                        lineno,
                        &tokens[0],
                        &tokens[1],
                        response,
                        rtk,
                        &tokens[11..14],
                        desc.clone(),
                    )?);
                }
            }
            n => {
                return Err(InpError::format(
                    schema.label,
                    Some(lineno),
                    format!("hydrograph line with {} tokens", n),
                ));
            }
        }
    }
    Ok(records)
}

#[allow(clippy::too_many_arguments)]
fn hydrograph_record(
    schema: &'static SectionSchema,
    gages: &HashMap<String, (String, Option<String>)>,
    lineno: usize,
    group: &str,
    month: &str,
    response: &str,
    rtk: &[String],
    ia: &[String],
    desc: Option<String>,
) -> Result<Record, InpError> {
    let (gage, gage_desc) = gages.get(group).ok_or_else(|| {
        InpError::format(
            schema.label,
            Some(lineno),
            format!("hydrograph group '{}' has no rain gage line", group),
        )
    })?;
    let mut record = Record::new();
    record.set("UHGroup", Value::text(group));
    record.set("Month", Value::text(month));
    record.set("Response", Value::text(response));
    for (field, token) in ["R", "T", "K"].iter().zip(rtk) {
        record.set(*field, number(schema, lineno, token)?);
    }
    for (field, token) in ["IAmax", "IArec", "IAini"].iter().zip(ia) {
        record.set(*field, number(schema, lineno, token)?);
    }
    record.set(RAIN_GAGE, Value::text(gage.clone()));
    if let Some(gage_desc) = gage_desc {
        record.set(RAIN_GAGE_DESCRIPTION, Value::text(gage_desc.clone()));
    }
    if let Some(desc) = desc {
        record.set(schema.desc_field, Value::text(desc));
    }
    record.set(
        NAME,
        Value::text(format!("{}:{}:{}", group, month, response)),
    );
    Ok(record)
}

/// Snow packs: each line carries one parameter category; lines sharing a name
/// merge into a single record whose columns are the union of its categories.
pub fn extract_snowpacks(
    ctx: &Extractor<'_>,
    schema: &'static SectionSchema,
) -> Result<Vec<Record>, InpError> {
    let mut records: Vec<Record> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut buffer = DescriptionBuffer::new();

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
        let (data, _) = split_trailing_comment(line);
        let tokens = tokenize(data, None);
        if tokens.len() < 2 {
            return Err(InpError::format(
                schema.label,
                Some(lineno),
                "snow pack line needs a name and category",
            ));
        }
        let category = tokens[1].to_ascii_uppercase();
        let slice = SNOWPACK_SLICES
            .iter()
            .find(|(name, _)| *name == category)
            .map(|(_, range)| range.clone())
            .ok_or_else(|| {
                InpError::format(
                    schema.label,
                    Some(lineno),
                    format!("unknown snow pack category '{}'", tokens[1]),
                )
            })?;

        // The removal line's trailing subcatchment name is optional.
        let params = &tokens[2..];
        if params.len() != slice.len() && !(category == "REMOVAL" && params.len() + 1 == slice.len())
        {
            return Err(InpError::format(
                schema.label,
                Some(lineno),
                format!("{} line with {} parameters", category, params.len()),
            ));
        }

        let index = *by_name.entry(tokens[0].clone()).or_insert_with(|| {
            let mut record = Record::new();
            record.set("Name", Value::text(tokens[0].clone()));
            records.push(record);
            records.len() - 1
        });
        let record = &mut records[index];
        for (position, token) in slice.clone().zip(params) {
            let field = schema.fields[position];
            let value = field
                .ty
                .parse(token)
                .map_err(|reason| InpError::format(schema.label, Some(lineno), reason))?;
            record.set(field.name, value);
        }
        if let Some(desc) = buffer.take() {
            if !record.contains(schema.desc_field) {
                record.set(schema.desc_field, Value::text(desc));
            }
        }
    }
    Ok(records)
}

/// Transect state: NC roughness lines apply to the transects that follow, an
/// X1 line opens a transect, and GR lines emit one record per station pair.
pub fn extract_transects(
    ctx: &Extractor<'_>,
    schema: &'static SectionSchema,
) -> Result<Vec<Record>, InpError> {
    struct Open {
        header: Record,
        ordinal: i64,
        desc: Option<String>,
    }

    let mut records = Vec::new();
    let mut buffer = DescriptionBuffer::new();
    let mut roughness: Option<[Value; 3]> = None;
    let mut open: Option<Open> = None;

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
        let (data, _) = split_trailing_comment(line);
        let tokens = tokenize(data, None);
        let keyword = tokens[0].to_ascii_uppercase();

        match keyword.as_str() {
            "NC" => {
                if tokens.len() != 4 {
                    return Err(InpError::format(
                        schema.label,
                        Some(lineno),
                        "NC line needs three roughness values",
                    ));
                }
                roughness = Some([
                    number(schema, lineno, &tokens[1])?,
                    number(schema, lineno, &tokens[2])?,
                    number(schema, lineno, &tokens[3])?,
                ]);
            }
            "X1" => {
                if tokens.len() != 10 {
                    return Err(InpError::format(
                        schema.label,
                        Some(lineno),
                        format!("X1 line with {} tokens", tokens.len()),
                    ));
                }
                let mut header = Record::new();
                header.set("TransectName", Value::text(tokens[1].clone()));
                header.set(
                    "StationCount",
                    FieldType::Int.parse(&tokens[2]).map_err(|reason| {
                        InpError::format(schema.label, Some(lineno), reason)
                    })?,
                );
                header.set("LeftBankStation", number(schema, lineno, &tokens[3])?);
                header.set("RightBankStation", number(schema, lineno, &tokens[4])?);
                // Tokens 5 and 6 are unused placeholder zeros in this dialect.
                header.set("MeanderModifier", number(schema, lineno, &tokens[7])?);
                header.set("StationsModifier", number(schema, lineno, &tokens[8])?);
                header.set("ElevationsModifier", number(schema, lineno, &tokens[9])?);
                if let Some([left, right, channel]) = &roughness {
                    header.set("LeftBankRoughness", left.clone());
                    header.set("RightBankRoughness", right.clone());
                    header.set("ChannelRoughness", channel.clone());
                }
                open = Some(Open {
                    header,
                    ordinal: 0,
                    desc: buffer.take(),
                });
            }
            "GR" => {
                let open = open.as_mut().ok_or_else(|| {
                    InpError::format(
                        schema.label,
                        Some(lineno),
                        "GR line before any X1 line",
                    )
                })?;
                if tokens.len() < 3 || (tokens.len() - 1) % 2 != 0 {
                    return Err(InpError::format(
                        schema.label,
                        Some(lineno),
                        "GR line needs elevation/station pairs",
                    ));
                }
                for pair in tokens[1..].chunks(2) {
                    open.ordinal += 1;
                    let mut record = open.header.clone();
                    record.set("Elevation_ft", number(schema, lineno, &pair[0])?);
                    record.set("Station_ft", number(schema, lineno, &pair[1])?);
                    record.set(ORDINAL, Value::Int(open.ordinal));
                    record.set(
                        NAME,
                        Value::text(format!(
                            "{}:{}",
                            record.render("TransectName"),
                            open.ordinal
                        )),
                    );
                    if let Some(desc) = &open.desc {
                        record.set(schema.desc_field, Value::text(desc.clone()));
                    }
                    records.push(record);
                }
            }
            other => {
                return Err(InpError::format(
                    schema.label,
                    Some(lineno),
                    format!("unknown transect keyword '{}'", other),
                ));
            }
        }
    }
    Ok(records)
}

/// Control rules: a `RULE <name>` line opens a rule; every following line up
/// to the next rule is verbatim rule text. Comments before the header are the
/// rule's description.
pub fn extract_controls(
    ctx: &Extractor<'_>,
    schema: &'static SectionSchema,
) -> Result<Vec<Record>, InpError> {
    struct Open {
        name: String,
        text: Vec<String>,
        desc: Option<String>,
    }

    let mut records = Vec::new();
    let mut buffer = DescriptionBuffer::new();
    let mut open: Option<Open> = None;
    let mut ordinal = 0i64;

    let finish = |open: Option<Open>, records: &mut Vec<Record>, ordinal: i64| {
        if let Some(rule) = open {
            let mut record = Record::new();
            record.set("RuleName", Value::text(rule.name.clone()));
            record.set("RuleText", Value::text(rule.text.join("\n")));
            if let Some(desc) = rule.desc {
                record.set(schema.desc_field, Value::text(desc));
            }
            record.set(ORDINAL, Value::Int(ordinal));
            record.set(NAME, Value::text(format!("{}:{}", ordinal, rule.name)));
            records.push(record);
        }
    };

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

        let mut tokens = line.split_whitespace();
        let is_header = tokens
            .next()
            .map(|t| t.eq_ignore_ascii_case("RULE"))
            .unwrap_or(false);
        if is_header {
            let name = tokens.next().ok_or_else(|| {
                InpError::format(schema.label, Some(lineno), "RULE line without a name")
            })?;
            finish(open.take(), &mut records, ordinal);
            ordinal += 1;
            open = Some(Open {
                name: name.to_string(),
                text: Vec::new(),
                desc: buffer.take(),
            });
        } else {
            match open.as_mut() {
                Some(rule) => rule.text.push(line.to_string()),
                None => {
                    return Err(InpError::format(
                        schema.label,
                        Some(lineno),
                        "rule text before any RULE line",
                    ));
                }
            }
        }
    }
    finish(open, &mut records, ordinal);
    Ok(records)
}
