//! Parameter/value sections
//!
//!     Options, report, map and evaporation fold into a single record per
//!     section: every line names a parameter and its value. The report
//!     section's list parameters may repeat and accumulate; the map and
//!     evaporation sections use line keywords that don't match their field
//!     names one-to-one, so each gets its own small folder.

use crate::inp::error::InpError;
use crate::inp::extract::{tokenize, Extractor};
use crate::inp::record::Record;
use crate::inp::schema::{SectionKind, SectionSchema};
use crate::inp::value::Value;

/// Report parameters that accumulate across repeated lines.
const REPORT_LISTS: [&str; 3] = ["SUBCATCHMENTS", "NODES", "LINKS"];

const EVAPORATION_TYPES: [&str; 5] =
    ["CONSTANT", "TIMESERIES", "FILE", "TEMPERATURE", "MONTHLY"];

pub fn extract(
    ctx: &Extractor<'_>,
    schema: &'static SectionSchema,
) -> Result<Vec<Record>, InpError> {
    let mut record = Record::new();
    let mut any = false;

    for (offset, raw) in ctx.lines.iter().enumerate() {
        let lineno = ctx.base + offset + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        any = true;
        match schema.kind {
            SectionKind::Options => fold_option(schema, &mut record, line, lineno)?,
            SectionKind::Report => fold_report(schema, &mut record, line, lineno)?,
            SectionKind::Map => fold_map(schema, &mut record, line, lineno)?,
            SectionKind::Evaporation => fold_evaporation(schema, &mut record, line, lineno)?,
            other => unreachable!("no key/value folder for {:?}", other),
        }
    }
    Ok(if any { vec![record] } else { Vec::new() })
}

fn fold_option(
    schema: &'static SectionSchema,
    record: &mut Record,
    line: &str,
    lineno: usize,
) -> Result<(), InpError> {
    let tokens = tokenize(line, Some(1));
    if tokens.len() != 2 {
        return Err(InpError::format(
            schema.label,
            Some(lineno),
            "option line needs a name and a value",
        ));
    }
    let key = tokens[0].to_ascii_uppercase();
    let field = schema
        .fields
        .iter()
        .find(|f| f.name == key)
        .ok_or_else(|| {
            InpError::format(
                schema.label,
                Some(lineno),
                format!("unknown option '{}'", tokens[0]),
            )
        })?;
    let value = field
        .ty
        .parse(&tokens[1])
        .map_err(|reason| InpError::format(schema.label, Some(lineno), reason))?;
    record.set(field.name, value);
    Ok(())
}

fn fold_report(
    schema: &'static SectionSchema,
    record: &mut Record,
    line: &str,
    lineno: usize,
) -> Result<(), InpError> {
    let tokens = tokenize(line, Some(1));
    if tokens.len() != 2 {
        return Err(InpError::format(
            schema.label,
            Some(lineno),
            "report line needs a name and a value",
        ));
    }
    let key = tokens[0].to_ascii_uppercase();
    let field = schema
        .fields
        .iter()
        .find(|f| f.name == key)
        .ok_or_else(|| {
            InpError::format(
                schema.label,
                Some(lineno),
                format!("unknown report parameter '{}'", tokens[0]),
            )
        })?;
    // Element lists may span repeated lines and concatenate.
    if REPORT_LISTS.contains(&field.name) {
        let joined = match record.text(field.name) {
            Some(existing) => format!("{} {}", existing, tokens[1]),
            None => tokens[1].clone(),
        };
        record.set(field.name, Value::text(joined));
    } else {
        record.set(field.name, Value::text(tokens[1].clone()));
    }
    Ok(())
}

fn fold_map(
    schema: &'static SectionSchema,
    record: &mut Record,
    line: &str,
    lineno: usize,
) -> Result<(), InpError> {
    let tokens = tokenize(line, None);
    match tokens[0].to_ascii_uppercase().as_str() {
        "DIMENSIONS" if tokens.len() == 5 => {
            let corners = ["LLXCoordinate", "LLYCoordinate", "URXCoordinate", "URYCoordinate"];
            for (field, token) in corners.iter().zip(&tokens[1..]) {
                let value = token
                    .parse::<f64>()
                    .map(Value::Number)
                    .map_err(|_| {
                        InpError::format(
                            schema.label,
                            Some(lineno),
                            format!("'{}' is not a number", token),
                        )
                    })?;
                record.set(*field, value);
            }
            Ok(())
        }
        "UNITS" if tokens.len() == 2 => {
            record.set("Units", Value::text(tokens[1].clone()));
            Ok(())
        }
        _ => Err(InpError::format(
            schema.label,
            Some(lineno),
            format!("unrecognized map line '{}'", line),
        )),
    }
}

fn fold_evaporation(
    schema: &'static SectionSchema,
    record: &mut Record,
    line: &str,
    lineno: usize,
) -> Result<(), InpError> {
    let tokens = tokenize(line, None);
    let key = tokens[0].to_ascii_uppercase();
    if EVAPORATION_TYPES.contains(&key.as_str()) {
        record.set("Type", Value::text(key));
        // CONSTANT carries one value, MONTHLY twelve, TEMPERATURE none;
        // the parameters are kept as one space-joined cell either way.
        if tokens.len() > 1 {
            record.set("Parameters", Value::text(tokens[1..].join(" ")));
        }
        return Ok(());
    }
    match (key.as_str(), tokens.len()) {
        ("RECOVERY", 2) => {
            record.set("Recovery", Value::text(tokens[1].clone()));
            Ok(())
        }
        ("DRY_ONLY", 2) => {
            record.set("DryOnly", Value::text(tokens[1].clone()));
            Ok(())
        }
        _ => Err(InpError::format(
            schema.label,
            Some(lineno),
            format!("unrecognized evaporation line '{}'", line),
        )),
    }
}
