//! Token-shape resolution for table sections
//!
//!     Maps a line's token list onto the schema's column positions. Most
//!     sections are a straight one-to-one mapping with an optional null tail;
//!     five have marker-driven variants where the value of one column decides
//!     which other columns the line carries at all.

use crate::inp::error::InpError;
use crate::inp::extract::{Extractor, InfiltrationKind, Recovery};
use crate::inp::schema::{
    field_index, MarkerRule, SectionSchema, ShapeRule, INFILTRATION_GREEN_AMPT,
    INFILTRATION_HORTON,
};
use crate::inp::value::looks_numeric;

/// A line's tokens aligned to the schema's columns; `None` cells are null.
pub struct ShapedLine {
    pub cells: Vec<Option<String>>,
    /// Excess trailing tokens recovered as a description in tolerant mode.
    pub recovered: Option<String>,
}

pub fn apply(
    schema: &'static SectionSchema,
    tokens: &[String],
    ctx: &Extractor<'_>,
    lineno: usize,
) -> Result<ShapedLine, InpError> {
    let width = schema.fields.len();
    let result = match schema.shape {
        ShapeRule::Exact => fit(tokens, width, 0),
        ShapeRule::OptionalTail(n) => fit(tokens, width, n),
        ShapeRule::InsertMissing(index) => insert_missing(tokens, width, index),
        ShapeRule::Marker(rule) => marker(rule, tokens, schema, width),
        ShapeRule::Infiltration => infiltration(tokens, schema, ctx, lineno)?,
    };
    match result {
        Some(cells) => Ok(ShapedLine {
            cells,
            recovered: None,
        }),
        None => recover(schema, tokens, ctx, lineno),
    }
}

/// Straight mapping with up to `optional_tail` absent trailing columns.
fn fit(tokens: &[String], width: usize, optional_tail: usize) -> Option<Vec<Option<String>>> {
    if tokens.len() > width || tokens.len() + optional_tail < width {
        return None;
    }
    let mut cells: Vec<Option<String>> = tokens.iter().cloned().map(Some).collect();
    cells.resize(width, None);
    Some(cells)
}

fn insert_missing(tokens: &[String], width: usize, index: usize) -> Option<Vec<Option<String>>> {
    if tokens.len() == width {
        return fit(tokens, width, 0);
    }
    if tokens.len() + 1 != width {
        return None;
    }
    let mut cells: Vec<Option<String>> = tokens.iter().cloned().map(Some).collect();
    cells.insert(index, None);
    Some(cells)
}

/// Insert null runs at marker-dependent positions: `at` lists
/// `(column index, null count)` pairs applied left to right.
fn with_nulls(tokens: &[String], width: usize, at: &[(usize, usize)]) -> Option<Vec<Option<String>>> {
    let nulls: usize = at.iter().map(|(_, n)| n).sum();
    if tokens.len() + nulls != width {
        return None;
    }
    let mut cells: Vec<Option<String>> = tokens.iter().cloned().map(Some).collect();
    for &(index, count) in at {
        for offset in 0..count {
            cells.insert(index + offset, None);
        }
    }
    Some(cells)
}

fn marker(
    rule: MarkerRule,
    tokens: &[String],
    schema: &'static SectionSchema,
    width: usize,
) -> Option<Vec<Option<String>>> {
    if tokens.len() == width {
        return fit(tokens, width, 0);
    }
    match rule {
        MarkerRule::Divider => {
            let kind = tokens.get(3)?.to_ascii_uppercase();
            match kind.as_str() {
                // OVERFLOW carries none of the cutoff/curve/weir columns.
                "OVERFLOW" => with_nulls(tokens, width, &[(4, 5)]),
                // CUTOFF keeps CutoffFlow, skips CurveName and the weir block.
                "CUTOFF" => with_nulls(tokens, width, &[(5, 4)]),
                // TABULAR skips CutoffFlow, keeps CurveName, skips the weir block.
                "TABULAR" => with_nulls(tokens, width, &[(4, 1), (6, 3)]),
                // WEIR skips CutoffFlow and CurveName, keeps the weir block.
                "WEIR" => with_nulls(tokens, width, &[(4, 2)]),
                _ => None,
            }
        }
        MarkerRule::Storage => {
            let curve = tokens.get(4)?.to_ascii_uppercase();
            match curve.as_str() {
                // TABULAR names a curve and carries no coefficients.
                "TABULAR" => storage_fit(tokens, width, &[(6, 3)]),
                // FUNCTIONAL carries coefficients and no curve name.
                "FUNCTIONAL" => storage_fit(tokens, width, &[(5, 1)]),
                _ => None,
            }
        }
        MarkerRule::Outlet => {
            let outlet_type = tokens.get(4)?.to_ascii_uppercase();
            if outlet_type.starts_with("FUNCTIONAL") {
                with_nulls(tokens, width, &[(7, 1)])
            } else if outlet_type.starts_with("TABULAR") {
                with_nulls(tokens, width, &[(5, 2)])
            } else {
                None
            }
        }
        MarkerRule::BuildUp => {
            // Seven-token lines omit either Coeff3 or TimeSeries; the token in
            // the contested position tells them apart.
            if tokens.len() + 1 != width {
                return None;
            }
            let coeff3 = field_index(schema, "Coeff3").unwrap_or_default();
            if looks_numeric(&tokens[coeff3]) {
                with_nulls(tokens, width, &[(coeff3 + 1, 1)])
            } else {
                with_nulls(tokens, width, &[(coeff3, 1)])
            }
        }
        MarkerRule::RainGage => {
            // A TIMESERIES source has no station or units columns.
            if tokens.len() + 2 == width
                && tokens.get(4).map(|t| t.eq_ignore_ascii_case("TIMESERIES")) == Some(true)
            {
                fit(tokens, width, 2)
            } else {
                None
            }
        }
    }
}

/// Storage lines may omit the three trailing seepage columns in either curve
/// variant; a short line nulls them alongside the marker-dependent nulls.
fn storage_fit(
    tokens: &[String],
    width: usize,
    at: &[(usize, usize)],
) -> Option<Vec<Option<String>>> {
    with_nulls(tokens, width, at).or_else(|| {
        let mut cells = with_nulls(tokens, width - 3, at)?;
        cells.resize(width, None);
        Some(cells)
    })
}

/// Place the active variant's tokens into the union column layout, leaving the
/// inactive variant's columns null.
fn infiltration(
    tokens: &[String],
    schema: &'static SectionSchema,
    ctx: &Extractor<'_>,
    lineno: usize,
) -> Result<Option<Vec<Option<String>>>, InpError> {
    let method = ctx.infiltration.ok_or_else(|| {
        InpError::format(
            schema.label,
            Some(lineno),
            "cannot extract infiltration lines without an INFILTRATION option",
        )
    })?;
    let active = match method {
        InfiltrationKind::GreenAmpt => INFILTRATION_GREEN_AMPT,
        InfiltrationKind::Horton => INFILTRATION_HORTON,
    };
    if tokens.len() != active.len() {
        return Ok(None);
    }
    let mut cells: Vec<Option<String>> = vec![None; schema.fields.len()];
    for (field_name, token) in active.iter().zip(tokens) {
        let index = field_index(schema, field_name).expect("variant field in union table");
        cells[index] = Some(token.clone());
    }
    Ok(Some(cells))
}

/// Tolerant-mode fallbacks: pad missing trailing columns, or peel excess
/// non-numeric trailing tokens off as a recovered description.
fn recover(
    schema: &'static SectionSchema,
    tokens: &[String],
    ctx: &Extractor<'_>,
    lineno: usize,
) -> Result<ShapedLine, InpError> {
    let width = schema.fields.len();
    if ctx.recovery == Recovery::Tolerant {
        if tokens.len() < width {
            return Ok(ShapedLine {
                cells: fit(tokens, width, width).expect("short line pads"),
                recovered: None,
            });
        }
        let extra = &tokens[width..];
        if !extra.is_empty() && extra.iter().all(|t| !looks_numeric(t)) {
            return Ok(ShapedLine {
                cells: fit(&tokens[..width], width, 0).expect("exact prefix fits"),
                recovered: Some(extra.join(" ")),
            });
        }
    }
    Err(InpError::format(
        schema.label,
        Some(lineno),
        format!(
            "line with {} tokens matches no accepted shape (expected {} columns)",
            tokens.len(),
            width
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inp::schema::{self, SectionKind};

    fn shape(kind: SectionKind, line: &str) -> Result<Vec<Option<String>>, InpError> {
        let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        let lines: Vec<String> = Vec::new();
        let ctx = Extractor {
            lines: &lines,
            base: 0,
            recovery: Recovery::Strict,
            infiltration: Some(InfiltrationKind::Horton),
        };
        apply(schema::schema(kind), &tokens, &ctx, 1).map(|s| s.cells)
    }

    #[test]
    fn test_divider_variants() {
        let cells = shape(SectionKind::Dividers, "D1 3.0 C2 OVERFLOW 10 0 0 0").unwrap();
        assert_eq!(cells[3].as_deref(), Some("OVERFLOW"));
        assert!(cells[4..9].iter().all(Option::is_none));
        assert_eq!(cells[9].as_deref(), Some("10"));

        let cells = shape(SectionKind::Dividers, "D2 3.0 C2 TABULAR DC1 10 0 0 0").unwrap();
        assert!(cells[4].is_none());
        assert_eq!(cells[5].as_deref(), Some("DC1"));
        assert!(cells[6..9].iter().all(Option::is_none));

        let cells =
            shape(SectionKind::Dividers, "D3 3.0 C2 WEIR 1.5 2.2 0.8 10 0 0 0").unwrap();
        assert!(cells[4].is_none() && cells[5].is_none());
        assert_eq!(cells[6].as_deref(), Some("1.5"));

        let cells = shape(SectionKind::Dividers, "D4 3.0 C2 CUTOFF 2.5 10 0 0 0").unwrap();
        assert_eq!(cells[4].as_deref(), Some("2.5"));
        assert!(cells[5..9].iter().all(Option::is_none));
    }

    #[test]
    fn test_storage_variants_and_seepage_tail() {
        let cells =
            shape(SectionKind::Storage, "S1 0 20 0 FUNCTIONAL 1000 0 0 0 0").unwrap();
        assert!(cells[5].is_none());
        assert_eq!(cells[6].as_deref(), Some("1000"));
        assert!(cells[11..].iter().all(Option::is_none));

        let cells =
            shape(SectionKind::Storage, "S2 0 20 0 TABULAR SC1 0 0 4 0.5 0.25").unwrap();
        assert_eq!(cells[5].as_deref(), Some("SC1"));
        assert!(cells[6..9].iter().all(Option::is_none));
        assert_eq!(cells[11].as_deref(), Some("4"));
    }

    #[test]
    fn test_outlet_variants() {
        let cells =
            shape(SectionKind::Outlets, "O1 J1 J2 0 FUNCTIONAL/DEPTH 1.2 2 NO").unwrap();
        assert!(cells[7].is_none());
        assert_eq!(cells[5].as_deref(), Some("1.2"));

        let cells = shape(SectionKind::Outlets, "O2 J1 J2 0 TABULAR/HEAD RC1 NO").unwrap();
        assert!(cells[5].is_none() && cells[6].is_none());
        assert_eq!(cells[7].as_deref(), Some("RC1"));
    }

    #[test]
    fn test_buildup_numeric_sniff() {
        let cells = shape(SectionKind::BuildUp, "RES TSS POW 50 2 0.5 AREA").unwrap();
        assert_eq!(cells[5].as_deref(), Some("0.5"));
        assert!(cells[6].is_none());

        let cells = shape(SectionKind::BuildUp, "RES TSS EXT 50 2 TS1 AREA").unwrap();
        assert!(cells[5].is_none());
        assert_eq!(cells[6].as_deref(), Some("TS1"));
    }

    #[test]
    fn test_raingage_timeseries_source() {
        let cells =
            shape(SectionKind::RainGages, "G1 INTENSITY 1:00 1.0 TIMESERIES TS1").unwrap();
        assert_eq!(cells[5].as_deref(), Some("TS1"));
        assert!(cells[6].is_none() && cells[7].is_none());
    }

    #[test]
    fn test_infiltration_variant_chooses_columns() {
        let cells = shape(SectionKind::Infiltration, "S1 3.0 0.5 4 7 0").unwrap();
        // Horton: MaxRate..MaxInfil populated, Green-Ampt columns null.
        assert!(cells[1].is_none() && cells[2].is_none() && cells[3].is_none());
        assert_eq!(cells[4].as_deref(), Some("3.0"));
        assert_eq!(cells[8].as_deref(), Some("0"));
    }
}
