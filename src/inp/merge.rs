//! Entity merging and splitting
//!
//!     The section store keeps records exactly as extracted, one list per
//!     section. The merged view is computed on demand: subclass sections
//!     (coordinates, tags, cross sections, subareas, ...) join onto their
//!     primary by name, and composite groups (inflows + dry weather flow) fold
//!     into one entity per shared identity.
//!
//!     Splitting is the exact inverse and powers `add_elements`: a merged
//!     entity contributes one record to each section that claims some of its
//!     fields, so a round trip through merge and split is lossless.

use std::collections::HashMap;

use crate::inp::error::InpError;
use crate::inp::record::{Record, NAME, ORDINAL};
use crate::inp::schema::{
    self, CompositeSpec, DefaultValue, JoinSpec, SectionKind, SectionSchema, SplitWhen,
};
use crate::inp::value::Value;

/// Section store type: extracted records keyed by section.
pub type Store = HashMap<SectionKind, Vec<Record>>;

fn default_value(value: &DefaultValue) -> Value {
    match value {
        DefaultValue::Num(n) => Value::Number(*n),
        DefaultValue::Text(s) => Value::text(*s),
    }
}

/// Fields a join copies from a secondary record: everything except the join
/// key and bookkeeping ordinals.
fn copyable(field: &str) -> bool {
    field != NAME && field != ORDINAL
}

/// Compute the merged view of a primary section: clones the primaries and
/// attaches each declared secondary's fields.
pub fn join_subclasses(
    schema: &'static SectionSchema,
    primaries: &[Record],
    store: &Store,
) -> Result<Vec<Record>, InpError> {
    let mut merged: Vec<Record> = primaries.to_vec();
    if merged.is_empty() {
        return Ok(merged);
    }
    for join in schema.joins {
        let secondary_schema = schema::schema(join.secondary);
        let empty = Vec::new();
        let records = store.get(&join.secondary).unwrap_or(&empty);
        let index = index_secondary(schema, join, records);

        for primary in &mut merged {
            let key = primary.render("Name");
            match index.get(key.as_str()) {
                Some(secondary) => {
                    for (field, value) in secondary.fields() {
                        if copyable(field) {
                            primary.set(field, value.clone());
                        }
                    }
                }
                None if join.required => {
                    return Err(InpError::join(
                        schema.label,
                        format!(
                            "'{}' has no matching {} entry",
                            key, secondary_schema.label
                        ),
                    ));
                }
                None => {
                    for (field, value) in join.defaults {
                        primary.set(*field, default_value(value));
                    }
                }
            }
        }
    }
    Ok(merged)
}

/// Index a secondary section by join key. The shared tags section is filtered
/// to the primary's discriminator and contributes only its tag value.
fn index_secondary<'a>(
    primary: &'static SectionSchema,
    join: &JoinSpec,
    records: &'a [Record],
) -> HashMap<&'a str, Record> {
    let mut index = HashMap::new();
    if join.secondary == SectionKind::Tags {
        let tag_type = primary.tag_type.unwrap_or_default();
        for record in records {
            if record.text("Type") == Some(tag_type) {
                if let (Some(name), Some(tag)) = (record.text("Name"), record.get("Tag")) {
                    let mut slim = Record::new();
                    slim.set("Tag", tag.clone());
                    index.insert(name, slim);
                }
            }
        }
    } else {
        for record in records {
            if let Some(name) = record.text("Name") {
                index.insert(name, record.clone());
            }
        }
    }
    index
}

/// Fold a composite group's member sections into one entity per identity.
/// Members may each contribute a partial record; a field set to two different
/// values by two members is a join conflict.
pub fn merge_composite(spec: &CompositeSpec, store: &Store) -> Result<Vec<Record>, InpError> {
    let mut merged: Vec<Record> = Vec::new();
    let mut by_identity: HashMap<String, usize> = HashMap::new();

    for member in spec.members {
        let empty = Vec::new();
        for record in store.get(member).unwrap_or(&empty) {
            let identity = record.name().unwrap_or_default().to_string();
            let slot = *by_identity.entry(identity.clone()).or_insert_with(|| {
                let mut entity = Record::new();
                entity.set(NAME, Value::text(identity.clone()));
                merged.push(entity);
                merged.len() - 1
            });
            let entity = &mut merged[slot];
            for (field, value) in record.fields() {
                if field == ORDINAL {
                    continue;
                }
                match entity.get(field) {
                    Some(existing) if existing != value && field != NAME => {
                        return Err(InpError::join(
                            spec.name,
                            format!(
                                "members disagree on {} for '{}'",
                                field, identity
                            ),
                        ));
                    }
                    _ => entity.set(field, value.clone()),
                }
            }
        }
    }
    Ok(merged)
}

/// Records produced by splitting merged entities back into sections.
pub struct SplitOutput {
    pub primary: Vec<Record>,
    pub secondaries: Vec<(SectionKind, Vec<Record>)>,
}

/// Inverse of [`join_subclasses`]: distribute each merged entity's fields over
/// its primary section and whichever secondary sections claim a share.
pub fn split_subclasses(schema: &'static SectionSchema, entities: &[Record]) -> SplitOutput {
    let mut primary = Vec::with_capacity(entities.len());
    let mut secondaries: Vec<(SectionKind, Vec<Record>)> = schema
        .joins
        .iter()
        .map(|join| (join.secondary, Vec::new()))
        .collect();

    for entity in entities {
        let mut record = Record::new();
        for field in schema.fields {
            if let Some(value) = entity.get(field.name) {
                record.set(field.name, value.clone());
            }
        }
        if let Some(desc) = entity.get(schema.desc_field) {
            record.set(schema.desc_field, desc.clone());
        }
        primary.push(record);

        for (join, (_, out)) in schema.joins.iter().zip(secondaries.iter_mut()) {
            if let Some(secondary) = split_one(schema, join, entity) {
                out.push(secondary);
            }
        }
    }
    secondaries.retain(|(_, records)| !records.is_empty());
    SplitOutput {
        primary,
        secondaries,
    }
}

fn split_one(
    primary: &'static SectionSchema,
    join: &JoinSpec,
    entity: &Record,
) -> Option<Record> {
    if join.secondary == SectionKind::Tags {
        let tag = entity.get("Tag")?;
        let mut record = Record::new();
        record.set("Type", Value::text(primary.tag_type.unwrap_or_default()));
        record.set("Name", Value::text(entity.render("Name")));
        record.set("Tag", tag.clone());
        return Some(record);
    }

    let secondary = schema::schema(join.secondary);
    let mut record = Record::new();
    record.set("Name", Value::text(entity.render("Name")));
    let mut any_set = false;
    let mut differs = false;
    for field in secondary.fields {
        if field.name == "Name" {
            continue;
        }
        match entity.get(field.name) {
            Some(value) => {
                any_set = true;
                let default = join
                    .defaults
                    .iter()
                    .find(|(name, _)| *name == field.name)
                    .map(|(_, d)| default_value(d));
                if default.as_ref() != Some(value) {
                    differs = true;
                }
                record.set(field.name, value.clone());
            }
            None => {
                if join.defaults.iter().any(|(name, _)| *name == field.name) {
                    differs = true;
                }
            }
        }
    }
    if let Some(desc) = entity.get(secondary.desc_field) {
        any_set = true;
        differs = true;
        record.set(secondary.desc_field, desc.clone());
    }

    let wanted = match join.split_when {
        SplitWhen::Always => true,
        SplitWhen::AnyFieldSet => any_set,
        SplitWhen::FieldSet(field) => entity.contains(field),
        SplitWhen::DiffersFromDefaults => any_set && differs,
    };
    wanted.then_some(record)
}

/// Inverse of [`merge_composite`]: each member section receives a record for
/// every entity that sets at least one of that member's own fields.
pub fn split_composite(
    spec: &CompositeSpec,
    entities: &[Record],
) -> Vec<(SectionKind, Vec<Record>)> {
    let mut outputs: Vec<(SectionKind, Vec<Record>)> = spec
        .members
        .iter()
        .map(|member| (*member, Vec::new()))
        .collect();

    for entity in entities {
        for (member, out) in outputs.iter_mut() {
            let member_schema = schema::schema(*member);
            let own = |field: &str| !spec.identity.contains(&field);
            let claims = member_schema
                .fields
                .iter()
                .any(|f| own(f.name) && entity.contains(f.name))
                || entity.contains(member_schema.desc_field);
            if !claims {
                continue;
            }
            let mut record = Record::new();
            for field in spec.identity {
                if let Some(value) = entity.get(field) {
                    record.set(*field, value.clone());
                }
            }
            for field in member_schema.fields {
                if own(field.name) {
                    if let Some(value) = entity.get(field.name) {
                        record.set(field.name, value.clone());
                    }
                }
            }
            if let Some(desc) = entity.get(member_schema.desc_field) {
                record.set(member_schema.desc_field, desc.clone());
            }
            record.set(NAME, Value::text(entity.render(NAME)));
            out.push(record);
        }
    }
    outputs.retain(|(_, records)| !records.is_empty());
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inp::schema::SectionKind;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut rec = Record::new();
        for (field, value) in pairs {
            rec.set(*field, value.clone());
        }
        rec
    }

    fn store(sections: Vec<(SectionKind, Vec<Record>)>) -> Store {
        sections.into_iter().collect()
    }

    #[test]
    fn test_junction_gains_coordinates_and_tag() {
        let primaries = vec![record(&[
            ("Name", Value::text("J1")),
            ("InvertElevation", Value::Number(20.5)),
        ])];
        let store = store(vec![
            (
                SectionKind::Coordinates,
                vec![record(&[
                    ("Name", Value::text("J1")),
                    ("XCoordinate", Value::Number(10.0)),
                    ("YCoordinate", Value::Number(20.0)),
                ])],
            ),
            (
                SectionKind::Tags,
                vec![
                    record(&[
                        ("Type", Value::text("Node")),
                        ("Name", Value::text("J1")),
                        ("Tag", Value::text("basin-a")),
                    ]),
                    record(&[
                        ("Type", Value::text("Link")),
                        ("Name", Value::text("J1")),
                        ("Tag", Value::text("wrong-type")),
                    ]),
                ],
            ),
        ]);
        let merged =
            join_subclasses(schema::schema(SectionKind::Junctions), &primaries, &store).unwrap();
        assert_eq!(merged[0].number("XCoordinate"), Some(10.0));
        assert_eq!(merged[0].text("Tag"), Some("basin-a"));
        assert!(!merged[0].contains("Type"));
    }

    #[test]
    fn test_required_join_missing_is_an_error() {
        let primaries = vec![record(&[("Name", Value::text("C1"))])];
        let err = join_subclasses(
            schema::schema(SectionKind::Conduits),
            &primaries,
            &Store::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("[XSECTIONS]"));
    }

    #[test]
    fn test_optional_losses_fill_defaults() {
        let primaries = vec![record(&[("Name", Value::text("C1"))])];
        let store = store(vec![(
            SectionKind::XSections,
            vec![record(&[
                ("Name", Value::text("C1")),
                ("PipeShape", Value::text("CIRCULAR")),
            ])],
        )]);
        let merged =
            join_subclasses(schema::schema(SectionKind::Conduits), &primaries, &store).unwrap();
        assert_eq!(merged[0].number("EntryLoss"), Some(0.0));
        assert_eq!(merged[0].text("FlapGate"), Some("NO"));
    }

    #[test]
    fn test_composite_merges_by_node_and_parameter() {
        let spec = &schema::COMPOSITES[0];
        let store = store(vec![
            (
                SectionKind::Inflows,
                vec![record(&[
                    ("Node", Value::text("J1")),
                    ("Parameter", Value::text("FLOW")),
                    ("TimeSeries", Value::text("TS1")),
                    (NAME, Value::text("J1:FLOW")),
                ])],
            ),
            (
                SectionKind::Dwf,
                vec![record(&[
                    ("Node", Value::text("J1")),
                    ("Parameter", Value::text("FLOW")),
                    ("AvgValue", Value::Number(0.5)),
                    (NAME, Value::text("J1:FLOW")),
                ])],
            ),
        ]);
        let merged = merge_composite(spec, &store).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text("TimeSeries"), Some("TS1"));
        assert_eq!(merged[0].number("AvgValue"), Some(0.5));
    }

    #[test]
    fn test_composite_conflict_is_an_error() {
        let spec = &schema::COMPOSITES[0];
        let store = store(vec![
            (
                SectionKind::Inflows,
                vec![record(&[
                    ("Node", Value::text("J1")),
                    ("Parameter", Value::text("FLOW")),
                    (NAME, Value::text("J1:FLOW")),
                ])],
            ),
            (
                SectionKind::Dwf,
                vec![record(&[
                    ("Node", Value::text("J1")),
                    ("Parameter", Value::text("flow")),
                    (NAME, Value::text("J1:FLOW")),
                ])],
            ),
        ]);
        let err = merge_composite(spec, &store).unwrap_err();
        assert!(err.to_string().contains("disagree"));
    }

    #[test]
    fn test_split_is_inverse_of_join() {
        let entity = record(&[
            ("Name", Value::text("J1")),
            ("InvertElevation", Value::Number(20.5)),
            ("MaxDepth", Value::Number(15.0)),
            ("XCoordinate", Value::Number(10.0)),
            ("YCoordinate", Value::Number(20.0)),
            ("Tag", Value::text("basin-a")),
        ]);
        let split = split_subclasses(schema::schema(SectionKind::Junctions), &[entity]);
        assert_eq!(split.primary.len(), 1);
        assert!(!split.primary[0].contains("XCoordinate"));
        let kinds: Vec<_> = split.secondaries.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![SectionKind::Coordinates, SectionKind::Tags]);
        let tags = &split.secondaries[1].1[0];
        assert_eq!(tags.text("Type"), Some("Node"));
        assert_eq!(tags.text("Tag"), Some("basin-a"));
    }

    #[test]
    fn test_split_skips_default_losses() {
        let entity = record(&[
            ("Name", Value::text("C1")),
            ("EntryLoss", Value::Number(0.0)),
            ("ExitLoss", Value::Number(0.0)),
            ("AvgLoss", Value::Number(0.0)),
            ("FlapGate", Value::text("NO")),
            ("PipeShape", Value::text("CIRCULAR")),
            ("Geom1", Value::text("4")),
        ]);
        let split = split_subclasses(schema::schema(SectionKind::Conduits), &[entity]);
        let kinds: Vec<_> = split.secondaries.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![SectionKind::XSections]);
    }

    #[test]
    fn test_split_composite_routes_fields_to_members() {
        let spec = &schema::COMPOSITES[0];
        let entity = record(&[
            ("Node", Value::text("J1")),
            ("Parameter", Value::text("FLOW")),
            ("TimeSeries", Value::text("TS1")),
            ("AvgValue", Value::Number(0.5)),
            (NAME, Value::text("J1:FLOW")),
        ]);
        let outputs = split_composite(spec, &[entity]);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, SectionKind::Inflows);
        assert_eq!(outputs[0].1[0].text("TimeSeries"), Some("TS1"));
        assert_eq!(outputs[1].1[0].number("AvgValue"), Some(0.5));
        assert!(!outputs[0].1[0].contains("AvgValue"));
    }
}
