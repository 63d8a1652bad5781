//! Record type shared by the extractor, merge engine and serializer
//!
//!     A `Record` is one parsed line (or line group) of a section: a sparse map
//!     from field name to typed value. Column order lives on the schema, not the
//!     record, so the map only stores fields that are actually set; a null cell
//!     is simply an absent key.
//!
//!     Merged logical entities are the same type — subclass joins and composite
//!     unions add fields (and renamed description fields) onto the primary
//!     record in place.

use std::collections::HashMap;

use serde::Serialize;

use crate::inp::value::Value;

/// Field name under which synthesized ordinals are stored.
pub const ORDINAL: &str = "Ordinal";
/// Field name under which synthesized identities are stored.
pub const NAME: &str = "Name";
/// Field name under which a support file's content token is stored.
pub const FILE_TOKEN: &str = "FileToken";

/// One raw record or merged logical entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Record {
        Record::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_number)
    }

    pub fn int(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_int)
    }

    /// Render a field the way the serializer writes it; null renders empty.
    pub fn render(&self, field: &str) -> String {
        self.get(field).map(Value::render).unwrap_or_default()
    }

    /// The record's synthesized identity, when one has been assigned.
    pub fn name(&self) -> Option<&str> {
        self.text(NAME)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_field_renders_empty() {
        let rec = Record::new();
        assert_eq!(rec.render("MaxDepth"), "");
        assert!(!rec.contains("MaxDepth"));
    }

    #[test]
    fn test_text_and_number_accessors() {
        let mut rec = Record::new();
        rec.set("CurveName", Value::text("SC1"));
        rec.set("MaxDepth", Value::Number(15.0));
        assert_eq!(rec.text("CurveName"), Some("SC1"));
        assert_eq!(rec.number("MaxDepth"), Some(15.0));
        assert_eq!(rec.number("CurveName"), None);
    }
}
