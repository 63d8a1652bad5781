//! Typed cell values
//!
//!     Every column of every section schema declares a `FieldType`; parsing a data
//!     line turns whitespace-delimited tokens into `Value`s through that table.
//!     Absent optional columns simply have no entry in the record, so `Value`
//!     itself never models null.
//!
//!     Rendering follows the on-disk convention of the format: a float that holds
//!     an integral value is written without a decimal point, so `4.0` round-trips
//!     as `4`.

use serde::Serialize;

/// Semantic type of a schema column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldType {
    Text,
    Number,
    Int,
}

impl FieldType {
    /// Parse a raw token into a `Value`, or report why it doesn't fit.
    pub fn parse(self, raw: &str) -> Result<Value, String> {
        match self {
            FieldType::Text => Ok(Value::Text(raw.to_string())),
            FieldType::Number => raw
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| format!("'{}' is not a number", raw)),
            FieldType::Int => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("'{}' is not an integer", raw)),
        }
    }
}

/// One parsed cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(f64),
    Int(i64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Render the value the way the serializer writes it.
    ///
    /// Integral floats drop their fractional part; everything else uses the
    /// shortest faithful representation.
    pub fn render(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }
}

/// Shape sniff used by tolerant-mode recovery and the continuation-line
/// heuristics (curves, patterns, build-up): does the token look numeric?
pub fn looks_numeric(raw: &str) -> bool {
    raw.parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_float_renders_as_integer() {
        assert_eq!(Value::Number(4.0).render(), "4");
        assert_eq!(Value::Number(-12.0).render(), "-12");
    }

    #[test]
    fn test_fractional_float_keeps_fraction() {
        assert_eq!(Value::Number(0.015).render(), "0.015");
    }

    #[test]
    fn test_parse_rejects_mistyped_tokens() {
        assert!(FieldType::Number.parse("TABULAR").is_err());
        assert!(FieldType::Int.parse("1.5").is_err());
        assert_eq!(FieldType::Number.parse("2.5"), Ok(Value::Number(2.5)));
    }

    #[test]
    fn test_looks_numeric() {
        assert!(looks_numeric("1.0"));
        assert!(looks_numeric("-3e2"));
        assert!(!looks_numeric("MONTHLY"));
    }
}
