///! JSON-friendly table values
///!
///! Catalog transports hand back heterogeneous native cells: plain strings,
///! numbers, raw byte strings, occasionally something else entirely. The
///! presentation layer only consumes JSON-safe scalars, so every cell goes
///! through the ordered fallback chain in [`CellValue::to_json`]. The order
///! of that chain is a public contract.

use serde_json::Value;

/// One table cell as received from a catalog transport.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Float(f64),
    Int(i64),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl CellValue {
    /// Infer a cell from free text: integer, then float, then plain text.
    /// Used for TSV bodies where the transport carries no type information.
    pub fn infer(raw: &str) -> CellValue {
        let s = raw.trim();
        if s.is_empty() {
            return CellValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        CellValue::Text(raw.to_string())
    }

    pub fn from_json(value: &Value) -> CellValue {
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    CellValue::Int(i)
                } else {
                    CellValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Normalize to a JSON-safe scalar.
    ///
    /// Ordered fallback chain: strings pass through unchanged, numeric values
    /// become floats, byte strings are decoded to text, anything else falls
    /// back to its display-string conversion.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Value::Number(n),
                None => Value::Null,
            },
            CellValue::Int(i) => Value::Number(
                serde_json::Number::from_f64(*i as f64).expect("finite integer as f64"),
            ),
            CellValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => Value::String(s.to_string()),
                Err(_) => Value::String(String::from_utf8_lossy(b).into_owned()),
            },
            CellValue::Bool(b) => Value::String(b.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(f) => Some(*f),
            CellValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Text form used when a cell has to appear inside generated markup.
    pub fn display(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            CellValue::Bool(b) => b.to_string(),
        }
    }
}
