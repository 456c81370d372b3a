///! Cross-match result rows and per-catalog metadata

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use ztf_common::{AngleUnit, CellValue};

/// Catalog object identifier. Most catalogs use designations ("V* RR Lyr",
/// "OGLE-BLG-ECL-123456"); VSX and the ZTF periodic catalog use integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    pub fn from_cell(cell: &CellValue) -> Option<RecordId> {
        match cell {
            CellValue::Int(i) => Some(RecordId::Int(*i)),
            CellValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                Some(RecordId::Int(*f as i64))
            }
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(RecordId::Text(trimmed.to_string()))
                }
            }
            CellValue::Bytes(b) => {
                let s = String::from_utf8_lossy(b);
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(RecordId::Text(trimmed.to_string()))
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{i}"),
            RecordId::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One cross-match row: identifier, position, separation from the query
/// point, a rendered identifier link, and the catalog-specific extras kept
/// as JSON-safe scalars. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogRecord {
    pub id: RecordId,
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub separation_arcsec: f64,
    /// HTML anchor (or POST-form markup) pointing at the catalog's own page
    /// for this object.
    pub link: String,
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Raw column name plus the label the presentation layer shows for it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub raw: &'static str,
    pub label: &'static str,
}

/// Static per-catalog metadata: which columns carry the identifier and the
/// coordinates, the RA unit, and the displayed column set.
#[derive(Debug, Clone, Copy)]
pub struct CatalogDescriptor {
    pub name: &'static str,
    pub id_column: &'static str,
    pub ra_column: &'static str,
    pub dec_column: &'static str,
    pub ra_unit: AngleUnit,
    /// Allow-list of displayed columns with labels. The pseudo-columns
    /// "link" and "separation" are generated, not fetched.
    pub columns: &'static [ColumnSpec],
}

impl CatalogDescriptor {
    pub fn label_for(&self, raw: &str) -> Option<&'static str> {
        self.columns
            .iter()
            .find(|c| c.raw == raw)
            .map(|c| c.label)
    }
}

/// One row of a transport response, keyed by raw column name.
pub type RawRow = BTreeMap<String, CellValue>;
