///! Minimal VOTable reader
///!
///! SIMBAD and VizieR answer cone searches with VOTable XML: RESOURCE/TABLE
///! elements carrying FIELD declarations followed by TABLEDATA rows. This
///! reader extracts every TABLE into a [`VoTable`], converting each TD cell
///! according to the declared FIELD datatype. Only the subset of the format
///! those services actually emit is handled; BINARY/FITS serializations are
///! not.

use anyhow::{Context, Result, bail};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use ztf_common::CellValue;

#[derive(Debug, Clone)]
pub struct VoField {
    pub name: String,
    pub datatype: String,
}

#[derive(Debug, Clone, Default)]
pub struct VoTable {
    pub name: Option<String>,
    pub fields: Vec<VoField>,
    pub rows: Vec<Vec<CellValue>>,
}

impl VoTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Rows keyed by column name, the shape the record builder consumes.
    pub fn to_rows(&self) -> Vec<super::types::RawRow> {
        self.rows
            .iter()
            .map(|row| {
                self.fields
                    .iter()
                    .zip(row.iter())
                    .map(|(field, cell)| (field.name.clone(), cell.clone()))
                    .collect()
            })
            .collect()
    }
}

fn attr(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    Ok(element
        .try_get_attribute(name)?
        .map(|a| a.unescape_value().map(|v| v.into_owned()))
        .transpose()?)
}

fn cell_from_text(datatype: &str, text: &str) -> CellValue {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return CellValue::Null;
    }
    match datatype {
        "float" | "double" => match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Float(v),
            _ => CellValue::Null,
        },
        "short" | "int" | "long" | "unsignedByte" => match trimmed.parse::<i64>() {
            Ok(v) => CellValue::Int(v),
            Err(_) => CellValue::Null,
        },
        "boolean" => match trimmed {
            "true" | "T" | "t" | "1" => CellValue::Bool(true),
            "false" | "F" | "f" | "0" => CellValue::Bool(false),
            _ => CellValue::Null,
        },
        // char, unicodeChar, and anything unrecognized stay textual
        _ => CellValue::Text(text.to_string()),
    }
}

/// Parse a VOTable document into its tables, in document order.
pub fn parse_votable(xml: &str) -> Result<Vec<VoTable>> {
    let mut reader = Reader::from_reader(xml.as_bytes());

    let mut tables: Vec<VoTable> = Vec::new();
    let mut current: Option<VoTable> = None;
    let mut row: Option<Vec<CellValue>> = None;
    let mut cell_text: Option<String> = None;
    let mut saw_votable_root = false;

    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .context("malformed VOTable XML")?
        {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"VOTABLE" => saw_votable_root = true,
                b"TABLE" => {
                    current = Some(VoTable {
                        name: attr(e, "name")?,
                        ..VoTable::default()
                    });
                }
                b"FIELD" => field_decl(e, current.as_mut())?,
                b"TR" => row = Some(Vec::new()),
                b"TD" => cell_text = Some(String::new()),
                _ => {}
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"FIELD" => field_decl(e, current.as_mut())?,
                b"TD" => {
                    if let Some(row) = row.as_mut() {
                        row.push(CellValue::Null);
                    }
                }
                _ => {}
            },
            Event::Text(ref t) => {
                if let Some(text) = cell_text.as_mut() {
                    text.push_str(&t.unescape().context("malformed VOTable text")?);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"TD" => {
                    if let (Some(table), Some(row), Some(text)) =
                        (current.as_ref(), row.as_mut(), cell_text.take())
                    {
                        let datatype = table
                            .fields
                            .get(row.len())
                            .map(|f| f.datatype.as_str())
                            .unwrap_or("char");
                        row.push(cell_from_text(datatype, &text));
                    }
                }
                b"TR" => {
                    if let (Some(table), Some(row)) = (current.as_mut(), row.take()) {
                        table.rows.push(row);
                    }
                }
                b"TABLE" => {
                    if let Some(table) = current.take() {
                        tables.push(table);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_votable_root {
        bail!("response is not a VOTable document");
    }
    Ok(tables)
}

fn field_decl(element: &BytesStart<'_>, table: Option<&mut VoTable>) -> Result<()> {
    let Some(table) = table else { return Ok(()) };
    let name = attr(element, "name")?.unwrap_or_default();
    let datatype = attr(element, "datatype")?.unwrap_or_else(|| "char".to_string());
    table.fields.push(VoField { name, datatype });
    Ok(())
}
