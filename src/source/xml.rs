//! XML step tables
//!
//! Each record element (default `<step>`) is one row. Fields come from the
//! record's attributes and from child elements named after the columns:
//!
//! ```xml
//! <steps>
//!   <step id="S1" action="open" data="url=https://example.com"/>
//!   <step>
//!     <id>S2</id>
//!     <qryFunction>gettitle</qryFunction>
//!     <data>saveas=title</data>
//!   </step>
//! </steps>
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::common::{Error, Result};

use super::{column_index, ROW_WIDTH};

/// Record element used when the source spec names none
pub const DEFAULT_RECORD: &str = "step";

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn record_from_attributes(e: &BytesStart<'_>, source: &str) -> Result<Vec<String>> {
    let mut row = vec![String::new(); ROW_WIDTH];
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::source_parse(source, err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        if let Some(index) = column_index(&key) {
            let value = attr
                .unescape_value()
                .map_err(|err| Error::source_parse(source, err.to_string()))?;
            row[index] = value.to_string();
        }
    }
    Ok(row)
}

/// Parse every `record` element of `content` into a raw row
pub fn parse_records(content: &str, record: &str, source: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut rows = Vec::new();
    let mut current: Option<Vec<String>> = None;
    let mut field: Option<usize> = None;
    // depth inside the current record, 0 = directly under the record element
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::source_parse(
                source,
                format!("at byte {}: {}", reader.buffer_position(), e),
            )
        })?;

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                if current.is_some() {
                    if depth == 0 {
                        field = column_index(&name);
                    }
                    depth += 1;
                } else if name.eq_ignore_ascii_case(record) {
                    current = Some(record_from_attributes(&e, source)?);
                    depth = 0;
                }
            }
            Event::Empty(e) => {
                if current.is_none() && local_name(&e).eq_ignore_ascii_case(record) {
                    rows.push(record_from_attributes(&e, source)?);
                }
            }
            Event::Text(t) => {
                if let (Some(row), Some(index)) = (current.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::source_parse(source, e.to_string()))?;
                    row[index].push_str(&text);
                }
            }
            Event::CData(t) => {
                if let (Some(row), Some(index)) = (current.as_mut(), field) {
                    row[index].push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                if current.is_some() {
                    if depth == 0 {
                        if let Some(row) = current.take() {
                            rows.push(row);
                        }
                    } else {
                        depth -= 1;
                        if depth == 0 {
                            field = None;
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        return Err(Error::source_parse(
            source,
            format!("unterminated <{}> record", record),
        ));
    }

    Ok(rows)
}
