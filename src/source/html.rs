//! HTML step tables
//!
//! Reads the rows of one `<table>` (the first one, or the one whose `id`
//! matches the selector). Rows made only of `<th>` cells are headers and
//! are skipped. End-tag checking is relaxed since hand-written HTML often
//! leaves `<td>` and `<tr>` unclosed.

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::common::{Error, Result};

fn tag(e: &[u8]) -> String {
    String::from_utf8_lossy(e).to_ascii_lowercase()
}

fn html_id(e: &BytesStart<'_>) -> Option<String> {
    e.html_attributes()
        .flatten()
        .find(|a| a.key.as_ref().eq_ignore_ascii_case(b"id"))
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Resolve named and numeric character references; text that is not valid
/// escaped markup (a bare `&`) is kept as written
fn decode_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match unescape_with(&text, resolve_html5_entity) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => text.into_owned(),
    }
}

#[derive(Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    row: Option<(Vec<String>, bool)>,
    cell: Option<String>,
}

impl TableState {
    fn close_cell(&mut self) {
        if let Some(text) = self.cell.take() {
            if let Some((cells, _)) = self.row.as_mut() {
                cells.push(collapse_ws(&text));
            }
        }
    }

    fn close_row(&mut self) {
        self.close_cell();
        if let Some((cells, header_only)) = self.row.take() {
            if !header_only {
                self.rows.push(cells);
            }
        }
    }

    fn line_break(&mut self) {
        if let Some(cell) = self.cell.as_mut() {
            cell.push(' ');
        }
    }

    fn open_cell(&mut self, header: bool) {
        self.close_cell();
        let (_, header_only) = self.row.get_or_insert_with(|| (Vec::new(), true));
        if !header {
            *header_only = false;
        }
        self.cell = Some(String::new());
    }
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the selected table of `content` into raw rows
pub fn parse_table(content: &str, table_id: Option<&str>, source: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_str(content);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.trim_text(false);

    let mut state = TableState::default();
    // nesting depth of tables; `target` is the depth of the selected table
    let mut depth = 0usize;
    let mut target: Option<usize> = None;
    let mut found = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::source_parse(source, e.to_string()))?;

        match event {
            Event::Start(e) => {
                let name = tag(e.local_name().as_ref());
                if name == "table" {
                    depth += 1;
                    let selected = match table_id {
                        Some(id) => html_id(&e).is_some_and(|t| t == id),
                        None => true,
                    };
                    if target.is_none() && !found && selected {
                        target = Some(depth);
                        found = true;
                    }
                } else if target == Some(depth) {
                    match name.as_str() {
                        "tr" => {
                            state.close_row();
                            state.row = Some((Vec::new(), true));
                        }
                        "td" => state.open_cell(false),
                        "th" => state.open_cell(true),
                        "br" => state.line_break(),
                        _ => {}
                    }
                }
            }
            Event::Empty(e) => {
                if target == Some(depth) && tag(e.local_name().as_ref()) == "br" {
                    state.line_break();
                }
            }
            Event::Text(t) => {
                if target == Some(depth) {
                    if let Some(cell) = state.cell.as_mut() {
                        cell.push_str(&decode_text(&t));
                    }
                }
            }
            Event::CData(t) => {
                if target == Some(depth) {
                    if let Some(cell) = state.cell.as_mut() {
                        cell.push_str(&String::from_utf8_lossy(&t));
                    }
                }
            }
            Event::End(e) => {
                let name = tag(e.local_name().as_ref());
                if name == "table" {
                    if target == Some(depth) {
                        state.close_row();
                        target = None;
                    }
                    depth = depth.saturating_sub(1);
                } else if target == Some(depth) {
                    match name.as_str() {
                        "td" | "th" => state.close_cell(),
                        "tr" => state.close_row(),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    state.close_row();

    if !found {
        let what = table_id
            .map(|id| format!("no <table id=\"{}\">", id))
            .unwrap_or_else(|| "no <table>".to_string());
        return Err(Error::source_parse(source, what));
    }

    Ok(state.rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<body>
  <table id="meta"><tr><td>ignore</td></tr></table>
  <table id="steps">
    <tr><th>id</th><th>action</th></tr>
    <tr><td>S1</td><td>open</td><td></td><td></td><td></td><td>yes</td><td>url=a&amp;b</td><td>Open&nbsp;home</td></tr>
    <tr><td>S2<td>query<td>id<td>title<td>gettext</tr>
  </table>
</body>
</html>"#;

    #[test]
    fn test_selected_table_by_id() {
        let rows = parse_table(PAGE, Some("steps"), "t.html").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "S1");
        assert_eq!(rows[0][6], "url=a&b");
        assert_eq!(rows[0][7], "Open home");
        assert_eq!(rows[1], vec!["S2", "query", "id", "title", "gettext"]);
    }

    #[test]
    fn test_first_table_by_default() {
        let rows = parse_table(PAGE, None, "t.html").unwrap();
        assert_eq!(rows, vec![vec!["ignore".to_string()]]);
    }

    #[test]
    fn test_entities_and_line_breaks() {
        let rows = parse_table(
            "<table><tr><td>caf&eacute;&#160;x</td><td>a<br>b</td><td>c<br/>d</td><td>R&amp;D</td></tr></table>",
            None,
            "t.html",
        )
        .unwrap();
        assert_eq!(rows, vec![vec!["café x", "a b", "c d", "R&D"]]);
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let err = parse_table(PAGE, Some("nope"), "t.html").unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert!(parse_table("<p>no tables</p>", None, "t.html").is_err());
    }
}
