//! Parsing of the free-form `data` column
//!
//! The column holds delimiter-separated `key=value` pairs. Keys are trimmed
//! and lowercased, values are trimmed. Entries without `=` or with an empty
//! key are dropped and reported back so the step can note them.

use std::collections::BTreeMap;

/// Parsed data column
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DataMap {
    pub entries: BTreeMap<String, String>,
    /// Raw entries that could not be parsed
    pub dropped: Vec<String>,
}

/// Parse `raw` into a map. Never fails; blank input yields an empty map.
pub fn parse_data(raw: &str, delimiter: char) -> DataMap {
    let mut map = DataMap::default();
    if raw.trim().is_empty() {
        return map;
    }

    for entry in raw.split(delimiter) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                map.entries
                    .insert(key.trim().to_lowercase(), value.trim().to_string());
            }
            _ => map.dropped.push(entry.to_string()),
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_empty() {
        assert_eq!(parse_data("", ','), DataMap::default());
        assert_eq!(parse_data("   ", ','), DataMap::default());
    }

    #[test]
    fn test_keys_lowercased_values_trimmed() {
        let map = parse_data(" PTP = SOF2 , SaveAs=title,param=class ", ',');
        assert_eq!(map.entries.get("ptp").map(String::as_str), Some("SOF2"));
        assert_eq!(map.entries.get("saveas").map(String::as_str), Some("title"));
        assert_eq!(map.entries.get("param").map(String::as_str), Some("class"));
        assert!(map.dropped.is_empty());
    }

    #[test]
    fn test_malformed_entries_dropped() {
        let map = parse_data("ptp=QTOF,garbage,=orphan,,empty=", ',');
        assert_eq!(map.entries.len(), 2);
        assert_eq!(map.entries.get("empty").map(String::as_str), Some(""));
        assert_eq!(map.dropped, vec!["garbage".to_string(), "=orphan".to_string()]);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let map = parse_data("url=https://example.com/?a=b;report=no", ';');
        assert_eq!(
            map.entries.get("url").map(String::as_str),
            Some("https://example.com/?a=b")
        );
        assert_eq!(map.entries.get("report").map(String::as_str), Some("no"));
    }
}
