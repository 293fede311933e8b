//! Report line templates
//!
//! A template mixes literal text with `{token}` placeholders, e.g.
//! `"{step}. {id} - {description} - {action}"`. A token whose value is blank
//! is removed together with the separator that would have followed it, so
//! operators can choose report verbosity without leaving dangling `- -`.
//! Text before the first token and after the last one goes with that token.

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z][A-Za-z0-9_.]*)\}").expect("token pattern is valid")
});

/// Render `template`, resolving each token through `lookup`
///
/// Unknown tokens resolve to `None` and are treated like blank values.
pub fn render_template<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut leading = String::new();
    // (value, literal following the token)
    let mut parts: Vec<(Option<String>, String)> = Vec::new();
    let mut last = 0;

    for caps in TOKEN.captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        let literal = &template[last..whole.start()];
        match parts.last_mut() {
            Some((_, after)) => after.push_str(literal),
            None => leading.push_str(literal),
        }
        let value = lookup(&caps[1].to_ascii_lowercase()).filter(|v| !v.trim().is_empty());
        parts.push((value, String::new()));
        last = whole.end();
    }

    let tail = &template[last..];
    match parts.last_mut() {
        Some((_, after)) => after.push_str(tail),
        None => leading.push_str(tail),
    }

    // The literal before the first token belongs to that token
    let mut out = match parts.first() {
        Some((None, _)) => String::new(),
        _ => leading,
    };
    let mut pending_separator: Option<&str> = None;
    for (value, after) in &parts {
        if let Some(value) = value {
            if let Some(sep) = pending_separator {
                out.push_str(sep);
            }
            out.push_str(value.trim());
            pending_separator = Some(after.as_str());
        }
    }

    // The literal after the final token is kept only when that token rendered
    if let Some((Some(_), after)) = parts.last() {
        out.push_str(after);
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(values: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_all_values_present() {
        let line = render_template(
            "{step}. {id} - {description} - {action}",
            lookup(&[("step", "3"), ("id", "L1"), ("description", "Login"), ("action", "click")]),
        );
        assert_eq!(line, "3. L1 - Login - click");
    }

    #[test]
    fn test_blank_value_and_separator_stripped() {
        let line = render_template(
            "{step}. {id} - {description} - {action} {query}",
            lookup(&[("step", "3"), ("id", "L1"), ("description", " "), ("action", "click")]),
        );
        assert_eq!(line, "3. L1 - click");
    }

    #[test]
    fn test_trailing_blank_tokens_collapse() {
        let line = render_template(
            "[{id}] {action} | {errors} | {comments}.",
            lookup(&[("id", "A"), ("action", "open")]),
        );
        assert_eq!(line, "[A] open");
    }

    #[test]
    fn test_blank_first_token_drops_leading_text() {
        let line = render_template("[{id}] {action}", lookup(&[("action", "open")]));
        assert_eq!(line, "open");

        let line = render_template("Step {step}: {id}", lookup(&[("id", "L2")]));
        assert_eq!(line, "L2");
    }

    #[test]
    fn test_unknown_tokens_and_case() {
        let line = render_template("{ID}: {nosuch} {Action}", lookup(&[("id", "7"), ("action", "x")]));
        assert_eq!(line, "7: x");
    }

    #[test]
    fn test_no_tokens() {
        assert_eq!(render_template("plain text ", |_| None), "plain text");
    }
}
