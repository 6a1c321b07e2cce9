//! Deterministic clean-up of malformed JSON produced by the reasoning engine.
//!
//! [`repair`] is only worth calling after a direct parse has failed. The passes
//! run in a fixed order: quote repair settles where strings begin and end,
//! newline repair relies on those boundaries, and bracket balancing needs both
//! to tell structural brackets from bracket characters inside text.

use serde_json::Value;

/// Pulls the serialized record out of a raw reply.
///
/// Handles a fenced block (a ```` ``` ```` or ```` ```json ```` line before and
/// a ```` ``` ```` line after) and prose in front of the record. The record
/// starts at the first `opening` bracket; without one, at the first bracket of
/// either kind.
pub fn extract_candidate(buffer: &str, opening: char) -> String {
    let trimmed = buffer.trim();
    let unfenced = if trimmed.starts_with("```") {
        strip_fence(trimmed)
    } else {
        trimmed.to_string()
    };
    let start = unfenced
        .find(opening)
        .or_else(|| unfenced.find(['{', '[']));
    match start {
        Some(0) | None => unfenced,
        Some(start) => unfenced[start..].to_string(),
    }
}

fn strip_fence(trimmed: &str) -> String {
    if !trimmed.contains('\n') {
        let inner = trimmed.trim_start_matches('`');
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        return inner.trim_end_matches('`').trim().to_string();
    }
    let mut body = Vec::new();
    for line in trimmed.lines().skip(1) {
        if line.trim_start().starts_with("```") {
            break;
        }
        body.push(line);
    }
    body.join("\n")
}

/// Applies the repair passes to `raw` and returns the rewritten text.
///
/// Idempotent: `repair(&repair(x)) == repair(x)`.
pub fn repair(raw: &str) -> String {
    let mut text = if count(raw, '\'') > count(raw, '"') {
        raw.replace('\'', "\"")
    } else {
        raw.to_string()
    };
    text = strip_trailing_commas(&text);
    if parses(&text) {
        return text;
    }

    let text = escape_interior_quotes(&text);
    let text = escape_raw_newlines(&text);
    let text = balance_brackets(&text);
    strip_trailing_commas(&text)
}

fn count(text: &str, needle: char) -> usize {
    text.chars().filter(|c| *c == needle).count()
}

fn parses(text: &str) -> bool {
    serde_json::from_str::<Value>(text).is_ok()
}

/// Removes every comma whose next non-whitespace character is `}` or `]`.
pub fn strip_trailing_commas(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = strip_trailing_commas_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_trailing_commas_once(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ',' && matches!(next_significant(&chars[i + 1..]), Some('}') | Some(']')) {
            continue;
        }
        out.push(c);
    }
    out
}

fn next_significant(rest: &[char]) -> Option<char> {
    rest.iter().copied().find(|c| !c.is_whitespace())
}

/// Escapes quotation marks that sit inside a string value.
///
/// While inside a string, a `"` only terminates it when the next
/// non-whitespace character is `,`, `}`, `]`, `:` or the end of input.
pub fn escape_interior_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        } else if c == '\\' {
            out.push(c);
            if let Some(&escaped) = chars.get(i + 1) {
                out.push(escaped);
                i += 1;
            }
        } else if c == '"' {
            if closes_string(&chars[i + 1..]) {
                in_string = false;
                out.push(c);
            } else {
                out.push_str("\\\"");
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

fn closes_string(rest: &[char]) -> bool {
    match next_significant(rest) {
        None => true,
        Some(c) => matches!(c, ',' | '}' | ']' | ':'),
    }
}

/// Replaces literal line breaks (and tabs) inside strings with escape sequences.
pub fn escape_raw_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Appends the closers for every `{` / `[` still open at the end of input,
/// innermost first. A string left open by a truncated reply is closed first.
pub fn balance_brackets(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = text.to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(text: &str) -> Value {
        serde_json::from_str(text).unwrap_or_else(|e| panic!("{text:?} did not parse: {e}"))
    }

    #[test]
    fn quoted_speech_and_trailing_comma() {
        let raw = r#"{"a": 1, "b": "she said "hi" then left",}"#;
        let repaired = repair(raw);
        assert_eq!(repaired, r#"{"a": 1, "b": "she said \"hi\" then left"}"#);
        assert_eq!(value(&repaired), json!({"a": 1, "b": "she said \"hi\" then left"}));
    }

    #[test]
    fn missing_closing_braces() {
        assert_eq!(repair(r#"{"a": {"b": 1"#), r#"{"a": {"b": 1}}"#);
    }

    #[test]
    fn raw_newline_inside_string() {
        let repaired = repair("{\"summary\": \"line one\nline two\"}");
        assert_eq!(value(&repaired)["summary"], "line one\nline two");
    }

    #[test]
    fn single_quoted_output() {
        let repaired = repair("{'verdict': 'true', 'tags': ['a', 'b',]}");
        assert_eq!(value(&repaired), json!({"verdict": "true", "tags": ["a", "b"]}));
    }

    #[test]
    fn truncated_inside_array_and_string() {
        let repaired = repair(r#"{"sources": [{"url": "https://a.example", "title": "Cut off"#);
        assert_eq!(
            value(&repaired),
            json!({"sources": [{"url": "https://a.example", "title": "Cut off"}]})
        );
    }

    #[test]
    fn truncated_after_comma() {
        assert_eq!(value(&repair(r#"[1, 2,"#)), json!([1, 2]));
    }

    #[test]
    fn dangling_escape_at_end_is_dropped() {
        let repaired = repair("{\"a\": \"x\\");
        assert_eq!(value(&repaired), json!({"a": "x"}));
    }

    #[test]
    fn brackets_inside_strings_are_not_counted() {
        let repaired = repair(r#"{"a": "[not {a} bracket", "b": [1"#);
        assert_eq!(value(&repaired), json!({"a": "[not {a} bracket", "b": [1]}));
    }

    #[test]
    fn valid_json_is_left_alone() {
        let raw = r#"{"a": [1, 2], "b": "it's \"fine\""}"#;
        assert_eq!(repair(raw), raw);
    }

    #[test]
    fn all_defect_classes_together() {
        let raw = "{\"claim\": \"X\", \"reasoning\": \"the report says \"no\"\nsee below\", \"evidence\": [{\"url\": \"u\",},";
        let parsed = value(&repair(raw));
        assert_eq!(parsed["reasoning"], "the report says \"no\"\nsee below");
        assert_eq!(parsed["evidence"], json!([{"url": "u"}]));
    }

    #[test]
    fn repair_is_idempotent() {
        let inputs = [
            r#"{"a": 1, "b": "she said "hi" then left",}"#,
            r#"{"a": {"b": 1"#,
            "{\"a\": \"x\ny\"",
            "{'a': 'b',}",
            r#"{"a": "unterminated"#,
            r#"[{"a": [1, 2,"#,
            r#"not json at all"#,
            r#"{"a": "x", "b": }"#,
            r#"{"a": "mismatch"]"#,
            "",
        ];
        for input in inputs {
            let once = repair(input);
            assert_eq!(repair(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn fenced_reply_is_unwrapped() {
        let raw = "```json\n{\"a\": 1}\n```\n";
        assert_eq!(extract_candidate(raw, '{'), "{\"a\": 1}");
        assert_eq!(extract_candidate("```{\"a\": 1}```", '{'), "{\"a\": 1}");
    }

    #[test]
    fn leading_prose_is_skipped() {
        assert_eq!(extract_candidate("Here you go: {\"a\": 1}", '{'), "{\"a\": 1}");
        assert_eq!(extract_candidate("  {\"a\": 1}  ", '{'), "{\"a\": 1}");
    }

    #[test]
    fn citation_brackets_before_an_object_are_skipped() {
        let raw = "As shown in [1], the answer is: {\"a\": [2]}";
        assert_eq!(extract_candidate(raw, '{'), "{\"a\": [2]}");
        assert_eq!(extract_candidate("see [1, 2]", '{'), "[1, 2]");
        assert_eq!(extract_candidate("list: [{\"a\": 1}]", '['), "[{\"a\": 1}]");
    }

    #[test]
    fn trailing_comma_runs_collapse() {
        assert_eq!(strip_trailing_commas("[1,,]"), "[1]");
        assert_eq!(strip_trailing_commas("{\"a\": 1 , }"), "{\"a\": 1  }");
    }
}
