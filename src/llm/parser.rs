use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::models::{BatchResult, Category};

/// Result of reading a batch response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Every submitted URL came back with all required keys.
    Complete(HashMap<String, BatchResult>),
    /// The array decoded, but some URLs were missing or had missing keys;
    /// those were filled with synthesized results.
    Partial {
        results: HashMap<String, BatchResult>,
        defaulted: Vec<String>,
    },
    /// No usable JSON array.
    Failed(String),
}

impl ParseOutcome {
    /// Always yields one result per submitted URL.
    pub fn into_results(self, urls: &[String]) -> HashMap<String, BatchResult> {
        match self {
            ParseOutcome::Complete(results) | ParseOutcome::Partial { results, .. } => results,
            ParseOutcome::Failed(reason) => urls
                .iter()
                .map(|url| (url.clone(), BatchResult::api_error(url.as_str(), &reason)))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    url: Option<Value>,
    #[serde(default)]
    category: Option<Value>,
    #[serde(default)]
    summary: Option<Value>,
    #[serde(default)]
    justification: Option<Value>,
}

fn as_text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

pub fn parse_batch_response(text: &str, urls: &[String]) -> ParseOutcome {
    if text.trim().is_empty() {
        return ParseOutcome::Failed("Empty response from LLM".to_string());
    }

    let entries = match extract_json_array(text) {
        Some(entries) => entries,
        None => {
            return ParseOutcome::Failed("No valid JSON array found in response".to_string())
        }
    };

    let expected: HashSet<&str> = urls.iter().map(String::as_str).collect();
    let mut results = HashMap::new();
    let mut defaulted = Vec::new();

    for entry in entries {
        let entry: RawEntry = match serde_json::from_value(entry) {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        let url = match as_text(entry.url) {
            Some(url) => url,
            None => continue,
        };
        if !expected.contains(url.as_str()) {
            tracing::warn!(%url, "LLM returned an entry for a URL that was not submitted");
            continue;
        }
        if results.contains_key(&url) {
            continue;
        }

        let category = as_text(entry.category);
        let summary = as_text(entry.summary);
        if category.is_none() || summary.is_none() {
            defaulted.push(url.clone());
        }

        let mut result = BatchResult::new(
            url.as_str(),
            category.map(Category::from).unwrap_or(Category::ParseError),
            summary.unwrap_or_else(|| "LLM response did not include a summary.".to_string()),
        );
        result.justification = as_text(entry.justification);
        results.insert(url, result);
    }

    for url in urls {
        if !results.contains_key(url) {
            results.insert(url.clone(), BatchResult::omitted(url.as_str()));
            defaulted.push(url.clone());
        }
    }

    if defaulted.is_empty() {
        ParseOutcome::Complete(results)
    } else {
        ParseOutcome::Partial { results, defaulted }
    }
}

/// Finds a JSON array in free-form model output: a fenced block first, then
/// any balanced bare array that decodes, then a lone object (single-item
/// batches sometimes come back unwrapped). An array of objects that is
/// present but does not decode fails the whole response.
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    for block in fenced_blocks(text) {
        match serde_json::from_str(block) {
            Ok(Value::Array(items)) => return Some(items),
            Ok(object @ Value::Object(_)) => return Some(vec![object]),
            _ => {}
        }
    }

    let has_objects = |v: &Value| matches!(v, Value::Array(items) if items.iter().any(Value::is_object));
    if let Some(Value::Array(items)) = first_balanced(text, '[', has_objects) {
        return Some(items);
    }
    if balanced_spans(text, '[').any(|span| span.contains('{')) {
        return None;
    }
    if let Some(object) = first_balanced(text, '{', Value::is_object) {
        return Some(vec![object]);
    }

    None
}

fn balanced_spans(text: &str, open: char) -> impl Iterator<Item = &str> + '_ {
    text.char_indices()
        .filter(move |&(_, c)| c == open)
        .filter_map(move |(start, _)| balanced_end(text, start).map(|end| &text[start..end]))
}

fn first_balanced(text: &str, open: char, accept: impl Fn(&Value) -> bool) -> Option<Value> {
    balanced_spans(text, open).find_map(|span| {
        serde_json::from_str::<Value>(span)
            .ok()
            .filter(|value| accept(value))
    })
}

fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        // Skip any language identifier on the opening line
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        match body.find("```") {
            Some(close) => {
                blocks.push(body[..close].trim());
                rest = &body[close + 3..];
            }
            None => break,
        }
    }

    blocks
}

/// Byte index one past the bracket that closes the one at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_from_fenced_block() {
        let input = "Here you go:\n```json\n[{\"url\": \"A\"}]\n```\nThanks";
        let items = extract_json_array(input).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_extract_bare_array_with_brackets_in_strings() {
        let input = r#"Result: [{"url": "A", "summary": "Section [3] applies ]"}] done"#;
        let items = extract_json_array(input).unwrap();
        assert_eq!(items[0]["summary"], "Section [3] applies ]");
    }

    #[test]
    fn test_skips_bracketed_prose_before_array() {
        let input = r#"[Note] the answer is [{"url": "A"}]"#;
        assert_eq!(extract_json_array(input).unwrap().len(), 1);
    }

    #[test]
    fn test_skips_arrays_of_scalars() {
        let input = r#"See section [3] for details: [{"url": "A"}]"#;
        assert_eq!(extract_json_array(input).unwrap()[0]["url"], "A");
    }

    #[test]
    fn test_missing_url_is_filled() {
        let response = r#"Sure, here you go: [{"url":"A","category":"X","summary":"s"}]"#;
        let outcome = parse_batch_response(response, &urls(&["A", "B"]));

        match outcome {
            ParseOutcome::Partial { results, defaulted } => {
                assert_eq!(defaulted, vec!["B".to_string()]);
                assert_eq!(results["A"].category, Category::Other("X".to_string()));
                assert_eq!(results["A"].summary, "s");
                assert_eq!(results["B"].category, Category::ApiError);
                assert!(results["B"].summary.starts_with("LLM did not return an entry"));
            }
            other => panic!("expected partial outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_response() {
        let response = r#"```json
[
  {"url": "A", "category": "Press Release", "summary": "One.", "justification": "Headline says so"},
  {"url": "B", "category": "Meeting Announcement", "summary": "Two."}
]
```"#;
        match parse_batch_response(response, &urls(&["A", "B"])) {
            ParseOutcome::Complete(results) => {
                assert_eq!(results.len(), 2);
                assert_eq!(results["A"].justification.as_deref(), Some("Headline says so"));
                assert_eq!(results["B"].category, Category::MeetingAnnouncement);
            }
            other => panic!("expected complete outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_entry_missing_keys_gets_defaults() {
        let response = r#"[{"url": "A", "summary": "Only a summary"}]"#;
        match parse_batch_response(response, &urls(&["A"])) {
            ParseOutcome::Partial { results, defaulted } => {
                assert_eq!(defaulted, vec!["A".to_string()]);
                assert_eq!(results["A"].category, Category::ParseError);
                assert_eq!(results["A"].summary, "Only a summary");
            }
            other => panic!("expected partial outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_lone_object_is_accepted() {
        let response = r#"{"url": "A", "category": "New Document", "summary": "A form."}"#;
        match parse_batch_response(response, &urls(&["A"])) {
            ParseOutcome::Complete(results) => {
                assert_eq!(results["A"].category, Category::NewDocument);
            }
            other => panic!("expected complete outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_urls_are_ignored() {
        let response = r#"[{"url": "Z", "category": "Press Release", "summary": "?"}]"#;
        let results = parse_batch_response(response, &urls(&["A"])).into_results(&urls(&["A"]));
        assert_eq!(results.len(), 1);
        assert_eq!(results["A"].category, Category::ApiError);
    }

    #[test]
    fn test_undecodable_array_fails_the_whole_batch() {
        let submitted = urls(&["A", "B"]);
        let response = r#"[{"url": "A", "category": "Press Release", "summary": "a"}, {"url": "B", "category": "Press Release", "summary": "b"},]"#;

        let outcome = parse_batch_response(response, &submitted);
        assert!(matches!(outcome, ParseOutcome::Failed(_)), "{:?}", outcome);

        let results = outcome.into_results(&submitted);
        assert!(results.values().all(|r| r.category == Category::ApiError));
        assert!(results.values().all(|r| !r.summary.contains("did not return an entry")));
    }

    #[test]
    fn test_lone_object_after_bracketed_prose() {
        let response = r#"[Note] {"url": "A", "category": "Press Release", "summary": "a"}"#;
        assert!(matches!(
            parse_batch_response(response, &urls(&["A"])),
            ParseOutcome::Complete(_)
        ));
    }

    #[test]
    fn test_malformed_and_empty_responses_fail() {
        let submitted = urls(&["A", "B"]);
        for response in ["", "I cannot help with that.", r#"[{"url": "A", "category": }"#, "[1, 2"] {
            let outcome = parse_batch_response(response, &submitted);
            assert!(matches!(outcome, ParseOutcome::Failed(_)), "{}", response);

            let results = outcome.into_results(&submitted);
            let keys: HashSet<_> = results.keys().cloned().collect();
            assert_eq!(keys, submitted.iter().cloned().collect());
            assert!(results.values().all(|r| r.category == Category::ApiError));
        }
    }
}
