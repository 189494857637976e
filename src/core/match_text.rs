use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static SUGGESTION_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```suggestion[ \t]*\r?\n(.*?)```").unwrap());

/// Fields that sometimes carry the finding text when `body` is empty.
const FALLBACK_FIELDS: [&str; 5] = ["issue", "comment", "review", "text", "content"];

/// Picks the fragment of a comment that should resemble the line it belongs on.
///
/// A ```` ```suggestion ```` block wins since it is literal replacement text,
/// then the first non-blank body line, then the first non-blank fallback field.
/// Returns an empty string when none of these carry text.
pub fn extract_match_text(body: &str, fields: &Map<String, Value>) -> String {
    if let Some(block) = SUGGESTION_BLOCK
        .captures(body)
        .and_then(|caps| caps.get(1))
    {
        let candidate = block.as_str().trim();
        if !candidate.is_empty() {
            return candidate.to_string();
        }
    }

    if let Some(line) = body.lines().map(str::trim).find(|line| !line.is_empty()) {
        return line.to_string();
    }

    FALLBACK_FIELDS
        .iter()
        .filter_map(|key| fields.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn suggestion_block_beats_first_line() {
        let body = "Use the product name consistently.\n\n```Suggestion\n  Install Acme CLI first.\n```\n";
        assert_eq!(
            extract_match_text(body, &Map::new()),
            "Install Acme CLI first."
        );
    }

    #[test]
    fn only_exact_suggestion_fence_counts() {
        let body = "Tighten this.\n```suggestions\nnot a suggestion\n```\n```suggestion_x\nnor this\n```";
        assert_eq!(extract_match_text(body, &Map::new()), "Tighten this.");

        let crlf = "Tighten this.\r\n```suggestion \r\nreplacement\r\n```";
        assert_eq!(extract_match_text(crlf, &Map::new()), "replacement");
    }

    #[test]
    fn first_suggestion_block_wins() {
        let body = "```suggestion\nfirst\n```\n```suggestion\nsecond\n```";
        assert_eq!(extract_match_text(body, &Map::new()), "first");
    }

    #[test]
    fn multi_line_suggestion_is_kept_whole() {
        let body = "fix\n```suggestion\nline one\nline two\n```";
        assert_eq!(extract_match_text(body, &Map::new()), "line one\nline two");
    }

    #[test]
    fn empty_suggestion_falls_back_to_first_line() {
        let body = "\n   \n  Passive voice here.  \n```suggestion\n```";
        assert_eq!(extract_match_text(body, &Map::new()), "Passive voice here.");
    }

    #[test]
    fn blank_body_uses_fallback_fields() {
        let extra = fields(json!({"issue": "   ", "comment": 4, "review": " typo in heading "}));
        assert_eq!(extract_match_text("  \n", &extra), "typo in heading");
    }

    #[test]
    fn nothing_usable_is_empty() {
        assert_eq!(extract_match_text("", &fields(json!({"text": ""}))), "");
    }
}
