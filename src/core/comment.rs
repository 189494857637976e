use serde_json::{Map, Value};

/// Side of the diff GitHub anchors new-file lines to.
pub const NEW_FILE_SIDE: &str = "RIGHT";

const BODY_PREVIEW_CHARS: usize = 200;

/// A draft review comment exactly as supplied by the caller.
///
/// The record is never mutated; a corrected anchor produces a new copy via
/// [`ReviewComment::reanchored`]. Records that are not JSON objects are carried
/// through untouched and simply have no path or body.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewComment {
    raw: Value,
}

static EMPTY_FIELDS: once_cell::sync::Lazy<Map<String, Value>> =
    once_cell::sync::Lazy::new(Map::new);

impl ReviewComment {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        self.raw.as_object().unwrap_or(&EMPTY_FIELDS)
    }

    /// `path`, falling back to `file_path`, ignoring blanks.
    pub fn path(&self) -> Option<&str> {
        ["path", "file_path"]
            .iter()
            .filter_map(|key| self.fields().get(*key).and_then(Value::as_str))
            .find(|path| !path.is_empty())
    }

    pub fn body(&self) -> &str {
        self.fields()
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn body_preview(&self) -> String {
        self.body().chars().take(BODY_PREVIEW_CHARS).collect()
    }

    /// The claimed line as given, whatever its JSON type.
    pub fn original_line(&self) -> Option<&Value> {
        self.fields().get("line").filter(|v| !v.is_null())
    }

    pub fn claims_line(&self, line: usize) -> bool {
        self.original_line().and_then(Value::as_u64) == Some(line as u64)
    }

    pub fn into_value(self) -> Value {
        self.raw
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    /// Copy of this comment anchored to `line` of `path` on the new-file side.
    ///
    /// `position` is dropped in favour of explicit line/side. Multi-line
    /// comments keep their range start unless it would fall after `line`.
    pub fn reanchored(&self, path: &str, line: usize) -> ReviewComment {
        let mut fields = self.fields().clone();

        fields.insert("path".to_string(), Value::from(path));
        fields.remove("position");
        fields.insert("line".to_string(), Value::from(line));

        let side = non_empty_str(fields.get("side"))
            .unwrap_or(NEW_FILE_SIDE)
            .to_string();
        fields.insert("side".to_string(), Value::from(side.clone()));

        if fields.contains_key("start_line") || fields.contains_key("start_side") {
            let start_side = non_empty_str(fields.get("start_side"))
                .map(str::to_string)
                .unwrap_or(side);
            fields.insert("start_side".to_string(), Value::from(start_side));

            let start_line = fields
                .get("start_line")
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(line)
                .min(line);
            fields.insert("start_line".to_string(), Value::from(start_line));
        }

        ReviewComment::new(Value::Object(fields))
    }

    /// Copy carrying the text of the line it was matched to and the score,
    /// rounded to three decimals.
    pub fn with_match_annotation(&self, content: &str, score: f32) -> ReviewComment {
        let mut fields = self.fields().clone();
        fields.insert("matched_line".to_string(), Value::from(content));
        fields.insert("line_content".to_string(), Value::from(content));
        let rounded = (f64::from(score) * 1000.0).round() / 1000.0;
        fields.insert("similarity".to_string(), Value::from(rounded));
        ReviewComment::new(Value::Object(fields))
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_falls_back_to_file_path() {
        let comment = ReviewComment::new(json!({"path": "", "file_path": "docs/a.md"}));
        assert_eq!(comment.path(), Some("docs/a.md"));

        let comment = ReviewComment::new(json!({"path": 12}));
        assert_eq!(comment.path(), None);
    }

    #[test]
    fn non_object_comment_has_no_fields() {
        let comment = ReviewComment::new(json!("stray string"));
        assert_eq!(comment.path(), None);
        assert_eq!(comment.body(), "");
        assert!(comment.original_line().is_none());
    }

    #[test]
    fn reanchored_sets_line_side_and_drops_position() {
        let original = json!({
            "file_path": "docs/a.md",
            "body": "typo",
            "line": 3,
            "position": 9,
        });
        let comment = ReviewComment::new(original.clone());
        let fixed = comment.reanchored("docs/a.md", 12).into_value();

        assert_eq!(
            fixed,
            json!({
                "file_path": "docs/a.md",
                "path": "docs/a.md",
                "body": "typo",
                "line": 12,
                "side": "RIGHT",
            })
        );
        assert_eq!(comment.as_value(), &original);
    }

    #[test]
    fn reanchored_keeps_existing_side() {
        let comment = ReviewComment::new(json!({"path": "a", "side": "LEFT"}));
        let fixed = comment.reanchored("a", 2).into_value();
        assert_eq!(fixed["side"], "LEFT");
    }

    #[test]
    fn range_start_is_clamped_to_line() {
        let comment = ReviewComment::new(json!({"path": "a", "line": 20, "start_line": 18}));
        let fixed = comment.reanchored("a", 5).into_value();
        assert_eq!(fixed["start_line"], 5);
        assert_eq!(fixed["start_side"], "RIGHT");
        assert_eq!(fixed["line"], 5);
    }

    #[test]
    fn range_start_below_line_is_kept() {
        let comment = ReviewComment::new(json!({"path": "a", "start_line": 2, "start_side": "LEFT"}));
        let fixed = comment.reanchored("a", 5).into_value();
        assert_eq!(fixed["start_line"], 2);
        assert_eq!(fixed["start_side"], "LEFT");
    }

    #[test]
    fn start_side_alone_fills_start_line() {
        let comment = ReviewComment::new(json!({"path": "a", "start_side": "RIGHT"}));
        let fixed = comment.reanchored("a", 7).into_value();
        assert_eq!(fixed["start_line"], 7);
    }

    #[test]
    fn match_annotation_is_added_to_a_copy() {
        let comment = ReviewComment::new(json!({"path": "a", "line": 4, "body": "typo"}));
        let annotated = comment.with_match_annotation("Run the installer.", 0.81234);

        let value = annotated.into_value();
        assert_eq!(value["matched_line"], "Run the installer.");
        assert_eq!(value["line_content"], "Run the installer.");
        assert_eq!(value["similarity"], json!(0.812));
        assert_eq!(value["line"], 4);
        assert!(comment.as_value().get("matched_line").is_none());
    }

    #[test]
    fn body_preview_is_char_safe() {
        let body = "é".repeat(300);
        let comment = ReviewComment::new(json!({ "body": body }));
        assert_eq!(comment.body_preview().chars().count(), 200);
    }
}
