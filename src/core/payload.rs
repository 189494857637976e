use anyhow::Result;
use serde_json::{Map, Value};

use crate::core::comment::ReviewComment;
use crate::core::correction::SkippedComment;

const PREPARED_KEY: &str = "prepared_comment_payloads";
const PAYLOAD_KEY: &str = "payload";
const SKIPPED_KEY: &str = "skipped_comments";

/// How the envelope itself arrived.
#[derive(Debug, Clone, PartialEq)]
enum Outer {
    Object,
    /// A bare array; the envelope is its first element and the rest ride along.
    Array(Vec<Value>),
}

/// What the `payload` field held.
#[derive(Debug, Clone, PartialEq)]
enum PayloadField {
    Absent,
    Object,
    List,
    /// A JSON document encoded as a string, kept decoded until written back.
    Encoded(Value),
    /// Present but unusable; left exactly as found.
    Opaque,
}

/// A comment batch in whichever nesting the caller used.
///
/// Comments are looked up at `prepared_comment_payloads` on the envelope, then
/// on the primary payload (the `payload` object, or the first entry of a
/// `payload` list, possibly JSON-encoded as a string). On the way out the
/// processed list is written back to every one of those places.
#[derive(Debug, Clone)]
pub struct CommentEnvelope {
    root: Map<String, Value>,
    outer: Outer,
    payload: PayloadField,
}

impl CommentEnvelope {
    /// The batch must be an object, or an array whose first element is one.
    /// An empty array is accepted as an empty batch.
    pub fn from_value(value: Value) -> Result<Self> {
        let (root, outer) = match value {
            Value::Object(map) => (map, Outer::Object),
            Value::Array(items) if items.is_empty() => (Map::new(), Outer::Array(items)),
            Value::Array(mut items) => match items.remove(0) {
                Value::Object(map) => (map, Outer::Array(items)),
                other => anyhow::bail!(
                    "Comment batch array must start with an object, found {}",
                    json_kind(&other)
                ),
            },
            other => anyhow::bail!(
                "Comment batch must be a JSON object or array, found {}",
                json_kind(&other)
            ),
        };

        let payload = match root.get(PAYLOAD_KEY) {
            None | Some(Value::Null) => PayloadField::Absent,
            Some(Value::Object(_)) => PayloadField::Object,
            Some(Value::Array(_)) => PayloadField::List,
            Some(Value::String(text)) if text.trim().is_empty() => PayloadField::Opaque,
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(decoded @ (Value::Object(_) | Value::Array(_))) => PayloadField::Encoded(decoded),
                _ => PayloadField::Opaque,
            },
            Some(_) => PayloadField::Opaque,
        };

        Ok(Self {
            root,
            outer,
            payload,
        })
    }

    /// The comments to process, in order.
    pub fn comments(&self) -> Vec<ReviewComment> {
        let prepared = [
            self.root.get(PREPARED_KEY),
            self.primary_payload().and_then(|p| p.get(PREPARED_KEY)),
        ]
        .into_iter()
        .flatten()
        .find(|value| is_populated(value));

        match prepared {
            Some(Value::Array(items)) => items.iter().cloned().map(ReviewComment::new).collect(),
            Some(object @ Value::Object(_)) => vec![ReviewComment::new(object.clone())],
            _ => Vec::new(),
        }
    }

    fn primary_payload(&self) -> Option<&Map<String, Value>> {
        let payload = match &self.payload {
            PayloadField::Object | PayloadField::List => self.root.get(PAYLOAD_KEY)?,
            PayloadField::Encoded(decoded) => decoded,
            PayloadField::Absent | PayloadField::Opaque => return None,
        };
        match payload {
            Value::Object(map) => Some(map),
            Value::Array(items) => items.first()?.as_object(),
            _ => None,
        }
    }

    /// Rebuilds the envelope in its original shape with the processed comments.
    ///
    /// New skip records go ahead of any the envelope already carried.
    pub fn into_value(
        mut self,
        comments: Vec<ReviewComment>,
        skipped: &[SkippedComment],
    ) -> Result<Value> {
        let prepared = Value::Array(comments.into_iter().map(ReviewComment::into_value).collect());

        self.root.insert(PREPARED_KEY.to_string(), prepared.clone());

        let mut skipped_list: Vec<Value> = skipped
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()?;
        if let Some(Value::Array(existing)) = self.root.remove(SKIPPED_KEY) {
            skipped_list.extend(existing);
        }
        self.root.insert(SKIPPED_KEY.to_string(), Value::Array(skipped_list));

        match self.payload {
            PayloadField::Object | PayloadField::List => {
                if let Some(payload) = self.root.get_mut(PAYLOAD_KEY) {
                    set_prepared(payload, prepared);
                }
            }
            PayloadField::Encoded(mut decoded) => {
                set_prepared(&mut decoded, prepared);
                let encoded = serde_json::to_string(&decoded)?;
                self.root.insert(PAYLOAD_KEY.to_string(), Value::String(encoded));
            }
            PayloadField::Absent | PayloadField::Opaque => {}
        }

        let root = Value::Object(self.root);
        Ok(match self.outer {
            Outer::Object => root,
            Outer::Array(rest) => {
                let mut items = Vec::with_capacity(rest.len() + 1);
                items.push(root);
                items.extend(rest);
                Value::Array(items)
            }
        })
    }
}

fn set_prepared(payload: &mut Value, prepared: Value) {
    let target = match payload {
        Value::Array(items) => items.first_mut(),
        other => Some(other),
    };
    if let Some(Value::Object(map)) = target {
        map.insert(PREPARED_KEY.to_string(), prepared);
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn is_populated(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}
