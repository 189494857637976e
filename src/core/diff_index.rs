use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::core::diff_parser::{AddedLine, DiffParser};

/// One entry of a pull request file listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrFile {
    #[serde(default, deserialize_with = "lenient_string")]
    pub filename: String,
    #[serde(default, deserialize_with = "lenient_option")]
    pub patch: Option<String>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub status: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_option(deserializer)?.unwrap_or_default())
}

fn lenient_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

impl PrFile {
    /// Reads every object in a JSON array as a file entry; anything else is dropped.
    pub fn from_values(values: Vec<Value>) -> Vec<PrFile> {
        values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect()
    }
}

/// Case-insensitive substring match. Paths are matched with a leading `/` so a
/// pattern like `/.ai/` also covers a top-level `.ai/` directory.
pub fn is_blocked_path(path: &str, blocked: &[String]) -> bool {
    let lower = format!("/{}", path.to_lowercase());
    blocked.iter().any(|pattern| lower.contains(pattern.as_str()))
}

/// Added lines of every reviewable file, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct DiffIndex {
    files: BTreeMap<String, Vec<AddedLine>>,
}

/// Added-line numbers that disagree between a reference listing and the local parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineMismatch {
    pub file_path: String,
    pub upstream_only: Vec<usize>,
    pub recomputed_only: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileAddedLines<'a> {
    pub file_path: &'a str,
    pub added_lines: &'a [AddedLine],
}

impl DiffIndex {
    pub fn build(files: &[PrFile], blocked: &[String]) -> Self {
        let mut index = BTreeMap::new();

        for file in files {
            let status = file.status.as_deref().unwrap_or_default().to_lowercase();
            let patch = match file.patch.as_deref() {
                Some(patch) if !patch.trim().is_empty() => patch,
                _ => {
                    debug!("Skipping file without patch: {}", file.filename);
                    continue;
                }
            };
            if file.filename.is_empty() {
                continue;
            }
            if is_blocked_path(&file.filename, blocked) {
                debug!("Skipping blocked file: {}", file.filename);
                continue;
            }
            if status == "removed" {
                debug!("Skipping removed file: {}", file.filename);
                continue;
            }

            index.insert(file.filename.clone(), DiffParser::parse_patch(patch));
        }

        Self { files: index }
    }

    pub fn get(&self, path: &str) -> Option<&[AddedLine]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_added_lines(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Listing in the same shape the reference file uses.
    pub fn listing(&self) -> Vec<FileAddedLines<'_>> {
        self.files
            .iter()
            .map(|(path, lines)| FileAddedLines {
                file_path: path,
                added_lines: lines,
            })
            .collect()
    }

    /// Compares the indexed line numbers against an externally produced
    /// `[{file_path, added_lines: [{line_number}]}]` listing.
    pub fn compare_reference(&self, reference: &[Value]) -> Vec<LineMismatch> {
        let mut upstream: HashMap<&str, BTreeSet<usize>> = HashMap::new();
        for entry in reference {
            let Some(path) = entry.get("file_path").and_then(Value::as_str) else {
                continue;
            };
            let numbers = entry
                .get("added_lines")
                .and_then(Value::as_array)
                .map(|lines| {
                    lines
                        .iter()
                        .filter_map(|line| line.get("line_number").and_then(Value::as_u64))
                        .map(|n| n as usize)
                        .collect()
                })
                .unwrap_or_default();
            upstream.insert(path, numbers);
        }

        let empty = BTreeSet::new();
        let mut mismatches = Vec::new();
        for (path, lines) in &self.files {
            let theirs = upstream.get(path.as_str()).unwrap_or(&empty);
            let ours: BTreeSet<usize> = lines.iter().map(|l| l.line_number).collect();
            if *theirs != ours {
                mismatches.push(LineMismatch {
                    file_path: path.clone(),
                    upstream_only: theirs.difference(&ours).copied().collect(),
                    recomputed_only: ours.difference(theirs).copied().collect(),
                });
            }
        }

        mismatches
    }
}
