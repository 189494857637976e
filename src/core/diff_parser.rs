use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::diff_index::PrFile;

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@@ -(\d+),?\d* \+(\d+),?\d* @@").unwrap());

/// A line that exists only in the new version of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedLine {
    pub line_number: usize,
    pub content: String,
}

pub struct DiffParser;

impl DiffParser {
    /// Walks one file's patch and returns its added lines numbered against the new file.
    pub fn parse_patch(patch: &str) -> Vec<AddedLine> {
        let mut added = Vec::new();
        let mut old_line: usize = 0;
        let mut new_line: usize = 0;

        for raw in patch.lines() {
            // "\ No newline at end of file" and friends
            if raw.starts_with('\\') || raw.starts_with("+++") || raw.starts_with("---") {
                continue;
            }

            if raw.starts_with("@@") {
                if let Some((old_start, new_start)) = Self::parse_hunk_header(raw) {
                    old_line = old_start.saturating_sub(1);
                    new_line = new_start.saturating_sub(1);
                }
                continue;
            }

            if let Some(content) = raw.strip_prefix('+') {
                added.push(AddedLine {
                    line_number: new_line + 1,
                    content: if content.is_empty() {
                        "\n".to_string()
                    } else {
                        content.to_string()
                    },
                });
                new_line += 1;
            } else if raw.starts_with('-') {
                old_line += 1;
            } else {
                old_line += 1;
                new_line += 1;
            }
        }

        added
    }

    /// Splits a multi-file unified diff into per-file records shaped like the
    /// GitHub pull request file list.
    pub fn split_unified_diff(diff_content: &str) -> Vec<PrFile> {
        let lines: Vec<&str> = diff_content.lines().collect();
        let mut files = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            if lines[i].starts_with("diff --git") {
                files.push(Self::parse_single_file_diff(&lines, &mut i));
            } else if Self::is_file_header(&lines, i) {
                files.push(Self::parse_simple_file_diff(&lines, &mut i));
            } else {
                i += 1;
            }
        }

        files.retain(|file| !file.filename.is_empty());
        files
    }

    fn is_file_header(lines: &[&str], i: usize) -> bool {
        lines[i].starts_with("--- ") && i + 1 < lines.len() && lines[i + 1].starts_with("+++ ")
    }

    fn parse_single_file_diff(lines: &[&str], i: &mut usize) -> PrFile {
        let mut filename = Self::extract_git_header_path(lines[*i]).unwrap_or_default();
        *i += 1;

        let mut old_path = None;
        let mut new_path = None;
        let mut is_binary = false;

        while *i < lines.len() && !lines[*i].starts_with("@@") && !lines[*i].starts_with("diff --git") {
            let line = lines[*i];
            if line.starts_with("Binary files") || line.starts_with("GIT binary patch") {
                is_binary = true;
            } else if let Some(path) = line.strip_prefix("--- ") {
                old_path = Some(Self::clean_header_path(path));
            } else if let Some(path) = line.strip_prefix("+++ ") {
                new_path = Some(Self::clean_header_path(path));
            } else if line.starts_with("deleted file mode") {
                new_path = Some("/dev/null".to_string());
            } else if line.starts_with("new file mode") {
                old_path = Some("/dev/null".to_string());
            }
            *i += 1;
        }

        let body_start = *i;
        while *i < lines.len() && !lines[*i].starts_with("diff --git") {
            *i += 1;
        }

        let status = Self::status_for(old_path.as_deref(), new_path.as_deref());
        if let Some(path) = new_path.as_deref().filter(|p| *p != "/dev/null") {
            filename = path.to_string();
        }

        PrFile {
            filename,
            status: Some(status.to_string()),
            patch: Self::collect_patch(&lines[body_start..*i], is_binary),
        }
    }

    fn parse_simple_file_diff(lines: &[&str], i: &mut usize) -> PrFile {
        let old_path = Self::clean_header_path(lines[*i].trim_start_matches("--- "));
        let new_path = Self::clean_header_path(lines[*i + 1].trim_start_matches("+++ "));
        *i += 2;

        let body_start = *i;
        let mut is_binary = false;
        while *i < lines.len()
            && !lines[*i].starts_with("diff --git")
            && !Self::is_file_header(lines, *i)
        {
            if lines[*i].starts_with("Binary files") || lines[*i].starts_with("GIT binary patch") {
                is_binary = true;
            }
            *i += 1;
        }

        let status = Self::status_for(Some(&old_path), Some(&new_path));
        let filename = if new_path != "/dev/null" { new_path } else { old_path };

        PrFile {
            filename,
            status: Some(status.to_string()),
            patch: Self::collect_patch(&lines[body_start..*i], is_binary),
        }
    }

    fn collect_patch(body: &[&str], is_binary: bool) -> Option<String> {
        if is_binary {
            return None;
        }
        let first_hunk = body.iter().position(|line| line.starts_with("@@"))?;
        Some(body[first_hunk..].join("\n"))
    }

    fn status_for(old_path: Option<&str>, new_path: Option<&str>) -> &'static str {
        match (old_path, new_path) {
            (_, Some("/dev/null")) => "removed",
            (Some("/dev/null"), _) => "added",
            _ => "modified",
        }
    }

    fn extract_git_header_path(line: &str) -> Option<String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 {
            Some(parts[3].trim_start_matches("b/").to_string())
        } else {
            None
        }
    }

    fn clean_header_path(raw: &str) -> String {
        let raw = raw.trim();
        let path = raw.split('\t').next().unwrap_or(raw).trim();
        if path == "/dev/null" {
            return path.to_string();
        }
        path.strip_prefix("a/")
            .or_else(|| path.strip_prefix("b/"))
            .unwrap_or(path)
            .to_string()
    }

    fn parse_hunk_header(header: &str) -> Option<(usize, usize)> {
        let caps = HUNK_HEADER.captures(header)?;
        let old_start = caps.get(1)?.as_str().parse().ok()?;
        let new_start = caps.get(2)?.as_str().parse().ok()?;
        Some((old_start, new_start))
    }
}
