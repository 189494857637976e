use anyhow::Result;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

use crate::core::comment::ReviewComment;
use crate::core::diff_index::DiffIndex;
use crate::core::match_text::extract_match_text;
use crate::core::similarity::{MatchCandidate, SimilarityMatcher};

pub const DEFAULT_MIN_SCORE: f32 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Corrected,
    Unchanged,
    NoAddedLinesForFile,
    EmptyTextOrNoLines,
    LowConfidence,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Corrected => "corrected",
            Decision::Unchanged => "unchanged:best_match_same_line",
            Decision::NoAddedLinesForFile => "skipped:no_added_lines_for_file",
            Decision::EmptyTextOrNoLines => "skipped:empty_text_or_no_lines",
            Decision::LowConfidence => "skipped:low_confidence",
        }
    }

    /// Reason recorded in `skipped_comments`, if this decision is a skip.
    pub fn skip_reason(&self) -> Option<&'static str> {
        match self {
            Decision::NoAddedLinesForFile => Some("no_added_lines_for_file"),
            Decision::EmptyTextOrNoLines => Some("empty_text_or_no_lines"),
            Decision::LowConfidence => Some("low_confidence"),
            Decision::Corrected | Decision::Unchanged => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Decision {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Per-comment record written to the diagnostic file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub path: String,
    pub decision: Decision,
    pub original_line: Option<Value>,
    pub best_match_line: Option<usize>,
    pub best_score: Option<f32>,
    pub top_candidates: Vec<MatchCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedComment {
    pub file_path: String,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    pub body_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_match_line: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct CommentOutcome {
    pub decision: Decision,
    /// Reanchored copy when the match was accepted, otherwise the input as-is.
    pub comment: ReviewComment,
    pub audit: AuditEntry,
    pub skipped: Option<SkippedComment>,
}

#[derive(Debug, Clone, Default)]
pub struct CorrectionReport {
    pub comments: Vec<ReviewComment>,
    pub audit: Vec<AuditEntry>,
    pub skipped: Vec<SkippedComment>,
}

impl CorrectionReport {
    pub fn processed(&self) -> usize {
        self.comments.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Accepted matches, whether or not the line actually moved.
    pub fn corrected_count(&self) -> usize {
        self.processed().saturating_sub(self.skipped_count())
    }

    pub fn count(&self, decision: Decision) -> usize {
        self.audit.iter().filter(|a| a.decision == decision).count()
    }
}

/// Decides, comment by comment, where each draft comment should be anchored.
pub struct CorrectionEngine<'a> {
    index: &'a DiffIndex,
    matcher: SimilarityMatcher,
    min_score: f32,
    annotate_matches: bool,
}

impl<'a> CorrectionEngine<'a> {
    pub fn new(index: &'a DiffIndex, matcher: SimilarityMatcher, min_score: f32) -> Self {
        Self {
            index,
            matcher,
            min_score: clamp_score(min_score),
            annotate_matches: false,
        }
    }

    /// Accepted matches also record `matched_line`, `line_content` and `similarity`.
    pub fn annotate_matches(mut self, enabled: bool) -> Self {
        self.annotate_matches = enabled;
        self
    }

    pub fn min_score(&self) -> f32 {
        self.min_score
    }

    pub fn embedded_files(&self) -> usize {
        self.matcher.cached_files()
    }

    pub async fn run(&mut self, comments: Vec<ReviewComment>) -> Result<CorrectionReport> {
        let mut report = CorrectionReport::default();

        for comment in comments {
            let outcome = self.evaluate(&comment).await?;
            debug!(
                "{} line {:?} -> {}",
                outcome.audit.path, outcome.audit.original_line, outcome.decision
            );
            report.comments.push(outcome.comment);
            report.audit.push(outcome.audit);
            if let Some(skipped) = outcome.skipped {
                report.skipped.push(skipped);
            }
        }

        Ok(report)
    }

    /// Only embedding failures are errors; everything else degrades to a skip.
    pub async fn evaluate(&mut self, comment: &ReviewComment) -> Result<CommentOutcome> {
        let index = self.index;
        let original_line = comment.original_line().cloned();

        let Some((path, lines)) = comment
            .path()
            .and_then(|path| index.get(path).map(|lines| (path, lines)))
        else {
            let path = comment.path().unwrap_or_default().to_string();
            info!("Skipping comment on {:?}: file has no reviewable diff", path);
            return Ok(skip(comment, path, Decision::NoAddedLinesForFile, original_line, None));
        };

        let match_text = extract_match_text(comment.body(), comment.fields());
        if lines.is_empty() || match_text.trim().is_empty() {
            info!("Skipping comment on {}: nothing to match", path);
            return Ok(skip(
                comment,
                path.to_string(),
                Decision::EmptyTextOrNoLines,
                original_line,
                None,
            ));
        }

        let ranking = self.matcher.rank(path, lines, &match_text).await?;
        let best = ranking.best;
        if best.similarity_score < self.min_score {
            info!(
                "Skipping comment on {}: best score {:.3} below {:.3}",
                path, best.similarity_score, self.min_score
            );
            return Ok(skip(
                comment,
                path.to_string(),
                Decision::LowConfidence,
                original_line,
                Some((best, ranking.top_candidates)),
            ));
        }

        let decision = if comment.claims_line(best.line_number) {
            Decision::Unchanged
        } else {
            Decision::Corrected
        };

        let mut reanchored = comment.reanchored(path, best.line_number);
        if self.annotate_matches {
            if let Some(line) = lines.iter().find(|l| l.line_number == best.line_number) {
                reanchored = reanchored.with_match_annotation(&line.content, best.similarity_score);
            }
        }

        Ok(CommentOutcome {
            decision,
            comment: reanchored,
            audit: AuditEntry {
                path: path.to_string(),
                decision,
                original_line,
                best_match_line: Some(best.line_number),
                best_score: Some(best.similarity_score),
                top_candidates: ranking.top_candidates,
            },
            skipped: None,
        })
    }
}

fn skip(
    comment: &ReviewComment,
    path: String,
    decision: Decision,
    original_line: Option<Value>,
    best: Option<(MatchCandidate, Vec<MatchCandidate>)>,
) -> CommentOutcome {
    let (best, top_candidates) = match best {
        Some((best, top)) => (Some(best), top),
        None => (None, Vec::new()),
    };

    CommentOutcome {
        decision,
        comment: comment.clone(),
        audit: AuditEntry {
            path: path.clone(),
            decision,
            original_line,
            best_match_line: best.map(|b| b.line_number),
            best_score: best.map(|b| b.similarity_score),
            top_candidates,
        },
        skipped: Some(SkippedComment {
            file_path: path,
            reason: decision.skip_reason().unwrap_or_default(),
            score: best.map(|b| b.similarity_score),
            body_preview: comment.body_preview(),
            best_match_line: best.map(|b| b.line_number),
        }),
    }
}

pub fn clamp_score(score: f32) -> f32 {
    if score.is_nan() {
        return DEFAULT_MIN_SCORE;
    }
    score.clamp(0.0, 1.0)
}
