pub mod comment;
pub mod correction;
pub mod diff_index;
pub mod diff_parser;
pub mod git;
pub mod input;
pub mod match_text;
pub mod payload;
pub mod similarity;

pub use correction::{CorrectionEngine, Decision};
pub use diff_index::DiffIndex;
pub use diff_parser::DiffParser;
pub use git::GitIntegration;
pub use payload::CommentEnvelope;
pub use similarity::SimilarityMatcher;
