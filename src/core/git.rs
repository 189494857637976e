use anyhow::{Context, Result};
use git2::{Diff, DiffFormat, Repository};
use std::path::Path;

pub struct GitIntegration {
    repo: Repository,
}

impl GitIntegration {
    pub fn new(repo_path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(repo_path)
            .context("Failed to find git repository")?;
        Ok(Self { repo })
    }

    /// Unified diff of `HEAD` against `base_ref`, as a pull request would show it.
    pub fn branch_diff(&self, base_ref: &str) -> Result<String> {
        let base = self.repo.revparse_single(base_ref)
            .with_context(|| format!("Unknown base ref: {}", base_ref))?
            .peel_to_commit()?;
        let head = self.repo.head()?.peel_to_commit()?;

        let base_tree = base.tree()?;
        let head_tree = head.tree()?;

        let diff = self.repo.diff_tree_to_tree(
            Some(&base_tree),
            Some(&head_tree),
            None
        )?;

        render_patch(&diff)
    }
}

fn render_patch(diff: &Diff<'_>) -> Result<String> {
    let mut diff_text = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        // content lines come without their marker
        if matches!(line.origin(), '+' | '-' | ' ') {
            diff_text.push(line.origin() as u8);
        }
        diff_text.extend_from_slice(line.content());
        true
    })?;

    Ok(String::from_utf8_lossy(&diff_text).to_string())
}
