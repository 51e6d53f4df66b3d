//! Repository validation, branch resolution, and diff generation.

use std::path::Path;

use git2::{BranchType, DiffOptions, Oid, Repository, Status, StatusOptions};

use crate::config::DiffScope;
use crate::error::{ReviewerError, Result};
use crate::git::diff::{
    assemble_sections, render_patch, COMMITTED_CHANGES_HEADER, STAGED_CHANGES_HEADER,
    UNSTAGED_CHANGES_HEADER,
};

/// Change statistics between the merge base and HEAD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffTotals {
    /// Number of files changed.
    pub files: usize,
    /// Number of inserted lines.
    pub insertions: usize,
    /// Number of deleted lines.
    pub deletions: usize,
}

/// Read-only snapshot of the repository state for one run.
///
/// Created once by [`GitInspector::prepare`] after validation; never mutated.
#[derive(Debug, Clone)]
pub struct GitInfo {
    /// Name of the currently checked-out branch.
    pub current_branch: String,
    /// Full hash of the HEAD commit.
    pub head_commit: String,
    /// Base branch name as requested.
    pub base_branch: String,
    /// The ref the base actually resolved to (`origin/<base>` or `<base>`).
    pub base_ref: String,
    /// Full hash of the merge-base commit.
    pub merge_base: String,
    /// Commit range string `<merge_base>..<head>`.
    pub commit_range: String,
    /// Aggregate change statistics for the committed range.
    pub stats: DiffTotals,
    /// Human-readable `--stat` style summary for the committed range.
    pub stat_summary: String,
}

/// Wrapper around an opened repository providing the review operations.
pub struct GitInspector {
    repo: Repository,
}

impl GitInspector {
    /// Opens the repository at `path`.
    ///
    /// Fails with [`ReviewerError::GitRepository`] when the path does not
    /// contain git metadata.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path).map_err(|e| {
            ReviewerError::GitRepository(format!(
                "not a git repository: {}: {}",
                path.display(),
                e.message()
            ))
        })?;
        Ok(Self { repo })
    }

    /// Validates the repository against `base_branch` and captures a
    /// [`GitInfo`] snapshot.
    pub fn prepare(&self, base_branch: &str) -> Result<GitInfo> {
        let current_branch = self.current_branch()?;
        let head_commit = self.head_commit_id()?;
        let (base_ref, base_commit) = self.resolve_base_ref(base_branch)?;
        let merge_base = self.merge_base(head_commit, base_commit, &base_ref)?;

        let (stats, stat_summary) = self.commit_range_stats(merge_base)?;

        tracing::debug!(
            branch = %current_branch,
            base = %base_ref,
            merge_base = %merge_base,
            "prepared repository snapshot"
        );

        Ok(GitInfo {
            current_branch,
            head_commit: head_commit.to_string(),
            base_branch: base_branch.to_string(),
            base_ref,
            merge_base: merge_base.to_string(),
            commit_range: format!("{merge_base}..{head_commit}"),
            stats,
            stat_summary,
        })
    }

    /// Generates the review diff for the prepared snapshot.
    ///
    /// `Committed` scope is the unified diff merge-base → HEAD. `All` scope
    /// appends staged (HEAD vs index) and unstaged (index vs working tree)
    /// sections in that fixed order, each behind its own header; empty
    /// sections are omitted entirely. An overall empty diff is an error.
    pub fn diff(&self, info: &GitInfo, context_lines: u32, scope: DiffScope) -> Result<String> {
        let merge_base = Oid::from_str(&info.merge_base).map_err(|e| {
            ReviewerError::GitRepository(format!("invalid merge-base id: {e}"))
        })?;

        let base_tree = self
            .repo
            .find_commit(merge_base)
            .and_then(|c| c.tree())
            .map_err(|e| git_err("failed to read merge-base tree", &e))?;
        let head_tree = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .and_then(|c| c.tree())
            .map_err(|e| git_err("failed to read HEAD tree", &e))?;

        let committed = render_patch(
            &self
                .repo
                .diff_tree_to_tree(
                    Some(&base_tree),
                    Some(&head_tree),
                    Some(&mut diff_options(context_lines)),
                )
                .map_err(|e| git_err("failed to diff committed changes", &e))?,
        )?;

        let text = match scope {
            DiffScope::Committed => committed.trim().to_string(),
            DiffScope::All => {
                let staged = render_patch(
                    &self
                        .repo
                        .diff_tree_to_index(
                            Some(&head_tree),
                            None,
                            Some(&mut diff_options(context_lines)),
                        )
                        .map_err(|e| git_err("failed to diff staged changes", &e))?,
                )?;
                let unstaged = render_patch(
                    &self
                        .repo
                        .diff_index_to_workdir(None, Some(&mut diff_options(context_lines)))
                        .map_err(|e| git_err("failed to diff unstaged changes", &e))?,
                )?;
                assemble_sections(&[
                    (COMMITTED_CHANGES_HEADER, committed.as_str()),
                    (STAGED_CHANGES_HEADER, staged.as_str()),
                    (UNSTAGED_CHANGES_HEADER, unstaged.as_str()),
                ])
            }
        };

        if text.is_empty() {
            let scope_desc = match scope {
                DiffScope::All => "committed, staged, or unstaged",
                DiffScope::Committed => "committed",
            };
            return Err(ReviewerError::GitRepository(format!(
                "no changes found between the current branch and '{}'. Make sure you have {} changes",
                info.base_branch, scope_desc
            )));
        }

        Ok(text)
    }

    /// Summarizes uncommitted working-tree state, if any.
    ///
    /// Returns `None` when the working tree is clean.
    pub fn working_tree_summary(&self) -> Result<Option<String>> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true);
        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| git_err("failed to read repository status", &e))?;

        let mut staged = false;
        let mut unstaged = false;
        let mut untracked = false;
        for entry in statuses.iter() {
            let flags = entry.status();
            if flags.intersects(
                Status::INDEX_NEW
                    | Status::INDEX_MODIFIED
                    | Status::INDEX_DELETED
                    | Status::INDEX_RENAMED
                    | Status::INDEX_TYPECHANGE,
            ) {
                staged = true;
            }
            if flags.contains(Status::WT_NEW) {
                untracked = true;
            } else if flags.intersects(
                Status::WT_MODIFIED | Status::WT_DELETED | Status::WT_RENAMED | Status::WT_TYPECHANGE,
            ) {
                unstaged = true;
            }
        }

        let mut parts = Vec::new();
        if staged {
            parts.push("staged changes");
        }
        if unstaged {
            parts.push("unstaged changes");
        }
        if untracked {
            parts.push("untracked files");
        }

        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!(
                "working tree has {}; only committed changes are reviewed when diff scope is 'committed'",
                parts.join(", ")
            )))
        }
    }

    /// Returns the current branch name; detached HEAD is an error.
    pub fn current_branch(&self) -> Result<String> {
        let head = self
            .repo
            .head()
            .map_err(|e| git_err("failed to get HEAD reference", &e))?;

        if let Some(name) = head.shorthand() {
            if name != "HEAD" {
                return Ok(name.to_string());
            }
        }

        Err(ReviewerError::GitRepository(
            "repository is in detached HEAD state".to_string(),
        ))
    }

    fn head_commit_id(&self) -> Result<Oid> {
        self.repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map(|c| c.id())
            .map_err(|e| git_err("failed to resolve HEAD commit", &e))
    }

    /// Resolves the base branch, preferring the remote-tracked ref.
    ///
    /// `origin/<base>` wins when it exists so a stale local pointer does not
    /// shift the merge base; the local branch is the fallback.
    fn resolve_base_ref(&self, base_branch: &str) -> Result<(String, Oid)> {
        for candidate in [format!("origin/{base_branch}"), base_branch.to_string()] {
            if let Ok(object) = self.repo.revparse_single(&candidate) {
                if let Ok(commit) = object.peel_to_commit() {
                    return Ok((candidate, commit.id()));
                }
            }
        }

        Err(ReviewerError::GitRepository(format!(
            "base branch '{}' not found locally or on origin (available branches: {})",
            base_branch,
            self.available_branches()
        )))
    }

    /// Lists branch names for error messages, local branches first.
    fn available_branches(&self) -> String {
        let mut names = Vec::new();
        for branch_type in [BranchType::Local, BranchType::Remote] {
            if let Ok(branches) = self.repo.branches(Some(branch_type)) {
                for branch in branches.flatten() {
                    if let Ok(Some(name)) = branch.0.name() {
                        names.push(name.to_string());
                    }
                }
            }
        }
        if names.is_empty() {
            "(none)".to_string()
        } else {
            names.join(", ")
        }
    }

    fn merge_base(&self, head: Oid, base: Oid, base_ref: &str) -> Result<Oid> {
        self.repo.merge_base(head, base).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                ReviewerError::GitRepository(format!(
                    "no merge base found between HEAD and '{base_ref}'. Are you on a branch that diverged from the base branch?"
                ))
            } else {
                git_err("failed to find merge base", &e)
            }
        })
    }

    fn commit_range_stats(&self, merge_base: Oid) -> Result<(DiffTotals, String)> {
        let base_tree = self
            .repo
            .find_commit(merge_base)
            .and_then(|c| c.tree())
            .map_err(|e| git_err("failed to read merge-base tree", &e))?;
        let head_tree = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .and_then(|c| c.tree())
            .map_err(|e| git_err("failed to read HEAD tree", &e))?;

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
            .map_err(|e| git_err("failed to diff commit range", &e))?;
        let stats = diff
            .stats()
            .map_err(|e| git_err("failed to compute diff stats", &e))?;

        let summary = stats
            .to_buf(git2::DiffStatsFormat::FULL, 80)
            .ok()
            .and_then(|buf| buf.as_str().map(|s| s.trim_end().to_string()))
            .unwrap_or_default();

        Ok((
            DiffTotals {
                files: stats.files_changed(),
                insertions: stats.insertions(),
                deletions: stats.deletions(),
            },
            summary,
        ))
    }
}

fn git_err(what: &str, e: &git2::Error) -> ReviewerError {
    ReviewerError::GitRepository(format!("{what}: {}", e.message()))
}

fn diff_options(context_lines: u32) -> DiffOptions {
    let mut opts = DiffOptions::new();
    opts.context_lines(context_lines);
    opts
}
