//! Git repository inspection and diff generation.

pub mod diff;
pub mod inspector;

pub use diff::{COMMITTED_CHANGES_HEADER, STAGED_CHANGES_HEADER, UNSTAGED_CHANGES_HEADER};
pub use inspector::{DiffTotals, GitInfo, GitInspector};
