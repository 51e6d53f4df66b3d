//! # git-reviewer
//!
//! Multi-model AI code review for git branches.
//!
//! git-reviewer assembles a structured review prompt from a git diff plus
//! optional context files, submits it to several language models in parallel
//! through the external `nllm` execution tool, and renders the returned
//! results.
//!
//! ## Quick Start
//!
//! ```no_run
//! use git_reviewer::review::{run_review, ReviewRequest};
//! use git_reviewer::dispatch::NllmDispatcher;
//!
//! # async fn example() -> git_reviewer::Result<()> {
//! let request = ReviewRequest {
//!     models: vec!["gpt-4.1".to_string()],
//!     ..ReviewRequest::default()
//! };
//! let results = run_review(&request, &NllmDispatcher::new()).await?;
//! println!("{} model(s) succeeded", results.ok_count());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod git;
pub mod presenter;
pub mod review;
pub mod template;

pub use crate::cli::Cli;
pub use crate::error::{ReviewerError, Result};

/// The current version of git-reviewer.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
