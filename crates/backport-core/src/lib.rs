//! Backport Core Library
//!
//! Releases an already-merged pull request onto maintenance branches:
//! decides per branch whether the change is already present, cherry-picks it
//! when it is not, and records the backport on every linked issue.

pub mod board;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod git;
pub mod hosting;
pub mod notifier;
pub mod outcome;
pub mod references;
pub mod release;
pub mod resolver;
pub mod telemetry;

pub use board::{column_items, find_linked_pull_requests, BoardItem};
pub use cache::{RepositoryCache, WorkspaceLock};
pub use classifier::{classify, CommitFingerprint, MergeState};
pub use config::BackportConfig;
pub use error::{BackportError, BackportResult};
pub use git::{CherryPickResult, GitExecutor, GitOutput, ProcessGit, PushResult, Repo};
pub use hosting::{CodeHost, Comment, GitHubClient, Issue, PullRequest};
pub use notifier::{comment_body, notify_linked_issues};
pub use outcome::{
    BranchReport, BranchStatus, Detection, Glyph, MergeOutcome, NotificationSummary,
    ReleaseReport,
};
pub use references::{ProjectRef, Reference, ReferenceKind};
pub use release::{ReleaseOptions, Releaser};
pub use resolver::{resolve_targets, BranchTarget};
pub use telemetry::init_tracing;

/// Backport version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
