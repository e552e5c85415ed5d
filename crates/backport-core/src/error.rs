//! Error taxonomy for backport runs.

/// Errors produced while backporting a pull request.
#[derive(Debug, thiserror::Error)]
pub enum BackportError {
    /// Missing credentials or a malformed command target.
    #[error("configuration error: {0}")]
    Config(String),

    /// The pull request is not in a releasable state.
    #[error("can't release pull request {url}: state is `{state}`, expected `closed`")]
    State { url: String, state: String },

    /// The repository cache could not be prepared.
    #[error("workspace error for {path}: {reason}")]
    Workspace { path: String, reason: String },

    /// The target branch could not be checked out from origin.
    #[error("checkout error for `{branch}` branch: {reason}")]
    Checkout { branch: String, reason: String },

    /// The branch history could not be searched for the change.
    #[error("classification error for `{branch}` branch: {reason}")]
    Classification { branch: String, reason: String },

    /// Cherry-pick produced a diagnostic that is neither an empty diff nor a conflict.
    #[error("cherry-pick of {sha} onto `{branch}` failed: {diagnostic}")]
    CherryPick {
        sha: String,
        branch: String,
        diagnostic: String,
    },

    /// Pushing a backported branch to origin was rejected.
    #[error("can't push `{branch}` to origin: {reason}")]
    Push { branch: String, reason: String },

    /// Another invocation holds the repository workspace.
    #[error("workspace {path} is locked by another backport run")]
    Lock { path: String },

    /// A URL or target string did not describe an issue or pull request.
    #[error("invalid reference `{0}`")]
    InvalidReference(String),

    /// A git command failed outside the classified outcomes.
    #[error("git error: {0}")]
    Git(String),

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The hosting API answered with a non-success status.
    #[error("api error ({status}) for {endpoint}: {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackportError {
    /// Whether this error must stop the branch loop of the current pull request.
    ///
    /// Errors that leave the shared workspace in an unknown state are fatal;
    /// per-branch checkout and history search failures are isolated.
    pub fn is_fatal_for_pull_request(&self) -> bool {
        !matches!(
            self,
            BackportError::Checkout { .. } | BackportError::Classification { .. }
        )
    }

    /// Whether the hosting API reported the resource as missing or hidden.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackportError::Api { status: 404 | 410 | 403, .. })
    }
}

/// Result type for backport operations.
pub type BackportResult<T> = std::result::Result<T, BackportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_display() {
        let err = BackportError::State {
            url: "https://github.com/acme/api/pull/7".to_string(),
            state: "open".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("acme/api/pull/7"));
        assert!(msg.contains("`open`"));
    }

    #[test]
    fn test_checkout_and_classification_are_isolated() {
        let checkout = BackportError::Checkout {
            branch: "release-1.0".to_string(),
            reason: "no such ref".to_string(),
        };
        assert!(!checkout.is_fatal_for_pull_request());

        let search = BackportError::Classification {
            branch: "release-1.0".to_string(),
            reason: "bad revision".to_string(),
        };
        assert!(!search.is_fatal_for_pull_request());
    }

    #[test]
    fn test_push_and_cherry_pick_are_fatal() {
        let push = BackportError::Push {
            branch: "release-1.0".to_string(),
            reason: "rejected".to_string(),
        };
        assert!(push.is_fatal_for_pull_request());
        assert!(push.to_string().contains("release-1.0"));

        let pick = BackportError::CherryPick {
            sha: "abc123".to_string(),
            branch: "main".to_string(),
            diagnostic: "is a merge but no -m option was given".to_string(),
        };
        assert!(pick.is_fatal_for_pull_request());
    }

    #[test]
    fn test_api_not_found() {
        let err = BackportError::Api {
            status: 404,
            endpoint: "/repos/acme/api/issues/1".to_string(),
            message: "Not Found".to_string(),
        };
        assert!(err.is_not_found());

        let err = BackportError::Api {
            status: 500,
            endpoint: "/repos/acme/api/issues/1".to_string(),
            message: "boom".to_string(),
        };
        assert!(!err.is_not_found());
    }
}
