//! Turns caller-supplied target specs into branch names for one repository.

/// A `--to` value: a bare branch, or `repo:branch` scoped to one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchTarget {
    Any(String),
    Scoped { repo: String, branch: String },
}

impl BranchTarget {
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((repo, branch)) => BranchTarget::Scoped {
                repo: repo.to_string(),
                branch: branch.to_string(),
            },
            None => BranchTarget::Any(spec.to_string()),
        }
    }

    /// The branch to use when processing `repo`, if this target applies to it.
    pub fn branch_for(&self, repo: &str) -> Option<&str> {
        match self {
            BranchTarget::Any(branch) => Some(branch),
            BranchTarget::Scoped { repo: scope, branch } if scope == repo => Some(branch),
            BranchTarget::Scoped { .. } => None,
        }
    }
}

/// Branches to process for `repo`, in caller order, duplicates kept.
pub fn resolve_targets<S: AsRef<str>>(specs: &[S], repo: &str) -> Vec<String> {
    specs
        .iter()
        .map(|s| BranchTarget::parse(s.as_ref()))
        .filter_map(|t| t.branch_for(repo).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_targets_only_apply_to_their_repo() {
        let specs = ["main", "serviceB:release-2"];
        assert_eq!(resolve_targets(&specs, "serviceA"), vec!["main"]);
        assert_eq!(resolve_targets(&specs, "serviceB"), vec!["main", "release-2"]);
    }

    #[test]
    fn order_and_duplicates_preserved() {
        let specs = ["release-2.0", "api:release-1.0", "release-2.0"];
        assert_eq!(
            resolve_targets(&specs, "api"),
            vec!["release-2.0", "release-1.0", "release-2.0"]
        );
    }

    #[test]
    fn no_targets_for_unrelated_repo() {
        let specs = vec!["api:release-1.0".to_string()];
        assert!(resolve_targets(&specs, "dashboard").is_empty());
    }

    #[test]
    fn parse_bare_and_scoped() {
        assert_eq!(BranchTarget::parse("main"), BranchTarget::Any("main".to_string()));
        let scoped = BranchTarget::parse("api:release/1.x");
        assert_eq!(scoped.branch_for("api"), Some("release/1.x"));
        assert_eq!(scoped.branch_for("web"), None);
    }
}
