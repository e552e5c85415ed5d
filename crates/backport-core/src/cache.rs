//! Local mirrors of remote repositories, one per `(org, repo)`.
//!
//! Mirrors live under `<root>/<org>/<repo>` and are kept between runs. A
//! sibling `<repo>.lock` file guards each mirror against a second,
//! independently launched invocation.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{BackportError, BackportResult};
use crate::git::{GitExecutor, Repo};

/// Root directory holding every repository mirror.
#[derive(Debug, Clone)]
pub struct RepositoryCache {
    root: PathBuf,
}

impl RepositoryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, org: &str, repo: &str) -> PathBuf {
        self.root.join(org).join(repo)
    }

    fn lock_path(&self, org: &str, repo: &str) -> PathBuf {
        self.root.join(org).join(format!("{repo}.lock"))
    }

    /// Take the exclusive workspace lock for `(org, repo)` without blocking.
    pub fn lock(&self, org: &str, repo: &str) -> BackportResult<WorkspaceLock> {
        let path = self.lock_path(org, repo);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        if !try_lock_exclusive(&file)? {
            return Err(BackportError::Lock {
                path: path.display().to_string(),
            });
        }

        Ok(WorkspaceLock { _file: file, path })
    }

    /// Make sure `path` holds an up-to-date, clean clone of `url`.
    ///
    /// Clones when missing; a clone failure is fatal. The fetch and hard
    /// reset that follow are best effort and only logged.
    pub async fn ensure(
        &self,
        git: &dyn GitExecutor,
        url: &str,
        path: &Path,
    ) -> BackportResult<()> {
        let repo = Repo::new(git, path);

        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            info!(url, path = %path.display(), "cloning repository");
            repo.clone_from(url).await?;
        }

        refresh(&repo).await;
        Ok(())
    }
}

/// Fetch origin and hard-reset the working tree, logging failures.
pub async fn refresh(repo: &Repo<'_>) {
    if let Err(e) = repo.fetch_origin().await {
        warn!(path = %repo.path().display(), error = %e, "fetch origin failed");
    }
    if let Err(e) = repo.reset_hard().await {
        warn!(path = %repo.path().display(), error = %e, "reset --hard failed");
    }
}

/// RAII guard for an exclusively held repository workspace.
///
/// The advisory lock is released by the OS when the file is closed on drop.
pub struct WorkspaceLock {
    _file: File,
    path: PathBuf,
}

impl fmt::Debug for WorkspaceLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceLock")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: `fd` is a valid open descriptor owned by `file` for the whole call.
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<bool> {
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_for_is_org_then_repo() {
        let cache = RepositoryCache::new("/tmp/git_cache");
        assert_eq!(
            cache.path_for("acme", "gateway"),
            PathBuf::from("/tmp/git_cache/acme/gateway")
        );
    }

    #[cfg(unix)]
    #[test]
    fn second_lock_on_same_repo_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RepositoryCache::new(dir.path());

        let first = cache.lock("acme", "gateway").unwrap();
        let second = cache.lock("acme", "gateway");
        assert!(matches!(second, Err(BackportError::Lock { .. })));

        // Other repositories are independent.
        let _other = cache.lock("acme", "dashboard").unwrap();

        drop(first);
        assert!(cache.lock("acme", "gateway").is_ok());
    }
}
