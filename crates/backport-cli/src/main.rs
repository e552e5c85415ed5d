//! Backport CLI
//!
//! The `backport` command carries merged pull requests onto maintenance
//! branches.
//!
//! ## Commands
//!
//! - `release`: backport one pull request onto the given branches
//! - `project-release`: backport every pull request linked from a project board column

mod render;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use backport_core::{
    column_items, find_linked_pull_requests, BackportConfig, BoardItem, CodeHost, GitHubClient,
    Glyph, ProcessGit, ProjectRef, Reference, ReferenceKind, ReleaseOptions, Releaser,
    RepositoryCache,
};

use render::{glyph, report_lines, RenderOptions};

#[derive(Parser)]
#[command(name = "backport")]
#[command(author = "Stevedores Org")]
#[command(version = backport_core::VERSION)]
#[command(about = "Backport merged pull requests onto release branches", long_about = None)]
struct Cli {
    /// Personal access token for the GitHub API
    #[arg(long, alias = "auth", env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    github_token: Option<String>,

    /// Organisation used for `<repo>/<number>` targets
    #[arg(long, alias = "org", env = "GITHUB_ORG", global = true)]
    github_org: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", global = true)]
    api_url: Option<String>,

    /// Directory holding the local repository mirrors
    #[arg(long, env = "BACKPORT_CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Base URL repositories are cloned from
    #[arg(long, env = "BACKPORT_CLONE_URL", global = true)]
    clone_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backport a merged pull request
    Release {
        /// Pull request URL or `<repo>/<number>`
        target: String,

        /// Destination branch, optionally scoped as `<repo>:<branch>` (repeatable)
        #[arg(long = "to", alias = "merge-to", required = true)]
        to: Vec<String>,

        /// Cherry-pick locally without pushing or commenting
        #[arg(long)]
        dry_run: bool,
    },

    /// Backport every pull request linked from a project board column
    ProjectRelease {
        /// Project URL, `https://github.com/orgs/<org>/projects/<number>`
        project: String,

        /// Column name, e.g. "Ready to release"
        column: String,

        /// Destination branch, optionally scoped as `<repo>:<branch>` (repeatable)
        #[arg(long = "to", alias = "merge-to", required = true)]
        to: Vec<String>,

        /// Cherry-pick locally without pushing or commenting
        #[arg(long)]
        dry_run: bool,

        /// Only show branches that still need attention
        #[arg(long)]
        only_missing: bool,
    },
}

impl Cli {
    fn config(&self) -> BackportConfig {
        let mut config = BackportConfig::from_env();
        if let Some(token) = &self.github_token {
            config.token = token.clone();
        }
        if let Some(org) = &self.github_org {
            config = config.with_org(org);
        }
        if let Some(api_url) = &self.api_url {
            config = config.with_api_url(api_url);
        }
        if let Some(dir) = &self.cache_dir {
            config = config.with_cache_root(dir);
        }
        if let Some(url) = &self.clone_url {
            config = config.with_clone_base_url(url);
        }
        config
    }
}

/// Collaborators shared by both commands.
struct App {
    config: BackportConfig,
    git: ProcessGit,
    host: GitHubClient,
    cache: RepositoryCache,
}

impl App {
    fn new(config: BackportConfig) -> Result<Self> {
        config.validate()?;
        let host = GitHubClient::new(&config.token, &config.api_url)
            .context("Failed to create GitHub client")?;
        Ok(Self {
            git: ProcessGit::new(),
            host,
            cache: RepositoryCache::new(config.cache_root.clone()),
            config,
        })
    }

    fn releaser(&self, dry_run: bool) -> Releaser<'_> {
        Releaser::new(
            &self.git,
            &self.host,
            &self.cache,
            ReleaseOptions::new(&self.config.clone_base_url, dry_run),
        )
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    backport_core::init_tracing(cli.json, level);

    let app = App::new(cli.config())?;

    let ok = match cli.command {
        Commands::Release {
            target,
            to,
            dry_run,
        } => cmd_release(&app, &target, &to, dry_run).await?,
        Commands::ProjectRelease {
            project,
            column,
            to,
            dry_run,
            only_missing,
        } => cmd_project_release(&app, &project, &column, &to, dry_run, only_missing).await?,
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Parse a `release` target into a pull request reference.
fn pull_request_target(target: &str, org: Option<&str>) -> Result<Reference> {
    let reference = Reference::parse_target(target, org)?;
    if reference.kind != ReferenceKind::Pull {
        bail!("`{target}` is not a pull request");
    }
    Ok(reference)
}

/// Backport one pull request and print its report.
async fn cmd_release(app: &App, target: &str, to: &[String], dry_run: bool) -> Result<bool> {
    let pr = pull_request_target(target, app.config.org.as_deref())?;
    let report = app
        .releaser(dry_run)
        .release(&pr, to)
        .await
        .with_context(|| format!("Failed to backport {pr}"))?;

    for line in report_lines(&report, RenderOptions::default()) {
        println!("{line}");
    }
    Ok(report.exit_ok())
}

/// Backport every pull request reachable from one project board column.
async fn cmd_project_release(
    app: &App,
    project_url: &str,
    column: &str,
    to: &[String],
    dry_run: bool,
    only_missing: bool,
) -> Result<bool> {
    let project = ProjectRef::parse(project_url)?;
    let board = BoardRelease {
        host: &app.host,
        releaser: app.releaser(dry_run),
        to,
        only_missing,
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    board.run(&project, column, &mut out).await
}

/// Walks one board column: card, issue, linked pull requests, backport.
struct BoardRelease<'a> {
    host: &'a dyn CodeHost,
    releaser: Releaser<'a>,
    to: &'a [String],
    only_missing: bool,
}

impl BoardRelease<'_> {
    /// Returns false when any pull request failed; per-card errors never stop the walk.
    async fn run(&self, project: &ProjectRef, column: &str, out: &mut dyn Write) -> Result<bool> {
        let items = column_items(self.host, project, column)
            .await
            .with_context(|| format!("Failed to load column `{column}`"))?;

        if items.is_empty() {
            writeln!(out, "No cards in column `{column}`")?;
            return Ok(true);
        }

        let mut ok = true;
        for item in items {
            match item {
                BoardItem::Issue(issue) => {
                    ok &= self.release_issue(&issue, out).await?;
                }
                BoardItem::Pull(pr) => {
                    writeln!(out, "Pull request {}", pr.html_url())?;
                    ok &= self.release_embedded(&pr, 2, out).await?;
                }
                BoardItem::Other {
                    card_id,
                    content_url,
                } => {
                    info!(card_id, content_url = ?content_url, "skipping card without issue");
                    continue;
                }
            }
            writeln!(out)?;
        }
        Ok(ok)
    }

    async fn release_issue(&self, issue: &Reference, out: &mut dyn Write) -> Result<bool> {
        match self.host.issue(issue).await {
            Ok(details) => writeln!(out, "Issue #{}: {}", details.number, details.title)?,
            Err(e) => {
                writeln!(out, "{} Can't load issue {}: {e}", glyph(Glyph::Failure), issue)?;
                return Ok(false);
            }
        }

        let url = issue.html_url();
        let linked = match find_linked_pull_requests(self.host, issue).await {
            Ok(linked) => dedup(linked),
            Err(e) => {
                writeln!(out, "  {} Can't read timeline of {url}: {e}", glyph(Glyph::Failure))?;
                return Ok(false);
            }
        };

        if linked.is_empty() {
            writeln!(out, "  {} Can't find PR for Issue {url}", glyph(Glyph::Failure))?;
            return Ok(true);
        }
        writeln!(
            out,
            "  {} Found {} PRs for Issue {url}",
            glyph(Glyph::Success),
            linked.len()
        )?;

        let mut ok = true;
        for pr in &linked {
            ok &= self.release_embedded(pr, 4, out).await?;
        }
        Ok(ok)
    }

    /// Backport `pr` and write a compact report; a failed backport writes a glyph line.
    async fn release_embedded(
        &self,
        pr: &Reference,
        indent: usize,
        out: &mut dyn Write,
    ) -> Result<bool> {
        match self.releaser.release(pr, self.to).await {
            Ok(report) => {
                let opts = RenderOptions {
                    indent,
                    compact: true,
                    only_missing: self.only_missing,
                };
                for line in report_lines(&report, opts) {
                    writeln!(out, "{line}")?;
                }
                Ok(report.exit_ok())
            }
            Err(e) => {
                writeln!(
                    out,
                    "{}{} {}: {e}",
                    " ".repeat(indent),
                    glyph(Glyph::Failure),
                    pr
                )?;
                Ok(false)
            }
        }
    }
}

/// Drop repeated references, keeping first-seen order.
fn dedup(refs: Vec<Reference>) -> Vec<Reference> {
    let mut seen = Vec::with_capacity(refs.len());
    for r in refs {
        if !seen.contains(&r) {
            seen.push(r);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use backport_core::fakes::MemoryCodeHost;
    use backport_core::hosting::{Project, ProjectCard, ProjectColumn, TimelineEvent};

    #[test]
    fn cli_parses_release_with_aliases() {
        let cli = Cli::try_parse_from([
            "backport",
            "--org",
            "acme",
            "release",
            "api/7",
            "--to",
            "release-1.0",
            "--merge-to",
            "dashboard:release-2.0",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.github_org.as_deref(), Some("acme"));
        match cli.command {
            Commands::Release { target, to, dry_run } => {
                assert_eq!(target, "api/7");
                assert_eq!(to, vec!["release-1.0", "dashboard:release-2.0"]);
                assert!(dry_run);
            }
            _ => panic!("expected release"),
        }
    }

    #[test]
    fn release_requires_a_destination() {
        assert!(Cli::try_parse_from(["backport", "release", "api/7"]).is_err());
    }

    #[test]
    fn cli_parses_project_release() {
        let cli = Cli::try_parse_from([
            "backport",
            "project-release",
            "https://github.com/orgs/acme/projects/3",
            "Ready to release",
            "--to",
            "release-1.0",
            "--only-missing",
        ])
        .unwrap();
        match cli.command {
            Commands::ProjectRelease {
                project,
                column,
                only_missing,
                dry_run,
                ..
            } => {
                assert_eq!(project, "https://github.com/orgs/acme/projects/3");
                assert_eq!(column, "Ready to release");
                assert!(only_missing);
                assert!(!dry_run);
            }
            _ => panic!("expected project-release"),
        }
    }

    #[test]
    fn release_target_must_be_a_pull_request() {
        assert!(pull_request_target("https://github.com/acme/api/issues/10", None).is_err());
        let pr = pull_request_target("api/7", Some("acme")).unwrap();
        assert_eq!(pr.to_string(), "acme/api#7");
    }

    fn board_host() -> MemoryCodeHost {
        let host = MemoryCodeHost::new();
        host.add_project(
            "acme",
            Project { id: 900, number: 3, name: "Releases".to_string() },
        );
        host.add_column(900, ProjectColumn { id: 42, name: "Ready to release".to_string() });
        host.add_column(900, ProjectColumn { id: 43, name: "Done".to_string() });
        host
    }

    fn card(id: u64, content_url: Option<&str>) -> ProjectCard {
        ProjectCard {
            id,
            content_url: content_url.map(str::to_string),
            note: content_url.is_none().then(|| "note".to_string()),
        }
    }

    fn project() -> ProjectRef {
        ProjectRef { org: "acme".to_string(), number: 3 }
    }

    #[tokio::test]
    async fn board_release_reports_each_card_and_keeps_going() {
        let tmp = tempfile::tempdir().unwrap();
        let host = board_host();
        host.add_card(42, card(1, Some("https://api.github.com/repos/acme/api/issues/10")));
        host.add_card(42, card(2, None));
        host.add_card(42, card(3, Some("https://api.github.com/repos/acme/api/issues/11")));

        let crash = Reference::new("acme", "api", ReferenceKind::Issue, 10);
        let docs = Reference::new("acme", "api", ReferenceKind::Issue, 11);
        host.add_issue(&crash, "Crash on empty input");
        host.add_issue(&docs, "Document flags");
        for _ in 0..2 {
            host.add_timeline_event(
                &crash,
                TimelineEvent::cross_reference("https://github.com/acme/api/pull/7"),
            );
        }

        // No repository exists under this base, so the clone fails.
        let git = ProcessGit::new();
        let cache = RepositoryCache::new(tmp.path().join("cache"));
        let remotes = tmp.path().join("remotes");
        let to = vec!["release-1.0".to_string()];
        let board = BoardRelease {
            host: &host,
            releaser: Releaser::new(
                &git,
                &host,
                &cache,
                ReleaseOptions::new(remotes.to_str().unwrap(), false),
            ),
            to: &to,
            only_missing: false,
        };

        let mut out = Vec::new();
        let ok = board
            .run(&project(), "Ready to release", &mut out)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(!ok);
        assert!(text.contains("Issue #10: Crash on empty input"));
        assert!(text.contains("Found 1 PRs for Issue https://github.com/acme/api/issues/10"));
        let failure = text.find("acme/api#7:").unwrap();
        let next_issue = text.find("Issue #11: Document flags").unwrap();
        assert!(failure < next_issue);
        assert!(text.contains("Can't find PR for Issue https://github.com/acme/api/issues/11"));
    }

    #[tokio::test]
    async fn board_release_with_empty_column_succeeds() {
        let host = board_host();
        let git = ProcessGit::new();
        let cache = RepositoryCache::new(std::env::temp_dir().join("backport-unused"));
        let board = BoardRelease {
            host: &host,
            releaser: Releaser::new(&git, &host, &cache, ReleaseOptions::new("", true)),
            to: &[],
            only_missing: true,
        };

        let mut out = Vec::new();
        assert!(board.run(&project(), "Done", &mut out).await.unwrap());
        assert!(String::from_utf8(out).unwrap().contains("No cards in column `Done`"));

        let mut out = Vec::new();
        assert!(board.run(&project(), "Missing", &mut out).await.is_err());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let a = Reference::new("acme", "api", ReferenceKind::Pull, 1);
        let b = Reference::new("acme", "api", ReferenceKind::Pull, 2);
        let refs = dedup(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(refs, vec![a, b]);
    }
}
