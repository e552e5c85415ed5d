//! Terminal rendering of release reports.
//!
//! Every function returns plain lines so the command handlers decide where
//! they go and tests can inspect them.

use crossterm::style::Stylize;

use backport_core::{
    BranchReport, BranchStatus, Detection, Glyph, MergeOutcome, ReleaseReport,
};

/// Layout switches for [`report_lines`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Leading spaces on every line.
    pub indent: usize,
    /// One-line header, used when a report is embedded in a board listing.
    pub compact: bool,
    /// Hide branches that need no attention.
    pub only_missing: bool,
}

pub fn glyph(glyph: Glyph) -> String {
    match glyph {
        Glyph::Success => "✔".green().bold().to_string(),
        Glyph::Caution => "✔".yellow().bold().to_string(),
        Glyph::Failure => "✘".red().bold().to_string(),
    }
}

/// Text of one branch line, without the glyph.
pub fn branch_text(branch: &BranchReport) -> String {
    let name = &branch.branch;
    match &branch.status {
        BranchStatus::Done { outcome } => match outcome {
            MergeOutcome::AlreadyMerged {
                via: Detection::CommitMessage,
            } => format!("Already merged to `{name}` [commit message check]"),
            MergeOutcome::AlreadyMerged {
                via: Detection::EmptyDiff,
            } => format!("Already merged to `{name}`"),
            MergeOutcome::Conflict => format!("Conflict during cherry-picking to `{name}`"),
            MergeOutcome::Applied => format!("Successfully merged to `{name}`"),
            MergeOutcome::AppliedDryRun => format!("Can be merged to `{name}`"),
        },
        BranchStatus::Failed { reason, .. } => format!("Can't process `{name}`: {reason}"),
    }
}

/// Commands that finish a backport paused on a conflict.
pub fn remediation_lines(workspace: &str, branch: &str) -> Vec<String> {
    vec![
        "To resolve the conflict:".to_string(),
        format!("    cd {workspace}"),
        "    # fix the conflicting files, then `git add` them".to_string(),
        "    git cherry-pick --continue".to_string(),
        format!("    git push origin {branch}"),
        "Tip: use `cd -` to get back to the previous directory.".to_string(),
    ]
}

fn header_lines(report: &ReleaseReport, compact: bool) -> Vec<String> {
    let pr = &report.pull_request;
    if compact {
        return vec![format!(
            "{}/{}#{} {}",
            pr.org,
            pr.repo,
            pr.number,
            pr.title.as_str().bold()
        )];
    }
    vec![
        format!("{} #{}", pr.title.as_str().bold(), pr.number),
        format!("  {}", pr.html_url),
        format!("  state: {}", pr.state),
        format!(
            "  merge commit: {}",
            pr.merge_commit_sha.as_deref().unwrap_or("-")
        ),
    ]
}

/// Full report: header, branch lines, follow-up guidance.
pub fn report_lines(report: &ReleaseReport, opts: RenderOptions) -> Vec<String> {
    let mut lines = header_lines(report, opts.compact);

    if report.no_targets {
        lines.push(format!(
            "{} No merge destination applies to `{}`",
            glyph(Glyph::Caution),
            report.pull_request.repo
        ));
    }

    for branch in &report.branches {
        if opts.only_missing && !branch.needs_attention() {
            continue;
        }
        lines.push(format!("{} {}", glyph(branch.glyph()), branch_text(branch)));
    }

    if let Some(branch) = &report.paused_on {
        lines.extend(remediation_lines(&report.workspace, branch));
    }

    let dry_run_applied = report
        .branches
        .iter()
        .any(|b| b.outcome() == Some(MergeOutcome::AppliedDryRun));
    if report.dry_run && dry_run_applied {
        lines.push("Changes were not pushed because of --dry-run".to_string());
    }

    if let Some(fatal) = &report.fatal {
        lines.push(format!("{} Backport stopped: {fatal}", glyph(Glyph::Failure)));
    }

    if let Some(summary) = &report.notifications {
        if summary.posted > 0 {
            lines.push(format!("Commented on {} linked issue(s)", summary.posted));
        }
        if summary.failed > 0 {
            lines.push(format!(
                "{} {} linked issue comment(s) could not be posted",
                glyph(Glyph::Caution),
                summary.failed
            ));
        }
    }

    let pad = " ".repeat(opts.indent);
    lines.into_iter().map(|l| format!("{pad}{l}")).collect()
}
