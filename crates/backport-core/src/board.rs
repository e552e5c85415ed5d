//! Project-board discovery: column cards to issues to linked pull requests.

use tracing::debug;

use crate::error::{BackportError, BackportResult};
use crate::hosting::{CodeHost, ProjectCard};
use crate::references::{ProjectRef, Reference, ReferenceKind};

/// A card on a board column, resolved to the issue or pull request it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardItem {
    Issue(Reference),
    Pull(Reference),
    /// Note cards, or content the parser does not recognise.
    Other { card_id: u64, content_url: Option<String> },
}

impl BoardItem {
    fn from_card(card: &ProjectCard) -> Self {
        let parsed = card
            .content_url
            .as_deref()
            .and_then(|url| Reference::parse_url(url).ok());
        match parsed {
            Some(r) if r.kind == ReferenceKind::Issue => BoardItem::Issue(r),
            Some(r) => BoardItem::Pull(r),
            None => BoardItem::Other {
                card_id: card.id,
                content_url: card.content_url.clone(),
            },
        }
    }
}

/// Cards of the column named `column_name` on `project`, in board order.
pub async fn column_items(
    host: &dyn CodeHost,
    project: &ProjectRef,
    column_name: &str,
) -> BackportResult<Vec<BoardItem>> {
    let projects = host.org_projects(&project.org).await?;
    let project_id = projects
        .iter()
        .find(|p| p.number == project.number)
        .map(|p| p.id)
        .ok_or_else(|| {
            BackportError::Config(format!(
                "project {} not found in organisation `{}`",
                project.number, project.org
            ))
        })?;

    let columns = host.project_columns(project_id).await?;
    let column_id = columns
        .iter()
        .find(|c| c.name == column_name)
        .map(|c| c.id)
        .ok_or_else(|| {
            BackportError::Config(format!("can't find column `{column_name}` in project"))
        })?;

    let cards = host.column_cards(column_id).await?;
    debug!(project_id, column_id, cards = cards.len(), "loaded board column");
    Ok(cards.iter().map(BoardItem::from_card).collect())
}

/// Pull requests that cross-reference `issue`, in timeline order.
pub async fn find_linked_pull_requests(
    host: &dyn CodeHost,
    issue: &Reference,
) -> BackportResult<Vec<Reference>> {
    let timeline = host.issue_timeline(issue).await?;
    Ok(timeline
        .iter()
        .filter_map(|event| event.cross_reference_url())
        .filter(|url| url.contains("/pull/"))
        .filter_map(|url| Reference::parse_url(url).ok())
        .collect())
}
