//! History rendering and lineage reconstruction.
//!
//! Both entry points are pure projections of the commit graph: no
//! I/O, no hidden state, structurally identical output for identical
//! input.

use serde::Serialize;

use crate::error::{Result, SessionError};
use crate::graph::CommitGraph;
use crate::models::{Commit, CommitHash, CommitKind, MessageRole};

/// Display-ready row for one commit in the history panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedItem {
    /// Hash of the rendered commit.
    pub hash: CommitHash,
    /// Action label ("Create", "Edit", "Revert", "Imported from code").
    pub label: &'static str,
    /// User-supplied text, or the label when the text is empty.
    pub summary: String,
    /// `None` on the mainline; for a branch point, the 1-based
    /// position of the parent within the rendered order.
    pub parent_version: Option<usize>,
}

const fn kind_label(kind: CommitKind) -> &'static str {
    match kind {
        CommitKind::AiCreate => "Create",
        CommitKind::AiEdit => "Edit",
        CommitKind::CodeCreate => "Imported from code",
        CommitKind::Revert => "Revert",
    }
}

/// Turn a list of commits into display-ready rows, ordered by
/// `date_created` ascending. Input order breaks timestamp ties, so
/// callers pass commits in graph insertion order.
pub fn render_history(commits: &[&Commit]) -> Vec<RenderedItem> {
    let mut ordered: Vec<&Commit> = commits.to_vec();
    // Stable sort keeps insertion order for equal timestamps.
    ordered.sort_by_key(|c| c.date_created);

    ordered
        .iter()
        .enumerate()
        .map(|(position, commit)| {
            let label = kind_label(commit.kind);
            let summary = commit
                .inputs
                .as_ref()
                .map(|inputs| inputs.text.trim())
                .filter(|text| !text.is_empty())
                .map_or_else(|| label.to_string(), |text| text.to_string());

            let parent_version = commit.parent_hash.and_then(|parent| {
                let parent_position = ordered.iter().position(|c| c.hash == parent)?;
                if position > 0 && parent_position == position - 1 {
                    None
                } else {
                    Some(parent_position + 1)
                }
            });

            RenderedItem {
                hash: commit.hash,
                label,
                summary,
                parent_version,
            }
        })
        .collect()
}

/// One turn of the lineage behind a commit. Generated code is an
/// assistant turn, prompt text a user turn; the role travels with the
/// turn because revert and import commits contribute code only, so the
/// sequence does not strictly alternate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageTurn {
    /// Wire role this turn maps to on resubmission.
    pub role: MessageRole,
    /// Prompt text or generated code.
    pub text: String,
}

impl LineageTurn {
    fn prompt(text: String) -> Self {
        Self {
            role: MessageRole::User,
            text,
        }
    }

    fn code(text: String) -> Self {
        Self {
            role: MessageRole::Assistant,
            text,
        }
    }
}

/// Reconstruct the root-first code/prompt sequence behind a leaf
/// commit, for resubmission to the generation backend.
///
/// Walks parent pointers from `leaf` to the root, collecting each
/// commit's selected code and, for edit commits, the prompt text that
/// produced it.
///
/// # Errors
///
/// `CommitNotFound` if `leaf` itself is unknown; `MalformedHistory` if
/// the walk hits a dangling parent pointer. The latter signals
/// corrupted state and is never silently truncated.
pub fn extract_lineage(graph: &CommitGraph, leaf: CommitHash) -> Result<Vec<LineageTurn>> {
    let mut collected = Vec::new();
    let mut commit = graph.require(leaf)?;

    loop {
        // Reverse order here; the final list is reversed once at the end.
        if commit.kind == CommitKind::AiEdit && commit.parent_hash.is_some() {
            if let Some(inputs) = &commit.inputs {
                collected.push(LineageTurn::prompt(inputs.text.clone()));
            }
        }
        collected.push(LineageTurn::code(
            commit
                .selected_variant()
                .map(|v| v.code.clone())
                .unwrap_or_default(),
        ));

        match commit.parent_hash {
            None => break,
            Some(parent) => {
                commit = graph.get(parent).ok_or(SessionError::MalformedHistory {
                    child: commit.hash,
                    parent,
                })?;
            }
        }
    }

    collected.reverse();
    Ok(collected)
}
