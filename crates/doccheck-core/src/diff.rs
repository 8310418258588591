use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag, capture_diff_slices};

use crate::markers::{
    DELETE, DELETE_END, DiffCommand, INSERT, INSERT_END, INSERT_NEW_KEEP_AFTER,
    INSERT_NEW_KEEP_BEFORE, INSERT_OLD_KEEP_AFTER, INSERT_OLD_KEEP_BEFORE, KEEP, KEEP_END,
    REPLACE, REPLACE_END, REPLACE_NEW, REPLACE_NEW_DELETE_KEEP_AFTER,
    REPLACE_NEW_DELETE_KEEP_BEFORE, REPLACE_NEW_KEEP_AFTER, REPLACE_NEW_KEEP_BEFORE, REPLACE_OLD,
    REPLACE_OLD_DELETE_KEEP_AFTER, REPLACE_OLD_DELETE_KEEP_BEFORE, REPLACE_OLD_KEEP_AFTER,
    REPLACE_OLD_KEEP_BEFORE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditType {
    Keep,
    Insert,
    Delete,
    Replace,
}

impl EditType {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Keep => KEEP,
            Self::Insert => INSERT,
            Self::Delete => DELETE,
            Self::Replace => REPLACE,
        }
    }

    pub fn end_marker(self) -> &'static str {
        match self {
            Self::Keep => KEEP_END,
            Self::Insert => INSERT_END,
            Self::Delete => DELETE_END,
            Self::Replace => REPLACE_END,
        }
    }
}

pub type NodeId = usize;

/// One coarse diff region. Adjacency points into the owning [`EditGraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditNode {
    pub edit_type: EditType,
    /// Content tokens. A `Replace` node stores `old.., <REPLACE_NEW>, new..`.
    pub children: VecDeque<String>,
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,
}

impl EditNode {
    fn new(edit_type: EditType, children: impl IntoIterator<Item = String>) -> Self {
        Self {
            edit_type,
            children: children.into_iter().collect(),
            prev: None,
            next: None,
        }
    }

    /// Splits a node into the tokens it removes and the tokens it adds.
    fn sides(&self) -> (Vec<String>, Vec<String>) {
        match self.edit_type {
            EditType::Keep => (Vec::new(), Vec::new()),
            EditType::Insert => (Vec::new(), self.children.iter().cloned().collect()),
            EditType::Delete => (self.children.iter().cloned().collect(), Vec::new()),
            EditType::Replace => {
                let split = self
                    .children
                    .iter()
                    .position(|token| token == REPLACE_NEW)
                    .unwrap_or(self.children.len());
                let old = self.children.iter().take(split).cloned().collect();
                let new = self.children.iter().skip(split + 1).cloned().collect();
                (old, new)
            }
        }
    }
}

/// Arena of edit regions linked by index.
///
/// Localization replaces nodes by pushing merged nodes and re-pointing the
/// neighbours' adjacency at them; the original nodes stay in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditGraph {
    nodes: Vec<EditNode>,
    coarse_len: usize,
}

impl EditGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes produced by the diff itself, before any merging.
    pub fn coarse_len(&self) -> usize {
        self.coarse_len
    }

    pub fn node(&self, id: NodeId) -> &EditNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[EditNode] {
        &self.nodes
    }

    fn push(&mut self, node: EditNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn keep_neighbour(&self, neighbour: Option<NodeId>) -> Option<NodeId> {
        neighbour.filter(|id| self.nodes[*id].edit_type == EditType::Keep)
    }

    /// Puts `replacement` where `original` was in the prev/next chain.
    fn splice(&mut self, original: NodeId, edit_type: EditType, children: Vec<String>) -> NodeId {
        let prev = self.nodes[original].prev;
        let next = self.nodes[original].next;
        let replacement = self.push(EditNode {
            edit_type,
            children: children.into(),
            prev,
            next,
        });
        if let Some(prev) = prev {
            self.nodes[prev].next = Some(replacement);
        }
        if let Some(next) = next {
            self.nodes[next].prev = Some(replacement);
        }
        replacement
    }
}

/// Builds the coarse region sequence of a diff between `old_tokens` and `new_tokens`.
pub fn coarse_diff_structure<S: AsRef<str>>(old_tokens: &[S], new_tokens: &[S]) -> EditGraph {
    let old = owned(old_tokens);
    let new = owned(new_tokens);

    let mut graph = EditGraph::default();
    for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        let node = match tag {
            DiffTag::Equal => EditNode::new(EditType::Keep, old[old_range].iter().cloned()),
            DiffTag::Replace => EditNode::new(
                EditType::Replace,
                old[old_range]
                    .iter()
                    .cloned()
                    .chain(std::iter::once(REPLACE_NEW.to_owned()))
                    .chain(new[new_range].iter().cloned()),
            ),
            DiffTag::Insert => EditNode::new(EditType::Insert, new[new_range].iter().cloned()),
            DiffTag::Delete => EditNode::new(EditType::Delete, old[old_range].iter().cloned()),
        };
        graph.push(node);
    }
    graph.coarse_len = graph.nodes.len();

    if graph.nodes.len() > 1 {
        let last = graph.nodes.len() - 1;
        for index in 0..=last {
            if index != last {
                graph.nodes[index].next = Some(index + 1);
            }
            if index != 0 {
                graph.nodes[index].prev = Some(index - 1);
            }
        }
    }

    graph
}

/// Start positions at which `search` aligns token for token with `full`.
pub fn valid_positions<S: AsRef<str>, T: AsRef<str>>(search: &[S], full: &[T]) -> Vec<usize> {
    let Some(first) = search.first() else {
        return Vec::new();
    };

    full.iter()
        .enumerate()
        .filter(|(_, token)| token.as_ref() == first.as_ref())
        .map(|(position, _)| position)
        .filter(|position| {
            search.iter().enumerate().all(|(offset, expected)| {
                full.get(position + offset)
                    .is_some_and(|token| token.as_ref() == expected.as_ref())
            })
        })
        .collect()
}

/// [`valid_positions`] over space separated token strings.
pub fn valid_positions_in_text(search: &str, full: &str) -> Vec<usize> {
    let search = search.split(' ').collect::<Vec<_>>();
    let full = full.split(' ').collect::<Vec<_>>();
    valid_positions(&search, &full)
}

pub fn frequency<S: AsRef<str>, T: AsRef<str>>(search: &[S], full: &[T]) -> usize {
    valid_positions(search, full).len()
}

pub fn full_replace_span<S: AsRef<str>>(old_tokens: &[S], new_tokens: &[S]) -> Vec<String> {
    let mut span = Vec::with_capacity(old_tokens.len() + new_tokens.len() + 3);
    span.push(REPLACE_OLD.to_owned());
    span.extend(old_tokens.iter().map(|token| token.as_ref().to_owned()));
    span.push(REPLACE_NEW.to_owned());
    span.extend(new_tokens.iter().map(|token| token.as_ref().to_owned()));
    span.push(REPLACE_END.to_owned());
    span
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Before,
    After,
}

/// Marker pair announcing a region widened with kept tokens.
fn adoption_markers(edit_type: EditType, direction: Direction) -> (&'static str, &'static str) {
    match (edit_type, direction) {
        (EditType::Insert, Direction::Before) => (INSERT_OLD_KEEP_BEFORE, INSERT_NEW_KEEP_BEFORE),
        (EditType::Insert, Direction::After) => (INSERT_OLD_KEEP_AFTER, INSERT_NEW_KEEP_AFTER),
        (EditType::Delete, Direction::Before) => {
            (REPLACE_OLD_DELETE_KEEP_BEFORE, REPLACE_NEW_DELETE_KEEP_BEFORE)
        }
        (EditType::Delete, Direction::After) => {
            (REPLACE_OLD_DELETE_KEEP_AFTER, REPLACE_NEW_DELETE_KEEP_AFTER)
        }
        (_, Direction::Before) => (REPLACE_OLD_KEEP_BEFORE, REPLACE_NEW_KEEP_BEFORE),
        (_, Direction::After) => (REPLACE_OLD_KEEP_AFTER, REPLACE_NEW_KEEP_AFTER),
    }
}

/// Pulls kept tokens from one neighbour until `old_side` plus the pulled
/// context occurs exactly once in `old_tokens`. On failure the neighbour
/// gets its tokens back.
fn adopt(
    graph: &mut EditGraph,
    keep_id: NodeId,
    direction: Direction,
    old_side: &[String],
    old_tokens: &[String],
) -> Option<Vec<String>> {
    let mut adopted: VecDeque<String> = VecDeque::new();
    loop {
        let pulled = match direction {
            Direction::Before => graph.nodes[keep_id].children.pop_back(),
            Direction::After => graph.nodes[keep_id].children.pop_front(),
        };
        let Some(token) = pulled else {
            break;
        };

        let search = match direction {
            Direction::Before => {
                adopted.push_front(token);
                adopted.iter().chain(old_side.iter()).cloned().collect::<Vec<_>>()
            }
            Direction::After => {
                adopted.push_back(token);
                old_side.iter().chain(adopted.iter()).cloned().collect::<Vec<_>>()
            }
        };
        if frequency(&search, old_tokens) == 1 {
            return Some(adopted.into_iter().collect());
        }
    }

    let children = &mut graph.nodes[keep_id].children;
    match direction {
        Direction::Before => children.extend(adopted),
        Direction::After => {
            for token in adopted.into_iter().rev() {
                children.push_front(token);
            }
        }
    }
    None
}

fn merged_children(
    edit_type: EditType,
    direction: Direction,
    adopted: &[String],
    old_side: &[String],
    new_side: &[String],
) -> Vec<String> {
    let (old_marker, new_marker) = adoption_markers(edit_type, direction);
    let mut children = Vec::with_capacity(2 * adopted.len() + old_side.len() + new_side.len() + 2);
    children.push(old_marker.to_owned());
    match direction {
        Direction::Before => {
            children.extend_from_slice(adopted);
            children.extend_from_slice(old_side);
            children.push(new_marker.to_owned());
            children.extend_from_slice(adopted);
            children.extend_from_slice(new_side);
        }
        Direction::After => {
            children.extend_from_slice(old_side);
            children.extend_from_slice(adopted);
            children.push(new_marker.to_owned());
            children.extend_from_slice(new_side);
            children.extend_from_slice(adopted);
        }
    }
    children
}

/// Smallest locally unambiguous description of a comment change.
///
/// Each changed region is emitted as is when its old tokens occur exactly
/// once in the old comment; otherwise it adopts kept tokens from the region
/// before it, then from the region after it. If neither neighbour makes it
/// unique the whole change collapses into one full replace span and no
/// further regions are examined. Identical inputs produce an empty result.
pub fn compute_minimal_comment_diffs<S: AsRef<str>>(
    old_tokens: &[S],
    new_tokens: &[S],
) -> Vec<String> {
    let old = owned(old_tokens);
    let mut graph = coarse_diff_structure(old_tokens, new_tokens);
    let mut emitted: Vec<NodeId> = Vec::new();

    for id in 0..graph.coarse_len() {
        let edit_type = graph.nodes[id].edit_type;
        if edit_type == EditType::Keep {
            continue;
        }

        let (old_side, new_side) = graph.nodes[id].sides();

        if edit_type != EditType::Insert && frequency(&old_side, &old) == 1 {
            let prefix = match edit_type {
                EditType::Delete => DELETE,
                _ => REPLACE_OLD,
            };
            graph.nodes[id].children.push_front(prefix.to_owned());
            emitted.push(id);
            continue;
        }

        let merged_type = match edit_type {
            EditType::Insert => EditType::Insert,
            _ => EditType::Replace,
        };

        let mut localized = None;
        for direction in [Direction::Before, Direction::After] {
            let neighbour = match direction {
                Direction::Before => graph.nodes[id].prev,
                Direction::After => graph.nodes[id].next,
            };
            let Some(keep_id) = graph.keep_neighbour(neighbour) else {
                continue;
            };
            if let Some(adopted) = adopt(&mut graph, keep_id, direction, &old_side, &old) {
                let children = merged_children(edit_type, direction, &adopted, &old_side, &new_side);
                localized = Some(graph.splice(id, merged_type, children));
                break;
            }
        }

        match localized {
            Some(merged) => emitted.push(merged),
            None => {
                tracing::debug!(
                    region = id,
                    edit_type = edit_type.marker(),
                    "comment change is not locally unique, using full replace span"
                );
                return full_replace_span(old_tokens, new_tokens);
            }
        }
    }

    let mut spans = Vec::new();
    for id in emitted {
        let node = graph.node(id);
        spans.extend(node.children.iter().cloned());
        spans.push(node.edit_type.end_marker().to_owned());
    }
    spans
}

/// A content token of the flat code diff and the command that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCommand {
    pub command: DiffCommand,
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDiff {
    /// Every region wrapped in its start and end markers.
    pub spans: Vec<String>,
    pub token_commands: Vec<TokenCommand>,
}

impl CodeDiff {
    /// Number of tokens that were not kept unchanged.
    pub fn changed_code_len(&self) -> usize {
        self.token_commands
            .iter()
            .filter(|pair| pair.command != DiffCommand::Keep)
            .count()
    }

    pub fn tokens_with(&self, command: DiffCommand) -> impl Iterator<Item = &str> {
        self.token_commands
            .iter()
            .filter(move |pair| pair.command == command)
            .map(|pair| pair.token.as_str())
    }

    /// Tokens removed from the old code, in diff order.
    pub fn removed_tokens(&self) -> Vec<String> {
        self.token_commands
            .iter()
            .filter(|pair| pair.command.is_removal())
            .map(|pair| pair.token.clone())
            .collect()
    }

    /// Tokens added to the new code, in diff order.
    pub fn added_tokens(&self) -> Vec<String> {
        self.token_commands
            .iter()
            .filter(|pair| pair.command.is_addition())
            .map(|pair| pair.token.clone())
            .collect()
    }

    /// `command, token, command, token, ..` as consumed by dataset tooling.
    pub fn interleaved(&self) -> Vec<String> {
        let mut stream = Vec::with_capacity(self.token_commands.len() * 2);
        for pair in &self.token_commands {
            stream.push(pair.command.marker().to_owned());
            stream.push(pair.token.clone());
        }
        stream
    }
}

/// Flat span diff: every region wrapped in its markers, every content token
/// paired with the command that produced it.
pub fn compute_code_diffs<S: AsRef<str>>(old_tokens: &[S], new_tokens: &[S]) -> CodeDiff {
    let old = owned(old_tokens);
    let new = owned(new_tokens);
    let mut diff = CodeDiff::default();

    for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                push_region(&mut diff, KEEP, &[(DiffCommand::Keep, &old[old_range])], KEEP_END);
            }
            DiffTag::Replace => {
                diff.spans.push(REPLACE_OLD.to_owned());
                diff.spans.extend(old[old_range.clone()].iter().cloned());
                push_commands(&mut diff, DiffCommand::ReplaceOld, &old[old_range]);
                diff.spans.push(REPLACE_NEW.to_owned());
                diff.spans.extend(new[new_range.clone()].iter().cloned());
                push_commands(&mut diff, DiffCommand::ReplaceNew, &new[new_range]);
                diff.spans.push(REPLACE_END.to_owned());
            }
            DiffTag::Insert => {
                push_region(
                    &mut diff,
                    INSERT,
                    &[(DiffCommand::Insert, &new[new_range])],
                    INSERT_END,
                );
            }
            DiffTag::Delete => {
                push_region(
                    &mut diff,
                    DELETE,
                    &[(DiffCommand::Delete, &old[old_range])],
                    DELETE_END,
                );
            }
        }
    }

    diff
}

fn push_region(
    diff: &mut CodeDiff,
    start: &str,
    parts: &[(DiffCommand, &[String])],
    end: &str,
) {
    diff.spans.push(start.to_owned());
    for (command, tokens) in parts {
        diff.spans.extend(tokens.iter().cloned());
        push_commands(diff, *command, tokens);
    }
    diff.spans.push(end.to_owned());
}

fn push_commands(diff: &mut CodeDiff, command: DiffCommand, tokens: &[String]) {
    diff.token_commands
        .extend(tokens.iter().map(|token| TokenCommand {
            command,
            token: token.clone(),
        }));
}

fn owned<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    tokens.iter().map(|token| token.as_ref().to_owned()).collect()
}
