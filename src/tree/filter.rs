use crate::registry::ObjectRegistry;
use crate::tree::node::{FilterFlags, NodeArena, NodeId};

/// Parsed search text: trimmed and split on whitespace. A row matches only
/// when every term is contained in its display string.
#[derive(Clone, Debug, Default)]
pub struct FilterTerms {
    terms: Vec<String>,
    case_sensitive: bool,
}

impl FilterTerms {
    pub fn parse(text: &str, case_sensitive: bool) -> Self {
        let terms = text
            .trim()
            .split_whitespace()
            .map(|t| if case_sensitive { t.to_string() } else { t.to_lowercase() })
            .collect();
        Self { terms, case_sensitive }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, display: &str) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let haystack = if self.case_sensitive { display.to_string() } else { display.to_lowercase() };
        self.terms.iter().all(|t| haystack.contains(t.as_str()))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefreshScope {
    NodeOnly,
    Recursive,
}

/// Whether the row's own text matches. Header rows (the actor row and the
/// separators) never match on their own; they stay visible through the
/// child-matches bit or an empty filter.
pub fn matches_filter(
    arena: &NodeArena,
    registry: &ObjectRegistry,
    node: NodeId,
    terms: &FilterTerms,
) -> bool {
    if terms.is_empty() {
        return true;
    }
    let is_header = arena
        .get(node)
        .map(|n| n.is_root_actor() || n.is_separator())
        .unwrap_or(true);
    if is_header {
        return false;
    }
    terms.matches(&arena.display_string(node, registry))
}

/// Writes a row's own match bit and recomputes its child-matches bit. When
/// `update_parent` is set and anything changed, the result is pushed up the
/// ancestor chain.
pub fn set_cached_filter_state(
    arena: &mut NodeArena,
    node: NodeId,
    matches: bool,
    update_parent: bool,
) {
    let Some(current) = arena.get(node).map(|n| n.filter_flags()) else { return };
    let mut changed = current.contains(FilterFlags::UNKNOWN)
        || current.contains(FilterFlags::MATCHES_FILTER) != matches;
    let mut flags = current & !(FilterFlags::UNKNOWN | FilterFlags::MATCHES_FILTER);
    if matches {
        flags |= FilterFlags::MATCHES_FILTER;
    }
    arena.set_filter_flags(node, flags);

    let before = flags.contains(FilterFlags::CHILD_MATCHES);
    arena.refresh_child_matches(node);
    let after = arena
        .get(node)
        .map(|n| n.filter_flags().contains(FilterFlags::CHILD_MATCHES))
        .unwrap_or(before);
    changed |= before != after;

    if update_parent && changed {
        arena.apply_filtered_state_to_parent(node);
    }
}

/// Re-evaluates the cached filter state for a row. With
/// [`RefreshScope::Recursive`] children are refreshed first so the row's
/// child-matches bit is derived from fresh data; the upward push then
/// happens once, from the subtree root only.
pub fn refresh_filtered_state(
    arena: &mut NodeArena,
    registry: &ObjectRegistry,
    node: NodeId,
    terms: &FilterTerms,
    scope: RefreshScope,
) {
    if scope == RefreshScope::Recursive {
        let children: Vec<NodeId> = arena.get(node).map(|n| n.children().to_vec()).unwrap_or_default();
        for child in children {
            refresh_subtree(arena, registry, child, terms);
        }
    }
    let matches = matches_filter(arena, registry, node, terms);
    set_cached_filter_state(arena, node, matches, scope == RefreshScope::NodeOnly);
}

fn refresh_subtree(arena: &mut NodeArena, registry: &ObjectRegistry, node: NodeId, terms: &FilterTerms) {
    let children: Vec<NodeId> = arena.get(node).map(|n| n.children().to_vec()).unwrap_or_default();
    for child in children {
        refresh_subtree(arena, registry, child, terms);
    }
    let matches = matches_filter(arena, registry, node, terms);
    set_cached_filter_state(arena, node, matches, false);
}
