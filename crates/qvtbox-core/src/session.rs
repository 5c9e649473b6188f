//! Sequenced search sessions.
//!
//! Filter edits can outpace the searches they trigger: a slow search fired
//! for an old filter state must never overwrite the results of a newer one.
//! [`SearchSession`] fixes the race by stamping every mutation with a
//! monotonically increasing sequence number and discarding completions for
//! anything but the latest sequence. The session is executor-agnostic; the
//! embedder decides how searches run and simply routes each completion back
//! through [`SearchSession::complete`].

use crate::filters::{FilterPatch, FilterState, SearchFilters};

/// One search to run: the sequence stamp and the full filter snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub seq: u64,
    pub filters: SearchFilters,
}

/// Filter state plus sequencing. Exactly one [`SearchRequest`] is issued
/// per mutation.
#[derive(Debug, Default)]
pub struct SearchSession {
    state: FilterState,
    seq: u64,
}

impl SearchSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filters(filters: SearchFilters) -> Self {
        Self {
            state: FilterState::with_filters(filters),
            seq: 0,
        }
    }

    /// Merges a patch and issues the search request for the new state.
    pub fn apply(&mut self, patch: FilterPatch) -> SearchRequest {
        let filters = self.state.apply(patch);
        self.issue(filters)
    }

    /// Clears every criterion and issues the (empty) search request.
    pub fn clear(&mut self) -> SearchRequest {
        let filters = self.state.clear();
        self.issue(filters)
    }

    /// Drops one tag and issues the search request for the new state.
    pub fn remove_tag(&mut self, tag: &str) -> SearchRequest {
        let filters = self.state.remove_tag(tag);
        self.issue(filters)
    }

    #[must_use]
    pub fn filters(&self) -> &SearchFilters {
        self.state.current()
    }

    /// Sequence of the most recently issued request; `0` before the first.
    #[must_use]
    pub fn latest_seq(&self) -> u64 {
        self.seq
    }

    /// Whether `seq` identifies the most recently issued request.
    #[must_use]
    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.seq
    }

    /// Accepts a completed search only if it belongs to the latest request.
    ///
    /// Returns `Some(outcome)` for the current sequence and `None` for any
    /// stale one; the caller drops stale outcomes instead of rendering
    /// them. `seq` must come from a previously issued [`SearchRequest`].
    pub fn complete<T>(&self, seq: u64, outcome: T) -> Option<T> {
        self.is_current(seq).then_some(outcome)
    }

    fn issue(&mut self, filters: SearchFilters) -> SearchRequest {
        self.seq += 1;
        SearchRequest {
            seq: self.seq,
            filters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Patch;

    fn query_patch(q: &str) -> FilterPatch {
        FilterPatch {
            query: Patch::Set(q.to_string()),
            ..FilterPatch::default()
        }
    }

    #[test]
    fn each_mutation_issues_one_request_with_increasing_seq() {
        let mut session = SearchSession::new();
        let first = session.apply(query_patch("the"));
        let second = session.apply(query_patch("the vert"));
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(second.filters.query.as_deref(), Some("the vert"));
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut session = SearchSession::new();
        let slow = session.apply(query_patch("the"));
        let fast = session.apply(query_patch("the vert"));

        // The newer search lands first and is accepted.
        assert_eq!(
            session.complete(fast.seq, vec!["Coffret thé vert"]),
            Some(vec!["Coffret thé vert"])
        );
        // The older search lands late and is dropped.
        assert_eq!(session.complete(slow.seq, vec!["stale"]), None);
    }

    #[test]
    fn completion_for_the_latest_request_is_accepted_once_issued() {
        let mut session = SearchSession::new();
        let request = session.apply(query_patch("massage"));
        assert!(session.is_current(request.seq));
        assert_eq!(session.complete(request.seq, 42), Some(42));
        // Accepting the same sequence again is still fine; it is only
        // superseded by a newer mutation.
        assert_eq!(session.complete(request.seq, 43), Some(43));
    }

    #[test]
    fn clear_issues_a_request_for_the_empty_state() {
        let mut session = SearchSession::new();
        session.apply(query_patch("the"));
        let cleared = session.clear();
        assert!(cleared.filters.is_empty());
        assert_eq!(cleared.seq, 2);
        assert!(!session.is_current(1));
    }

    #[test]
    fn remove_tag_issues_a_request_with_remaining_tags() {
        let mut session = SearchSession::new();
        session.apply(FilterPatch {
            tags: Patch::Set(vec!["bio".to_string(), "local".to_string()]),
            ..FilterPatch::default()
        });
        let request = session.remove_tag("bio");
        assert_eq!(request.filters.tags, vec!["local"]);
        assert_eq!(request.seq, 2);
    }
}
