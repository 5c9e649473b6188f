//! Search filter state: the value object sent to the catalog query layer
//! and the merge semantics for editing it.
//!
//! [`SearchFilters`] is always passed around whole. Edits happen through
//! [`FilterPatch`], where every field is a [`Patch`]: an absent field leaves
//! the current value untouched, an explicit `null` clears exactly that
//! criterion, and a value replaces it. [`FilterState`] owns the current
//! filters and hands back a full snapshot after every mutation, never a
//! diff.

use serde::{Deserialize, Serialize};

/// Sort order for catalog searches. [`SortKey::Newest`] is what an unset
/// sort falls back to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    PriceAsc,
    PriceDesc,
    Rating,
    #[default]
    Newest,
}

/// Inclusive price bounds in cents. Min and max form one logical filter:
/// they are set and cleared together, even when only one side is bounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min_cents: Option<i64>,
    pub max_cents: Option<i64>,
}

impl PriceRange {
    /// `true` when neither side is bounded; an unbounded range is treated
    /// as no price filter at all.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.min_cents.is_none() && self.max_cents.is_none()
    }
}

/// The complete set of search criteria. All fields optional; tags are OR-ed
/// against product tags while every other criterion is AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub query: Option<String>,
    pub category: Option<String>,
    pub price: Option<PriceRange>,
    pub min_rating: Option<f32>,
    pub origin: Option<String>,
    pub sort: Option<SortKey>,
    pub tags: Vec<String>,
}

impl SearchFilters {
    /// `true` when no criterion is set. The sort order alone does not count:
    /// sorting an empty search still means "show nothing".
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.query.as_deref().is_none_or(|q| q.trim().is_empty())
            && self.category.is_none()
            && self.price.is_none_or(|p| p.is_unbounded())
            && self.min_rating.is_none()
            && self.origin.is_none()
            && self.tags.is_empty()
    }

    /// Number of active criteria, counting the price range as one filter
    /// and the whole tag list as one.
    #[must_use]
    pub fn active_count(&self) -> usize {
        usize::from(self.query.as_deref().is_some_and(|q| !q.trim().is_empty()))
            + usize::from(self.category.is_some())
            + usize::from(self.price.is_some_and(|p| !p.is_unbounded()))
            + usize::from(self.min_rating.is_some())
            + usize::from(self.origin.is_some())
            + usize::from(!self.tags.is_empty())
    }

    /// The sort to actually apply: an unset sort means newest first.
    #[must_use]
    pub fn effective_sort(&self) -> SortKey {
        self.sort.unwrap_or_default()
    }

    /// Normalizes raw input (e.g. a deserialized request body): text
    /// criteria are trimmed and blank ones unset, tags are tidied, and an
    /// unbounded price range collapses to no range.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        normalize_text(&mut self.query);
        normalize_text(&mut self.category);
        normalize_text(&mut self.origin);
        if self.price.is_some_and(|p| p.is_unbounded()) {
            self.price = None;
        }
        self.tags = normalize_tags(std::mem::take(&mut self.tags));
        self
    }
}

/// One field of a [`FilterPatch`]: leave alone, clear, or replace.
///
/// On the wire an absent key deserializes to `Keep` (via `#[serde(default)]`
/// on the patch struct), an explicit `null` to `Clear`, and a value to
/// `Set`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    /// `Set` when a value is present, `Keep` otherwise. Handy for building
    /// patches from optional CLI flags, where an absent flag means
    /// "don't touch".
    #[must_use]
    pub fn set_or_keep(value: Option<T>) -> Self {
        value.map_or(Patch::Keep, Patch::Set)
    }

    fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Clear => *slot = None,
            Patch::Set(value) => *slot = Some(value),
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

/// A partial edit of [`SearchFilters`]. Every omitted field is untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterPatch {
    pub query: Patch<String>,
    pub category: Patch<String>,
    pub price: Patch<PriceRange>,
    pub min_rating: Patch<f32>,
    pub origin: Patch<String>,
    pub sort: Patch<SortKey>,
    pub tags: Patch<Vec<String>>,
}

/// Owns the current [`SearchFilters`] and applies edits to it.
///
/// Every mutation returns the complete updated snapshot so consumers always
/// act on the whole filter object.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    current: SearchFilters,
}

impl FilterState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filters(filters: SearchFilters) -> Self {
        Self {
            current: filters.normalized(),
        }
    }

    #[must_use]
    pub fn current(&self) -> &SearchFilters {
        &self.current
    }

    /// Merges a patch into the current filters and returns the snapshot.
    pub fn apply(&mut self, patch: FilterPatch) -> SearchFilters {
        patch.query.apply_to(&mut self.current.query);
        patch.category.apply_to(&mut self.current.category);
        patch.price.apply_to(&mut self.current.price);
        patch.min_rating.apply_to(&mut self.current.min_rating);
        patch.origin.apply_to(&mut self.current.origin);
        patch.sort.apply_to(&mut self.current.sort);
        match patch.tags {
            Patch::Keep => {}
            Patch::Clear => self.current.tags.clear(),
            Patch::Set(tags) => self.current.tags = tags,
        }
        self.current = std::mem::take(&mut self.current).normalized();
        self.snapshot()
    }

    /// Resets every criterion (and the sort) in one step.
    pub fn clear(&mut self) -> SearchFilters {
        self.current = SearchFilters::default();
        self.snapshot()
    }

    /// Removes a single tag, keeping the rest. Matching ignores ASCII case;
    /// an unknown tag is a no-op. Returns the snapshot either way.
    pub fn remove_tag(&mut self, tag: &str) -> SearchFilters {
        self.current.tags.retain(|t| !t.eq_ignore_ascii_case(tag));
        self.snapshot()
    }

    fn snapshot(&self) -> SearchFilters {
        self.current.clone()
    }
}

/// OR-matching of wanted tags against a product's tags, case-insensitive
/// substring: the product matches when any wanted tag occurs inside any of
/// its tags. An empty wanted list matches everything; blank wanted entries
/// are ignored.
#[must_use]
pub fn tags_match(product_tags: &[String], wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    wanted.iter().any(|w| {
        let needle = w.trim().to_lowercase();
        !needle.is_empty()
            && product_tags
                .iter()
                .any(|t| t.to_lowercase().contains(&needle))
    })
}

// ---------------------------------------------------------------------------
// Normalization helpers
// ---------------------------------------------------------------------------

fn normalize_text(slot: &mut Option<String>) {
    if let Some(value) = slot.take() {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            *slot = Some(trimmed.to_string());
        }
    }
}

/// Trims tags, drops blanks, and deduplicates ignoring ASCII case while
/// preserving first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        let folded = trimmed.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        out.push(trimmed.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set<T>(value: T) -> Patch<T> {
        Patch::Set(value)
    }

    #[test]
    fn default_filters_are_empty() {
        let filters = SearchFilters::default();
        assert!(filters.is_empty());
        assert_eq!(filters.active_count(), 0);
        assert_eq!(filters.effective_sort(), SortKey::Newest);
    }

    #[test]
    fn sort_alone_does_not_make_filters_active() {
        let mut state = FilterState::new();
        let snapshot = state.apply(FilterPatch {
            sort: set(SortKey::PriceAsc),
            ..FilterPatch::default()
        });
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.effective_sort(), SortKey::PriceAsc);
    }

    #[test]
    fn apply_keeps_untouched_fields() {
        let mut state = FilterState::new();
        state.apply(FilterPatch {
            query: set("thé".to_string()),
            category: set("detente".to_string()),
            ..FilterPatch::default()
        });
        let snapshot = state.apply(FilterPatch {
            query: set("infusion".to_string()),
            ..FilterPatch::default()
        });
        assert_eq!(snapshot.query.as_deref(), Some("infusion"));
        assert_eq!(snapshot.category.as_deref(), Some("detente"));
    }

    #[test]
    fn apply_returns_the_full_snapshot() {
        let mut state = FilterState::new();
        let snapshot = state.apply(FilterPatch {
            origin: set("France".to_string()),
            ..FilterPatch::default()
        });
        assert_eq!(&snapshot, state.current());
    }

    #[test]
    fn explicit_clear_removes_only_that_field() {
        let mut state = FilterState::new();
        state.apply(FilterPatch {
            query: set("tisane".to_string()),
            min_rating: set(4.0),
            ..FilterPatch::default()
        });
        let snapshot = state.apply(FilterPatch {
            min_rating: Patch::Clear,
            ..FilterPatch::default()
        });
        assert_eq!(snapshot.query.as_deref(), Some("tisane"));
        assert!(snapshot.min_rating.is_none());
    }

    #[test]
    fn patch_json_missing_key_keeps_null_clears() {
        let mut state = FilterState::new();
        state.apply(FilterPatch {
            query: set("massage".to_string()),
            origin: set("France".to_string()),
            ..FilterPatch::default()
        });

        // "origin": null clears it; the absent "query" key is untouched.
        let patch: FilterPatch =
            serde_json::from_str(r#"{"origin": null, "min_rating": 3.5}"#).expect("patch json");
        let snapshot = state.apply(patch);

        assert_eq!(snapshot.query.as_deref(), Some("massage"));
        assert!(snapshot.origin.is_none());
        assert_eq!(snapshot.min_rating, Some(3.5));
    }

    #[test]
    fn price_range_sets_and_clears_as_one_filter() {
        let mut state = FilterState::new();
        let snapshot = state.apply(FilterPatch {
            price: set(PriceRange {
                min_cents: Some(20_00),
                max_cents: Some(50_00),
            }),
            ..FilterPatch::default()
        });
        assert_eq!(snapshot.active_count(), 1);

        let snapshot = state.apply(FilterPatch {
            price: Patch::Clear,
            ..FilterPatch::default()
        });
        assert!(snapshot.price.is_none());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn unbounded_price_range_collapses_to_no_filter() {
        let mut state = FilterState::new();
        let snapshot = state.apply(FilterPatch {
            price: set(PriceRange::default()),
            ..FilterPatch::default()
        });
        assert!(snapshot.price.is_none());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn half_bounded_price_range_is_active() {
        let filters = SearchFilters {
            price: Some(PriceRange {
                min_cents: Some(10_00),
                max_cents: None,
            }),
            ..SearchFilters::default()
        };
        assert!(!filters.is_empty());
        assert_eq!(filters.active_count(), 1);
    }

    #[test]
    fn blank_text_normalizes_to_unset() {
        let mut state = FilterState::new();
        let snapshot = state.apply(FilterPatch {
            query: set("   ".to_string()),
            origin: set(" France ".to_string()),
            ..FilterPatch::default()
        });
        assert!(snapshot.query.is_none());
        assert_eq!(snapshot.origin.as_deref(), Some("France"));
    }

    #[test]
    fn tags_replace_deduplicate_and_count_as_one_filter() {
        let mut state = FilterState::new();
        let snapshot = state.apply(FilterPatch {
            tags: set(vec![
                "bio".to_string(),
                " BIO ".to_string(),
                "local".to_string(),
                String::new(),
            ]),
            ..FilterPatch::default()
        });
        assert_eq!(snapshot.tags, vec!["bio", "local"]);
        assert_eq!(snapshot.active_count(), 1);
    }

    #[test]
    fn remove_tag_keeps_the_rest() {
        let mut state = FilterState::new();
        state.apply(FilterPatch {
            tags: set(vec!["bio".to_string(), "local".to_string()]),
            ..FilterPatch::default()
        });
        let snapshot = state.remove_tag("BIO");
        assert_eq!(snapshot.tags, vec!["local"]);

        // Unknown tag: no-op.
        let snapshot = state.remove_tag("vegan");
        assert_eq!(snapshot.tags, vec!["local"]);
    }

    #[test]
    fn clear_resets_everything_in_one_step() {
        let mut state = FilterState::new();
        state.apply(FilterPatch {
            query: set("the".to_string()),
            category: set("detente".to_string()),
            price: set(PriceRange {
                min_cents: Some(10_00),
                max_cents: None,
            }),
            min_rating: set(4.0),
            origin: set("France".to_string()),
            sort: set(SortKey::Rating),
            tags: set(vec!["bio".to_string()]),
        });
        let snapshot = state.clear();
        assert!(snapshot.is_empty());
        assert!(snapshot.sort.is_none());
        assert_eq!(state.current(), &SearchFilters::default());
    }

    #[test]
    fn wire_filters_with_blank_query_normalize_to_empty() {
        let filters: SearchFilters =
            serde_json::from_str(r#"{"query": "  ", "tags": []}"#).expect("filters json");
        assert!(filters.normalized().is_empty());
    }

    #[test]
    fn sort_key_wire_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&SortKey::PriceDesc).expect("serialize"),
            r#""price_desc""#
        );
        let key: SortKey = serde_json::from_str(r#""newest""#).expect("deserialize");
        assert_eq!(key, SortKey::Newest);
    }

    #[test]
    fn tags_match_is_or_and_case_insensitive_substring() {
        let product_tags = vec!["BIO".to_string(), "made in france".to_string()];
        assert!(tags_match(&product_tags, &["bio".to_string(), "local".to_string()]));
        assert!(tags_match(&product_tags, &["france".to_string()]));
        assert!(!tags_match(&product_tags, &["vegan".to_string()]));
    }

    #[test]
    fn tags_match_empty_wanted_matches_everything() {
        assert!(tags_match(&["bio".to_string()], &[]));
        assert!(tags_match(&[], &[]));
    }

    #[test]
    fn tags_match_ignores_blank_wanted_entries() {
        assert!(!tags_match(&["bio".to_string()], &["  ".to_string()]));
    }
}
