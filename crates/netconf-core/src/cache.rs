//! Per-request cache of subsystem state responses
//!
//! One `get` can reach the same subsystem from many branches of the filter.
//! The cache makes sure each (node, leaf) and (node, filter) pair is asked for
//! at most once per request. A cache lives for exactly one inbound request:
//! the server creates it and threads it through every call that can reach a
//! subsystem, and it is dropped with the response.
//!
//! Absence is cached too. A leaf the subsystem did not return is recorded as
//! answered-empty and is not asked for again.

use std::collections::HashMap;

use crate::errors::{NetconfError, Result};
use crate::filter::FilterNode;
use crate::node_id::NodeId;
use crate::subsystem::{StateAttributeQuery, StateAttributeResponse, Subsystem};
use crate::xml::{Element, QName};

type LeafAnswers = HashMap<NodeId, HashMap<QName, Vec<Element>>>;
type FilterAnswers = HashMap<NodeId, HashMap<FilterNode, Vec<Element>>>;

#[derive(Debug, Default)]
pub struct ResponseCache {
    leaves: HashMap<String, LeafAnswers>,
    filters: HashMap<String, FilterAnswers>,
    subsystem_calls: usize,
    hits: usize,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times a subsystem was actually queried
    pub fn subsystem_calls(&self) -> usize {
        self.subsystem_calls
    }

    /// Number of leaf/filter requests answered from the cache
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Serve cached leaves into `results`; uncached ones go to `remaining`
    pub fn find_and_populate_stored_leaves(
        &self,
        results: &mut StateAttributeResponse,
        remaining: &mut StateAttributeQuery,
        requested: &StateAttributeQuery,
        subsystem_id: &str,
    ) -> usize {
        let stored = self.leaves.get(subsystem_id);
        let mut hits = 0;
        for (node_id, entry) in requested.iter() {
            let answers = stored.and_then(|by_node| by_node.get(node_id));
            for leaf in &entry.leaves {
                match answers.and_then(|by_leaf| by_leaf.get(leaf)) {
                    Some(elements) => {
                        hits += 1;
                        results
                            .entry(node_id.clone())
                            .or_default()
                            .extend(elements.iter().cloned());
                    }
                    None => remaining.add_leaf(node_id.clone(), leaf.clone()),
                }
            }
        }
        hits
    }

    /// Serve cached filter answers into `results`; the rest go to `remaining`
    ///
    /// Besides exact matches, a filter that only narrows by content match is
    /// served from a cached select-all answer for the same subtree type.
    pub fn find_and_populate_stored_filters(
        &self,
        results: &mut StateAttributeResponse,
        remaining: &mut StateAttributeQuery,
        requested: &StateAttributeQuery,
        subsystem_id: &str,
    ) -> usize {
        let stored = self.filters.get(subsystem_id);
        let mut hits = 0;
        for (node_id, entry) in requested.iter() {
            let answers = stored.and_then(|by_node| by_node.get(node_id));
            for filter in &entry.filters {
                match answers.and_then(|by_filter| cached_answer(by_filter, filter)) {
                    Some(elements) => {
                        hits += 1;
                        results.entry(node_id.clone()).or_default().extend(elements);
                    }
                    None => remaining.add_filter(node_id.clone(), filter.clone()),
                }
            }
        }
        hits
    }

    /// Record what `subsystem_id` returned for `query`
    ///
    /// Every requested leaf and filter is recorded, including the ones the
    /// subsystem returned nothing for.
    pub fn cache_state_response(
        &mut self,
        subsystem_id: &str,
        query: &StateAttributeQuery,
        response: &StateAttributeResponse,
    ) {
        for (node_id, entry) in query.iter() {
            let returned = response.get(node_id).map(Vec::as_slice).unwrap_or(&[]);
            if !entry.leaves.is_empty() {
                let by_leaf = self
                    .leaves
                    .entry(subsystem_id.to_string())
                    .or_default()
                    .entry(node_id.clone())
                    .or_default();
                for leaf in &entry.leaves {
                    let elements = returned
                        .iter()
                        .filter(|el| el.is(&leaf.namespace, &leaf.local_name))
                        .cloned()
                        .collect();
                    by_leaf.insert(leaf.clone(), elements);
                }
            }
            if !entry.filters.is_empty() {
                let by_filter = self
                    .filters
                    .entry(subsystem_id.to_string())
                    .or_default()
                    .entry(node_id.clone())
                    .or_default();
                for filter in &entry.filters {
                    let elements = returned
                        .iter()
                        .filter(|el| filter.matches_element(el))
                        .cloned()
                        .collect();
                    by_filter.insert(filter.clone(), elements);
                }
            }
        }
    }

    /// Answer `query` from `subsystem`, asking it only for what is not cached
    ///
    /// Results are always assembled from the cache in query order, so the same
    /// request answers identically whether or not it was a cache hit.
    ///
    /// # Errors
    ///
    /// `Subsystem` wrapping the subsystem's error. Nothing is cached then.
    pub fn retrieve(
        &mut self,
        subsystem: &dyn Subsystem,
        query: &StateAttributeQuery,
    ) -> Result<StateAttributeResponse> {
        let (_, remaining, hits) = self.lookup(subsystem.id(), query);
        self.hits += hits;
        tracing::trace!(
            subsystem = subsystem.id(),
            hits,
            misses = remaining.request_count(),
            "response cache lookup"
        );
        if !remaining.is_empty() {
            self.subsystem_calls += 1;
            tracing::debug!(
                subsystem = subsystem.id(),
                requests = remaining.request_count(),
                "querying subsystem state"
            );
            let fresh = subsystem
                .retrieve_state_attributes(&remaining)
                .map_err(|error| NetconfError::Subsystem {
                    subsystem: subsystem.id().to_string(),
                    error: Box::new(error),
                })?;
            self.cache_state_response(subsystem.id(), &remaining, &fresh);
        }
        let (results, _, _) = self.lookup(subsystem.id(), query);
        Ok(results)
    }

    fn lookup(
        &self,
        subsystem_id: &str,
        query: &StateAttributeQuery,
    ) -> (StateAttributeResponse, StateAttributeQuery, usize) {
        let mut results = StateAttributeResponse::new();
        let mut remaining = StateAttributeQuery::new();
        let hits = self.find_and_populate_stored_leaves(&mut results, &mut remaining, query, subsystem_id)
            + self.find_and_populate_stored_filters(&mut results, &mut remaining, query, subsystem_id);
        (results, remaining, hits)
    }
}

fn cached_answer(
    by_filter: &HashMap<FilterNode, Vec<Element>>,
    filter: &FilterNode,
) -> Option<Vec<Element>> {
    if let Some(elements) = by_filter.get(filter) {
        return Some(elements.clone());
    }
    if !filter.is_select_all() {
        return None;
    }
    let broader = FilterNode::new(filter.namespace(), filter.node_name());
    by_filter.get(&broader).map(|elements| {
        elements
            .iter()
            .filter(|el| filter.matches_element(el))
            .cloned()
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RpcError;
    use crate::node_id::Rdn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NS: &str = "urn:example:jukebox";

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    impl Subsystem for Counting {
        fn id(&self) -> &str {
            "counting"
        }

        fn retrieve_state_attributes(
            &self,
            query: &StateAttributeQuery,
        ) -> std::result::Result<StateAttributeResponse, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RpcError::operation_failed("backend down"));
            }
            let mut response = StateAttributeResponse::new();
            for (node_id, entry) in query.iter() {
                let out = response.entry(node_id.clone()).or_default();
                for leaf in &entry.leaves {
                    if leaf.local_name == "plays" {
                        out.push(Element::leaf(NS, "plays", "7"));
                    }
                }
                for filter in &entry.filters {
                    for id in ["1", "2"] {
                        let stat = Element::new(NS, filter.node_name())
                            .with_child(Element::leaf(NS, "id", id));
                        if filter.matches_element(&stat) {
                            out.push(stat);
                        }
                    }
                }
            }
            Ok(response)
        }
    }

    fn player() -> NodeId {
        NodeId::new().with_rdn(Rdn::container(NS, "player"))
    }

    fn leaf_query(names: &[&str]) -> StateAttributeQuery {
        let mut query = StateAttributeQuery::new();
        for name in names {
            query.add_leaf(player(), QName::new(NS, *name));
        }
        query
    }

    #[test]
    fn test_second_retrieve_is_served_from_cache() {
        let subsystem = Counting::new();
        let mut cache = ResponseCache::new();
        let query = leaf_query(&["plays"]);

        let first = cache.retrieve(&subsystem, &query).unwrap();
        let second = cache.retrieve(&subsystem, &query).unwrap();

        assert_eq!(first, second);
        assert_eq!(subsystem.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.subsystem_calls(), 1);
    }

    #[test]
    fn test_absent_leaf_is_cached_as_empty() {
        let subsystem = Counting::new();
        let mut cache = ResponseCache::new();
        let query = leaf_query(&["skips"]);

        assert!(cache.retrieve(&subsystem, &query).unwrap()[&player()].is_empty());
        cache.retrieve(&subsystem, &query).unwrap();
        assert_eq!(subsystem.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_narrower_leaf_set_needs_no_call() {
        let subsystem = Counting::new();
        let mut cache = ResponseCache::new();
        cache.retrieve(&subsystem, &leaf_query(&["plays", "skips"])).unwrap();
        cache.retrieve(&subsystem, &leaf_query(&["plays"])).unwrap();
        assert_eq!(subsystem.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_partial_hit_asks_only_for_missing_part() {
        let subsystem = Counting::new();
        let mut cache = ResponseCache::new();
        cache.retrieve(&subsystem, &leaf_query(&["plays"])).unwrap();

        let mut remaining = StateAttributeQuery::new();
        let mut results = StateAttributeResponse::new();
        cache.find_and_populate_stored_leaves(
            &mut results,
            &mut remaining,
            &leaf_query(&["plays", "skips"]),
            "counting",
        );
        assert_eq!(remaining, leaf_query(&["skips"]));
        assert_eq!(results[&player()], vec![Element::leaf(NS, "plays", "7")]);
    }

    #[test]
    fn test_matched_filter_served_from_select_all_answer() {
        let subsystem = Counting::new();
        let mut cache = ResponseCache::new();

        let mut all = StateAttributeQuery::new();
        all.add_filter(player(), FilterNode::new(NS, "stats"));
        assert_eq!(cache.retrieve(&subsystem, &all).unwrap()[&player()].len(), 2);

        let mut one = StateAttributeQuery::new();
        one.add_filter(player(), FilterNode::new(NS, "stats").with_match(NS, "id", "2"));
        let answer = cache.retrieve(&subsystem, &one).unwrap();

        assert_eq!(answer[&player()].len(), 1);
        assert_eq!(subsystem.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_caches_nothing() {
        let mut subsystem = Counting::new();
        subsystem.fail = true;
        let mut cache = ResponseCache::new();
        let query = leaf_query(&["plays"]);

        let err = cache.retrieve(&subsystem, &query).unwrap_err();
        assert!(matches!(err, NetconfError::Subsystem { .. }));

        subsystem.fail = false;
        cache.retrieve(&subsystem, &query).unwrap();
        assert_eq!(subsystem.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_entries_are_per_subsystem() {
        struct Other;
        impl Subsystem for Other {
            fn id(&self) -> &str {
                "other"
            }
        }
        let subsystem = Counting::new();
        let mut cache = ResponseCache::new();
        let query = leaf_query(&["plays"]);
        cache.retrieve(&subsystem, &query).unwrap();

        assert!(cache.retrieve(&Other, &query).unwrap()[&player()].is_empty());
        assert_eq!(cache.subsystem_calls(), 2);
    }
}
