#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use netconf_core::errors::NetconfError;
use netconf_core::filter::{
    apply_filter, build_merged_filter, filter_to_xml, node_id_to_filter, parse, FilterNode,
};
use netconf_core::xml::Element;
use proptest::prelude::*;

fn artist_filter(name: Option<&str>, selects: &[&str]) -> Element {
    let mut artist = Element::new(NS, "artist");
    if let Some(name) = name {
        artist = artist.with_child(Element::leaf(NS, "name", name));
    }
    Element::new(NS, "library")
        .with_child(artist.with_children(selects.iter().map(|s| Element::new(NS, *s))))
}

fn fragment_pool() -> Vec<Element> {
    vec![
        artist_filter(Some("Lenny"), &["album"]),
        artist_filter(Some("Lenny"), &["genre"]),
        artist_filter(Some("Prince"), &[]),
        artist_filter(None, &["genre"]),
        Element::new(NS, "library").with_child(Element::new(NS, "stats")),
        Element::new(NS, "library"),
        Element::new(NS, "playlists"),
    ]
}

fn merged(indices: &[usize]) -> FilterNode {
    let pool = fragment_pool();
    let fragments: Vec<Element> = indices.iter().map(|i| pool[*i].clone()).collect();
    let mut root = FilterNode::root();
    build_merged_filter(&mut root, &fragments, &schema()).unwrap();
    root
}

fn order_pairs() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    prop::collection::vec(0usize..7, 1..8)
        .prop_flat_map(|order| (Just(order.clone()), Just(order).prop_shuffle()))
}

proptest! {
    #[test]
    fn prop_merge_is_order_independent((order, shuffled) in order_pairs()) {
        prop_assert_eq!(merged(&order), merged(&shuffled));
    }

    #[test]
    fn prop_merging_a_fragment_twice_changes_nothing(order in prop::collection::vec(0usize..7, 1..8)) {
        let mut doubled = order.clone();
        doubled.extend(order.iter().copied());
        prop_assert_eq!(merged(&doubled), merged(&order));
    }
}

#[test]
fn test_same_match_set_merges_selects() {
    // GIVEN two fragments for the same artist
    // WHEN they are merged
    let root = merged(&[0, 1]);

    // THEN one artist node carries both selects
    let library = &root.child_nodes()[0];
    assert_eq!(library.child_nodes().len(), 1);
    let artist = &library.child_nodes()[0];
    assert_eq!(artist.select_nodes().len(), 2);
    assert_eq!(artist.match_nodes().len(), 1);
}

#[test]
fn test_different_match_sets_stay_siblings() {
    let root = merged(&[0, 2, 3]);
    let library = &root.child_nodes()[0];
    assert_eq!(library.child_nodes().len(), 3);
}

#[test]
fn test_select_all_subsumes_plain_containment() {
    // GIVEN a fragment selecting the whole library and one narrowing it
    let root = merged(&[3, 5]);

    // THEN only the select node remains
    assert!(root.child_nodes().is_empty());
    assert_eq!(root.select_nodes().len(), 1);
}

#[test]
fn test_merge_of_different_types_is_rejected() {
    let mut artist = FilterNode::new(NS, "artist");
    let err = artist.merge(FilterNode::new(NS, "album")).unwrap_err();
    assert!(matches!(err, NetconfError::FilterTypeMismatch { .. }));
}

#[test]
fn test_merge_of_different_instances_is_rejected() {
    let mut lenny = FilterNode::new(NS, "artist").with_match(NS, "name", "Lenny");
    let err = lenny
        .merge(FilterNode::new(NS, "artist").with_match(NS, "name", "Prince"))
        .unwrap_err();
    assert!(matches!(err, NetconfError::FilterNotMergeable { .. }));
}

#[test]
fn test_malformed_fragments() {
    let schema = schema();

    let top_level_match = Element::leaf(NS, "library", "x");
    assert!(matches!(
        parse(&[top_level_match], &schema),
        Err(NetconfError::MalformedFilter { .. })
    ));

    let unknown_prefix = Element::unqualified("library").with_prefix("nope");
    assert!(matches!(
        parse(&[unknown_prefix], &schema),
        Err(NetconfError::MalformedFilter { .. })
    ));

    let no_namespace = Element::unqualified("library");
    assert!(parse(&[no_namespace], &schema).is_err());
}

#[test]
fn test_rendered_filter_parses_back_to_the_same_tree() {
    let schema = schema();
    let root = merged(&[0, 1, 2, 4]);

    let xml = filter_to_xml(&root, &schema);
    assert_eq!(parse(&[xml], &schema).unwrap(), root);
}

#[test]
fn test_node_id_filter_selects_exactly_that_instance() {
    // GIVEN a library with two artists
    let data = vec![Element::new(NS, "library")
        .with_child(Element::new(NS, "artist").with_child(Element::leaf(NS, "name", "Lenny")))
        .with_child(Element::new(NS, "artist").with_child(Element::leaf(NS, "name", "Prince")))];

    // WHEN filtered by the id of one of them
    let filter = node_id_to_filter(&artist_id("Prince")).unwrap();
    let root = FilterNode::root().with_child(filter);
    let selected = apply_filter(&data, &root, &schema());

    // THEN only that artist is returned
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].children.len(), 1);
    assert_eq!(
        selected[0].children[0].child_text(&netconf_core::xml::QName::new(NS, "name")),
        Some("Prince")
    );
}
