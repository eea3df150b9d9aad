#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use netconf_core::node_id::{NodeId, Rdn};
use proptest::prelude::*;

fn rdn_strategy() -> impl Strategy<Value = Rdn> {
    // Separators and escapes are over-represented on purpose
    let field = "[a-z0-9/=\\\\:.-]{0,8}";
    (field, field, field).prop_map(|(rdn_type, namespace, value)| Rdn::new(rdn_type, namespace, value))
}

fn node_id_strategy() -> impl Strategy<Value = NodeId> {
    prop::collection::vec(rdn_strategy(), 0..6).prop_map(NodeId::from_rdns)
}

proptest! {
    #[test]
    fn prop_encode_decode_is_identity(id in node_id_strategy()) {
        let decoded = NodeId::decode(&id.encode()).unwrap();
        prop_assert_eq!(decoded, id);
    }

    #[test]
    fn prop_numeric_keys_order_as_integers(a in 0u64..100_000, b in 0u64..100_000) {
        let left = artist_id(&a.to_string());
        let right = artist_id(&b.to_string());
        prop_assert_eq!(left.cmp(&right), a.cmp(&b));
    }

    #[test]
    fn prop_ordering_is_antisymmetric(a in node_id_strategy(), b in node_id_strategy()) {
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        prop_assert_eq!(a.cmp(&b) == std::cmp::Ordering::Equal, a == b);
    }

    #[test]
    fn prop_ordering_is_transitive(
        a in "[0-9a]{1,3}",
        b in "[0-9a]{1,3}",
        c in "[0-9a]{1,3}",
    ) {
        let mut ids = [artist_id(&a), artist_id(&b), artist_id(&c)];
        ids.sort();
        prop_assert!(ids[0] <= ids[1]);
        prop_assert!(ids[1] <= ids[2]);
        prop_assert!(ids[0] <= ids[2]);
    }

    #[test]
    fn prop_every_inserted_key_is_found(keys in prop::collection::btree_set("[0-9a]{1,3}", 1..16)) {
        let map: std::collections::BTreeMap<NodeId, usize> = keys
            .iter()
            .enumerate()
            .map(|(index, key)| (artist_id(key), index))
            .collect();
        prop_assert_eq!(map.len(), keys.len());
        for key in &keys {
            prop_assert!(map.contains_key(&artist_id(key)));
        }
    }

    #[test]
    fn prop_prefix_sorts_first(id in node_id_strategy(), extra in rdn_strategy()) {
        let longer = id.append(extra);
        prop_assert!(id < longer);
    }
}

#[test]
fn test_sorting_artists_by_numeric_key() {
    // GIVEN ids keyed 10, 9 and 100
    let mut ids = vec![artist_id("10"), artist_id("9"), artist_id("100")];

    // WHEN sorted
    ids.sort();

    // THEN numeric keys come out in integer order
    let keys: Vec<&str> = ids
        .iter()
        .map(|id| id.last_rdn().unwrap().value.as_str())
        .collect();
    assert_eq!(keys, vec!["9", "10", "100"]);
}

#[test]
fn test_numeric_keys_sort_before_text_keys() {
    assert!(artist_id("10") < artist_id("9a"));
    assert!(artist_id("9") < artist_id("1a"));
    assert!(artist_id("10") < artist_id("1a"));
    assert!(artist_id("Lenny") < artist_id("Prince"));
}

#[test]
fn test_mixed_keys_stay_findable_in_ordered_maps() {
    // GIVEN numeric and alphanumeric keys in one map
    let keys = ["9", "10", "1a", "2", "20", "3", "30", "b", "3c", "100", "0"];
    let map: std::collections::BTreeMap<NodeId, &str> =
        keys.iter().map(|key| (artist_id(key), *key)).collect();

    // THEN every key is found again
    for key in keys {
        assert_eq!(map.get(&artist_id(key)), Some(&key));
    }
}

#[test]
fn test_parent_of_list_entry_is_its_container() {
    let lenny = artist_id("Lenny");
    let library = NodeId::new().with_rdn(Rdn::container(NS, "library"));

    assert_eq!(lenny.parent(), Some(library.clone()));
    assert_eq!(library.parent(), Some(NodeId::new()));
    assert_eq!(NodeId::new().parent(), None);
}

#[test]
fn test_from_str_matches_decode() {
    let lenny = artist_id("Lenny");
    let parsed: NodeId = lenny.encode().parse().unwrap();
    assert_eq!(parsed, lenny);
    assert!("library".parse::<NodeId>().is_err());
}

#[test]
fn test_xpath_rendering_of_list_entry() {
    assert_eq!(
        artist_id("Lenny").xpath_string(&schema()),
        "/jbox:library/jbox:artist[jbox:name='Lenny']"
    );
}
