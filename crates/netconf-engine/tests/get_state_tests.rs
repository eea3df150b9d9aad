#![allow(clippy::unwrap_used, clippy::expect_used)]

//! `<get>`: config plus state from the owning subsystems
mod common;

use std::sync::Arc;

use common::*;
use netconf_core::edit::EditConfigRequest;
use netconf_core::errors::ErrorTag;
use netconf_core::xml::Element;
use netconf_engine::{GetRequest, NetconfResponse, NetconfServer};

fn seeded(player: Arc<RecordingSubsystem>, library_subsystem: Arc<RecordingSubsystem>) -> NetconfServer {
    let server = server(registry(player, library_subsystem));
    let mut response = NetconfResponse::new();
    server.on_edit_config(
        &admin(1),
        &EditConfigRequest::new(
            "running",
            vec![library(vec![
                artist("A").with_child(Element::leaf(NS, "genre", "rock")),
                artist("B"),
            ])],
        ),
        &mut response,
    );
    assert_ok(&response);
    server
}

fn get(server: &NetconfServer, filter: Option<Vec<Element>>) -> NetconfResponse {
    let mut response = NetconfResponse::for_message("7");
    server.on_get(
        &admin(2),
        &GetRequest {
            filter,
            depth: None,
        },
        &mut response,
    );
    response
}

#[test]
fn test_unfiltered_get_adds_all_state() {
    // GIVEN two artists in running
    let player = RecordingSubsystem::new("player");
    let library_subsystem = RecordingSubsystem::new("library");
    let server = seeded(player.clone(), library_subsystem.clone());

    // WHEN everything is requested
    let response = get(&server, None);

    // THEN every artist carries its play count from the player
    assert_ok(&response);
    let library_data = &response.data[0];
    for artist in library_data.children.iter().filter(|e| e.is(NS, "artist")) {
        assert_eq!(artist.child_text(&qname("plays")), Some("42"));
    }

    // AND the library's statistics come from the library subsystem
    let stats = library_data.child(&qname("stats")).unwrap();
    assert_eq!(stats.child_text(&qname("artist-count")), Some("2"));
    assert_eq!(library_subsystem.requests_received(), 1);
    assert_eq!(player.requests_received(), 2);
}

#[test]
fn test_overlapping_branches_query_each_node_once() {
    // GIVEN a filter where two unmergeable branches both select A's plays
    let player = RecordingSubsystem::new("player");
    let library_subsystem = RecordingSubsystem::new("library");
    let server = seeded(player.clone(), library_subsystem.clone());
    let filter = vec![
        library(vec![artist("A").with_child(Element::new(NS, "plays"))]),
        library(vec![Element::new(NS, "artist").with_child(Element::new(NS, "plays"))]),
    ];

    // WHEN the filtered get runs
    let response = get(&server, Some(filter));

    // THEN each artist is asked for once and answers once
    assert_ok(&response);
    assert_eq!(player.requests_received(), 2);
    for artist in &response.data[0].children {
        let plays = artist
            .children
            .iter()
            .filter(|child| child.is(NS, "plays"))
            .count();
        assert_eq!(plays, 1);
    }

    // AND no state outside the filter was requested
    assert_eq!(library_subsystem.query_count(), 0);
    assert!(response.data[0].child(&qname("stats")).is_none());
}

#[test]
fn test_config_only_filter_asks_no_subsystem() {
    let player = RecordingSubsystem::new("player");
    let server = seeded(player.clone(), RecordingSubsystem::new("library"));
    let filter = vec![library(vec![artist("A").with_child(Element::new(NS, "genre"))])];

    let response = get(&server, Some(filter));

    assert_ok(&response);
    assert_eq!(artist_names(&response.data), vec!["A"]);
    assert_eq!(player.query_count(), 0);
}

#[test]
fn test_failing_subsystem_fails_the_get() {
    // GIVEN a player whose state backend is down
    let server = seeded(
        RecordingSubsystem::failing("player"),
        RecordingSubsystem::new("library"),
    );

    // WHEN state is requested
    let response = get(&server, None);

    // THEN the reply carries the subsystem's error and no data
    assert!(!response.ok);
    assert!(response.data.is_empty());
    let error = &response.errors[0];
    assert_eq!(error.tag(), ErrorTag::OperationFailed);
    assert_eq!(error.info().get("subsystem").map(String::as_str), Some("player"));
    assert_eq!(response.message_id.as_deref(), Some("7"));
}

#[test]
fn test_denied_state_read_is_access_denied() {
    let server = seeded(
        RecordingSubsystem::denying("player"),
        RecordingSubsystem::new("library"),
    );

    let response = get(&server, None);

    assert_eq!(response.errors[0].tag(), ErrorTag::AccessDenied);
}

#[test]
fn test_empty_filter_selects_nothing() {
    let player = RecordingSubsystem::new("player");
    let server = seeded(player.clone(), RecordingSubsystem::new("library"));

    let response = get(&server, Some(Vec::new()));

    assert_ok(&response);
    assert!(response.data.is_empty());
    assert_eq!(player.query_count(), 0);
}
