#![allow(clippy::unwrap_used, clippy::expect_used)]

/// Scenario 1: Delete Then Recreate A List Entry
///
/// An entry deleted by one edit and replaced by the next comes back; doing
/// the same pair again ends in the same state. `delete` of an absent entry
/// is data-missing while `remove` of it succeeds.
mod common;

use common::*;
use netconf_core::edit::EditConfigRequest;
use netconf_core::errors::ErrorTag;
use netconf_core::xml::Element;
use netconf_engine::{GetConfigRequest, NetconfResponse, NetconfServer};

fn quiet_server() -> NetconfServer {
    server(registry(
        RecordingSubsystem::new("player"),
        RecordingSubsystem::new("library"),
    ))
}

fn edit(server: &NetconfServer, config: Vec<Element>) -> NetconfResponse {
    let mut response = NetconfResponse::new();
    server.on_edit_config(&admin(1), &EditConfigRequest::new("running", config), &mut response);
    response
}

fn get_config(server: &NetconfServer) -> Vec<Element> {
    let mut response = NetconfResponse::new();
    server.on_get_config(&admin(1), &GetConfigRequest::new("running"), &mut response);
    assert_ok(&response);
    response.data
}

fn delete_then_recreate(server: &NetconfServer) {
    assert_ok(&edit(
        server,
        vec![library(vec![with_op(artist("Lenny"), "delete")])],
    ));
    assert_ok(&edit(
        server,
        vec![library(vec![with_op(
            artist("Lenny").with_child(Element::leaf(NS, "genre", "rock")),
            "replace",
        )])],
    ));
}

#[test]
fn test_scenario_01_recreated_entry_is_returned() {
    // GIVEN running with artists Lenny and Prince
    let server = quiet_server();
    assert_ok(&edit(
        &server,
        vec![library(vec![artist("Lenny"), artist("Prince")])],
    ));

    // WHEN Lenny is deleted and then replaced
    delete_then_recreate(&server);

    // THEN get-config without a filter returns the recreated entry
    let data = get_config(&server);
    let mut names = artist_names(&data);
    names.sort();
    assert_eq!(names, vec!["Lenny", "Prince"]);
    let lenny = data[0]
        .children
        .iter()
        .find(|a| a.child_text(&qname("name")) == Some("Lenny"))
        .expect("Lenny should be back");
    assert_eq!(lenny.child_text(&qname("genre")), Some("rock"));
}

#[test]
fn test_scenario_01_repeating_the_pair_is_idempotent() {
    // GIVEN the delete-then-recreate pair applied once
    let server = quiet_server();
    assert_ok(&edit(&server, vec![library(vec![artist("Lenny")])]));
    delete_then_recreate(&server);
    let first = get_config(&server);

    // WHEN the same pair is applied again
    delete_then_recreate(&server);

    // THEN the datastore ends up identical
    assert_eq!(get_config(&server), first);
}

#[test]
fn test_scenario_01_delete_absent_is_data_missing() {
    // GIVEN a library without Bowie
    let server = quiet_server();
    assert_ok(&edit(&server, vec![library(vec![artist("Lenny")])]));

    // WHEN Bowie is deleted
    let response = edit(&server, vec![library(vec![with_op(artist("Bowie"), "delete")])]);

    // THEN the edit fails with data-missing and the path of the entry
    assert!(!response.ok);
    let error = &response.errors[0];
    assert_eq!(error.tag(), ErrorTag::DataMissing);
    assert_eq!(
        error.path(),
        Some("/jbox:library/jbox:artist[jbox:name='Bowie']")
    );
}

#[test]
fn test_scenario_01_remove_absent_succeeds() {
    // GIVEN a library without Bowie
    let server = quiet_server();
    assert_ok(&edit(&server, vec![library(vec![artist("Lenny")])]));

    // WHEN Bowie is removed
    let response = edit(&server, vec![library(vec![with_op(artist("Bowie"), "remove")])]);

    // THEN the edit succeeds and nothing changed
    assert_ok(&response);
    assert_eq!(artist_names(&get_config(&server)), vec!["Lenny"]);
}
