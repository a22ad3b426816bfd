//! A whole session driven against the in-memory service.

use std::collections::BTreeSet;

use pinmap::prelude::*;
use pinmap::{Error, IdentityState, MutationError, SessionStep};
use pinmap_harness::Scenario;
use pinmap_runtime::MemoryStorage;
use pretty_assertions::assert_eq;

const VIEWPORT: PixelSize = PixelSize::new(1024.0, 768.0);

fn visitor(scenario: &Scenario, storage: MemoryStorage) -> MapSession<MemoryStorage> {
    MapSession::visitor(scenario.map.clone(), storage, &scenario.config, VIEWPORT)
}

#[test]
fn opening_loads_floors_then_their_annotations() {
    let mut scenario = Scenario::new(false);
    scenario.seed(2, 3);
    let mut session = MapSession::owner(
        scenario.map.clone(),
        MemoryStorage::new(),
        &scenario.config,
        VIEWPORT,
    );

    assert_eq!(session.open().unwrap(), None);
    scenario.settle(&mut session).unwrap();
    assert_eq!(session.pipeline().floors().len(), 2);
    assert_eq!(session.pipeline().annotations().len(), 6);

    assert!(session.sync_view());
    assert_eq!(session.view().cards().len(), 2);
}

#[test]
fn visitor_on_private_map_is_read_only() {
    let mut scenario = Scenario::new(false);
    let floors = scenario.seed(1, 0);
    let mut session = visitor(&scenario, MemoryStorage::new());

    assert_eq!(session.open().unwrap(), Some(SessionStep::NotPublic));
    scenario.settle(&mut session).unwrap();
    assert_eq!(session.actor(), Actor::Viewer);

    let denied = session.create_annotation(
        &floors[0].id,
        AnnotationDraft::new("Nope", "", Position::new(10.0, 10.0)),
    );
    assert!(matches!(
        denied,
        Err(Error::Mutation(MutationError::PermissionDenied(_)))
    ));
    assert!(session.pipeline().annotations().is_empty());
}

#[test]
fn registered_collaborator_authors_pins() {
    let mut scenario = Scenario::new(true);
    let floors = scenario.seed(1, 0);
    let mut session = visitor(&scenario, MemoryStorage::new());

    assert_eq!(session.open().unwrap(), Some(SessionStep::NeedNickname));
    session.register("Robin").unwrap();
    scenario.settle(&mut session).unwrap();
    assert!(matches!(session.identity().state(), IdentityState::Active(_)));

    session
        .create_annotation(
            &floors[0].id,
            AnnotationDraft::new("Coffee", "", Position::new(30.0, 40.0)),
        )
        .unwrap();
    scenario.settle(&mut session).unwrap();

    let stored = scenario.service.annotations_on(&floors[0].id);
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].author.as_ref().map(|a| a.nickname.as_str()),
        Some("Robin")
    );
}

#[test]
fn returning_collaborator_verifies_alongside_the_load() {
    let mut scenario = Scenario::new(true);
    scenario.seed(1, 1);
    let mut storage = MemoryStorage::new();
    {
        let mut first = visitor(&scenario, storage.clone());
        first.open().unwrap();
        first.register("Robin").unwrap();
        scenario.settle(&mut first).unwrap();
        storage = first.identity().storage().clone();
    }

    let mut session = visitor(&scenario, storage);
    assert!(matches!(
        session.open().unwrap(),
        Some(SessionStep::Verifying(_))
    ));
    let outgoing = session.take_calls();
    let ids: BTreeSet<_> = outgoing.iter().map(|call| call.id).collect();
    assert_eq!(outgoing.len(), 2);
    assert_eq!(ids.len(), 2);
    for call in &outgoing {
        session.complete(call.id, call.call.dispatch(&scenario.service));
    }
    scenario.settle(&mut session).unwrap();

    assert!(matches!(session.actor(), Actor::Editor(_)));
    assert_eq!(session.pipeline().annotations().len(), 1);
}

#[test]
fn closing_abandons_pending_verification() {
    let mut scenario = Scenario::new(true);
    scenario.seed(1, 0);
    let storage = {
        let mut first = visitor(&scenario, MemoryStorage::new());
        first.open().unwrap();
        first.register("Robin").unwrap();
        scenario.settle(&mut first).unwrap();
        first.identity().storage().clone()
    };

    let mut session = visitor(&scenario, storage);
    session.open().unwrap();
    session.close();
    scenario.settle(&mut session).unwrap();
    assert_eq!(scenario.service.call_count("verifyEditor"), 0);
    assert_eq!(session.identity().state(), IdentityState::Unregistered);
}
