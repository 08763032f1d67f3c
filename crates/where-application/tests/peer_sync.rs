#[macro_use]
mod common;

use common::{Peer, introduce, location, office, peer};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use where_core::gateway::{AppSignal, ZomeGateway, where_fn};
use where_core::placement::{Coord, HereOutput, LocationInfo, dematerialize_here};
use where_core::presence::PresenceStatus;
use where_core::signal::{Message, SignalPayload};
use where_core::SpaceId;
use where_infrastructure::LocalConductor;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_space_is_probed_once_per_peer() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let bob = peer(&conductor, "uhCAkBob");
    introduce(&alice, &bob).await;

    let space_id = alice
        .dvm
        .construct_new_play(office(), vec!["day 1".to_string(), "day 2".to_string()])
        .await
        .unwrap();

    wait_until!(bob.dvm.play(&space_id).await.is_some());
    let play = bob.dvm.play(&space_id).await.unwrap();
    assert_eq!(play.space.name, "Office");
    assert_eq!(play.sessions.len(), 2);
    assert_eq!(
        conductor.call_count_by(bob.cell.cell_id(), where_fn::GET_SPACE_SESSIONS),
        1
    );

    // A second announcement of a known space is ignored.
    let again = SignalPayload::new(
        Some(space_id.clone()),
        alice.me(),
        Message::NewSpace(space_id.clone()),
    );
    bob.dvm
        .handle_signal(AppSignal {
            cell_id: bob.cell.cell_id().clone(),
            zome_name: "where".to_string(),
            payload: serde_json::to_value(&again).unwrap(),
        })
        .await;
    assert_eq!(
        conductor.call_count_by(bob.cell.cell_id(), where_fn::GET_SPACE_SESSIONS),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_published_location_reaches_peer_once() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let bob = peer(&conductor, "uhCAkBob");
    introduce(&alice, &bob).await;
    let space_id = alice.dvm.construct_new_play(office(), vec![]).await.unwrap();
    wait_until!(bob.dvm.play(&space_id).await.is_some());
    let session_id = alice.dvm.current_session(&space_id).await.unwrap();

    let info = alice
        .dvm
        .publish_location(location(&session_id, 12.5, 40.0, "alice"), &space_id)
        .await
        .unwrap();

    wait_until!(
        bob.dvm
            .where_zvm()
            .session(&session_id)
            .await
            .is_some_and(|session| session.locations.len() == 1)
    );
    let session = bob.dvm.where_zvm().session(&session_id).await.unwrap();
    assert_eq!(session.locations[0].as_ref(), Some(&info));

    // Duplicate delivery merges by link.
    let duplicate = SignalPayload::new(
        Some(space_id.clone()),
        alice.me(),
        Message::NewHere(HereOutput {
            entry: dematerialize_here(&info.location),
            link_id: info.link_id.clone(),
            author: info.author.clone(),
        }),
    );
    bob.dvm
        .handle_signal(AppSignal {
            cell_id: bob.cell.cell_id().clone(),
            zome_name: "where".to_string(),
            payload: serde_json::to_value(&duplicate).unwrap(),
        })
        .await;
    let session = bob.dvm.where_zvm().session(&session_id).await.unwrap();
    assert_eq!(session.locations.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_keeps_slot_and_changes_link() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let bob = peer(&conductor, "uhCAkBob");
    introduce(&alice, &bob).await;
    let space_id = alice.dvm.construct_new_play(office(), vec![]).await.unwrap();
    wait_until!(bob.dvm.play(&space_id).await.is_some());
    let session_id = alice.dvm.current_session(&space_id).await.unwrap();
    for x in [1.0, 2.0] {
        alice
            .dvm
            .publish_location(location(&session_id, x, 0.0, "alice"), &space_id)
            .await
            .unwrap();
    }
    wait_until!(
        bob.dvm
            .where_zvm()
            .session(&session_id)
            .await
            .is_some_and(|session| session.locations.len() == 2)
    );

    let outcome = alice
        .dvm
        .update_location(
            &session_id,
            &space_id,
            0,
            Coord::new(9.0, 9.0),
            Some("meeting".to_string()),
            None,
        )
        .await
        .unwrap();

    assert!(outcome.is_clean());
    assert_eq!(outcome.index, 0);
    assert_ne!(outcome.info.link_id, outcome.previous_link);
    let session = alice.dvm.where_zvm().session(&session_id).await.unwrap();
    assert_eq!(session.locations.len(), 2);
    let updated = session.locations[0].as_ref().unwrap();
    assert_eq!(updated.location.coord, Coord::new(9.0, 9.0));
    assert_eq!(updated.location.meta.tag.as_deref(), Some("meeting"));
    assert_eq!(updated.link_id, outcome.info.link_id);

    let live = conductor.live_links(alice.cell.cell_id().dna(), &session_id);
    assert_eq!(live.len(), 2);
    assert!(!live.contains(&outcome.previous_link));

    wait_until!(
        bob.dvm
            .where_zvm()
            .session(&session_id)
            .await
            .and_then(|session| session.locations[0].clone())
            .is_some_and(|info| info.link_id == outcome.info.link_id)
    );
    let session = bob.dvm.where_zvm().session(&session_id).await.unwrap();
    assert_eq!(session.locations.len(), 2);
}

/// Hands `info`, published by `from`, to `to` as a NewHere push.
async fn deliver_here(to: &Peer, from: &Peer, space_id: &SpaceId, info: &LocationInfo) {
    let payload = SignalPayload::new(
        Some(space_id.clone()),
        from.me(),
        Message::NewHere(HereOutput {
            entry: dematerialize_here(&info.location),
            link_id: info.link_id.clone(),
            author: info.author.clone(),
        }),
    );
    to.dvm
        .handle_signal(AppSignal {
            cell_id: to.cell.cell_id().clone(),
            zome_name: "where".to_string(),
            payload: serde_json::to_value(&payload).unwrap(),
        })
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_lands_on_old_link_when_peers_disagree_on_order() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let bob = peer(&conductor, "uhCAkBob");
    introduce(&alice, &bob).await;
    let space_id = alice.dvm.construct_new_play(office(), vec![]).await.unwrap();
    wait_until!(bob.dvm.play(&space_id).await.is_some());
    let session_id = alice.dvm.current_session(&space_id).await.unwrap();

    // Each peer places its own marker before hearing the other's.
    assert!(alice.dvm.detach());
    assert!(bob.dvm.detach());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let alice_mark = alice
        .dvm
        .publish_location(location(&session_id, 1.0, 1.0, "alice"), &space_id)
        .await
        .unwrap();
    let bob_mark = bob
        .dvm
        .publish_location(location(&session_id, 2.0, 2.0, "bob"), &space_id)
        .await
        .unwrap();
    alice.dvm.attach();
    bob.dvm.attach();
    deliver_here(&alice, &bob, &space_id, &bob_mark).await;
    deliver_here(&bob, &alice, &space_id, &alice_mark).await;
    let links = |session: where_core::placement::PlacementSession| -> Vec<_> {
        session
            .locations
            .into_iter()
            .map(|slot| slot.map(|info| info.link_id))
            .collect()
    };
    assert_eq!(
        links(alice.dvm.where_zvm().session(&session_id).await.unwrap()),
        vec![Some(alice_mark.link_id.clone()), Some(bob_mark.link_id.clone())]
    );
    assert_eq!(
        links(bob.dvm.where_zvm().session(&session_id).await.unwrap()),
        vec![Some(bob_mark.link_id.clone()), Some(alice_mark.link_id.clone())]
    );

    let outcome = alice
        .dvm
        .update_location(&session_id, &space_id, 0, Coord::new(8.0, 8.0), None, None)
        .await
        .unwrap();
    assert_eq!(outcome.previous_link, alice_mark.link_id);

    wait_until!(
        bob.dvm
            .where_zvm()
            .session(&session_id)
            .await
            .is_some_and(|session| session.position_of(&outcome.info.link_id).is_some())
    );
    let session = bob.dvm.where_zvm().session(&session_id).await.unwrap();
    assert_eq!(session.locations.len(), 2);
    assert_eq!(session.locations[0].as_ref(), Some(&bob_mark));
    let moved = session.locations[1].as_ref().unwrap();
    assert_eq!(moved.link_id, outcome.info.link_id);
    assert_eq!(moved.location.coord, Coord::new(8.0, 8.0));
    assert!(session.position_of(&alice_mark.link_id).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delete_leaves_tombstone_on_both_sides() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let bob = peer(&conductor, "uhCAkBob");
    introduce(&alice, &bob).await;
    let space_id = alice.dvm.construct_new_play(office(), vec![]).await.unwrap();
    wait_until!(bob.dvm.play(&space_id).await.is_some());
    let session_id = alice.dvm.current_session(&space_id).await.unwrap();
    let mut links = Vec::new();
    for x in [1.0, 2.0, 3.0] {
        let info = alice
            .dvm
            .publish_location(location(&session_id, x, 0.0, "alice"), &space_id)
            .await
            .unwrap();
        links.push(info.link_id);
    }
    wait_until!(
        bob.dvm
            .where_zvm()
            .session(&session_id)
            .await
            .is_some_and(|session| session.locations.len() == 3)
    );

    alice
        .dvm
        .delete_location(&session_id, &space_id, 1)
        .await
        .unwrap();

    let session = alice.dvm.where_zvm().session(&session_id).await.unwrap();
    assert_eq!(session.locations.len(), 3);
    assert!(session.locations[1].is_none());
    assert_eq!(session.locations[2].as_ref().unwrap().link_id, links[2]);

    wait_until!(
        bob.dvm
            .where_zvm()
            .session(&session_id)
            .await
            .is_some_and(|session| session.locations[1].is_none())
    );
    let session = bob.dvm.where_zvm().session(&session_id).await.unwrap();
    assert_eq!(session.locations.len(), 3);
    assert_eq!(session.locations[0].as_ref().unwrap().link_id, links[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_indices_are_contiguous() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let space_id = alice.dvm.construct_new_play(office(), vec!["a".into(), "b".into(), "c".into()]).await.unwrap();

    let manifest = alice.dvm.where_zvm().manifest(&space_id).await.unwrap();
    let mut indices = Vec::new();
    for session_id in &manifest.session_ids {
        let session = alice.dvm.where_zvm().session(session_id).await.unwrap();
        indices.push((session.name, session.index));
    }
    assert_eq!(
        indices,
        vec![("a".to_string(), 0), ("b".to_string(), 1), ("c".to_string(), 2)]
    );

    let next = alice.dvm.create_next_session(&space_id, "d").await.unwrap();
    let session = alice.dvm.where_zvm().session(&next).await.unwrap();
    assert_eq!(session.index, 3);
    assert_eq!(alice.dvm.play(&space_id).await.unwrap().sessions["d"], next);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_session_reaches_peer() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let bob = peer(&conductor, "uhCAkBob");
    introduce(&alice, &bob).await;
    let space_id = alice.dvm.construct_new_play(office(), vec![]).await.unwrap();
    wait_until!(bob.dvm.play(&space_id).await.is_some());

    let next = alice
        .dvm
        .create_next_session(&space_id, "afternoon")
        .await
        .unwrap();

    wait_until!(
        bob.dvm
            .play(&space_id)
            .await
            .is_some_and(|play| play.sessions.contains_key("afternoon"))
    );
    let manifest = bob.dvm.where_zvm().manifest(&space_id).await.unwrap();
    assert_eq!(manifest.session_ids.last(), Some(&next));
    assert_eq!(bob.dvm.where_zvm().session(&next).await.unwrap().index, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_push_to_self_or_nobody() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let ping = SignalPayload::ping(None, &alice.me());

    assert!(!alice.dvm.where_zvm().notify_peers(&ping, &[alice.me()]).await);
    assert!(!alice.dvm.where_zvm().notify_peers(&ping, &[]).await);
    assert!(!alice.dvm.ping_others(None).await);
    assert_eq!(conductor.signals_delivered(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_presence_decays_from_last_signal() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let bob = peer(&conductor, "uhCAkBob");
    introduce(&alice, &bob).await;

    let seen = alice.dvm.last_seen(&bob.me()).await.unwrap();
    assert_eq!(
        alice.dvm.presence_status_at(&bob.me(), seen + 5).await,
        PresenceStatus::Online
    );
    assert_eq!(
        alice.dvm.presence_status_at(&bob.me(), seen + 31).await,
        PresenceStatus::Away
    );
    assert_eq!(
        alice.dvm.presence_status_at(&bob.me(), seen + 301).await,
        PresenceStatus::Offline
    );
    assert_eq!(
        alice.dvm.presence_status_at(&alice.me(), seen + 10_000).await,
        PresenceStatus::Online
    );
    assert!(alice.dvm.all_current_others_at(seen + 301).await.is_empty());
    assert_eq!(alice.dvm.all_others().await, vec![bob.me()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_subscriber_does_not_starve_others() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let space_id = alice.dvm.construct_new_play(office(), vec![]).await.unwrap();
    let renders = Arc::new(AtomicUsize::new(0));

    alice
        .dvm
        .where_zvm()
        .subscribe(|_| panic!("renderer crashed"));
    let counter = renders.clone();
    alice.dvm.where_zvm().subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    alice
        .dvm
        .create_next_session(&space_id, "evening")
        .await
        .unwrap();

    assert!(renders.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delete_all_my_locations_spares_peers() {
    let conductor = LocalConductor::new();
    let alice = peer(&conductor, "uhCAkAlice");
    let bob = peer(&conductor, "uhCAkBob");
    introduce(&alice, &bob).await;
    let space_id = alice.dvm.construct_new_play(office(), vec![]).await.unwrap();
    wait_until!(bob.dvm.play(&space_id).await.is_some());
    let session_id = alice.dvm.current_session(&space_id).await.unwrap();
    bob.dvm
        .publish_location(location(&session_id, 5.0, 5.0, "bob"), &space_id)
        .await
        .unwrap();
    for x in [1.0, 2.0] {
        alice
            .dvm
            .publish_location(location(&session_id, x, 0.0, "alice"), &space_id)
            .await
            .unwrap();
    }
    wait_until!(
        alice
            .dvm
            .where_zvm()
            .session(&session_id)
            .await
            .is_some_and(|session| session.locations.len() == 3)
    );

    let deleted = alice.dvm.delete_all_my_locations(&space_id).await.unwrap();

    assert_eq!(deleted, 2);
    let session = alice.dvm.where_zvm().session(&session_id).await.unwrap();
    let live: Vec<_> = session.live_locations().map(|(_, info)| info.author.clone()).collect();
    assert_eq!(live, vec![bob.me()]);
    assert!(alice.dvm.peer_first_location(&space_id, "bob").await.is_some());
    assert!(alice.dvm.peer_first_location(&space_id, "alice").await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_detached_dvm_stops_hearing_peers() {
    let conductor = LocalConductor::new();
    let bob = peer(&conductor, "uhCAkBob");
    let carol = peer(&conductor, "uhCAkCarol");
    assert!(bob.dvm.is_attached());

    assert!(bob.dvm.detach());
    assert!(!bob.dvm.is_attached());
    assert!(!bob.dvm.detach());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    carol.dvm.register_agents(&[bob.me()]).await;
    carol.dvm.ping_others(None).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(bob.dvm.last_seen(&carol.me()).await, None);
    assert_eq!(carol.dvm.last_seen(&bob.me()).await, None);
}
