//! Property-based tests for snapshot persistence round-trips.
//!
//! These tests verify that any valid snapshot persisted through the
//! persister reads back equal from the store, and that repeating the
//! persist changes nothing.

use nimbus_session::database::{store, Database};
use nimbus_session::services::persister::SnapshotPersister;
use nimbus_session::types::snapshot::{GlobalState, Snapshot, SpaceSnapshot, TabSnapshot};
use proptest::prelude::*;

/// Strategy for generating valid URL strings.
fn arb_url() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("https"), Just("http")],
        "[a-z][a-z0-9]{2,15}",
        prop_oneof![Just(".com"), Just(".org"), Just(".net"), Just(".io")],
    )
        .prop_map(|(scheme, host, tld)| format!("{}://{}{}", scheme, host, tld))
}

fn arb_title() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 ]{1,30}"
}

/// Per-space shape: (pinned tab count, regular tab count).
fn arb_space_shape() -> impl Strategy<Value = (usize, usize)> {
    (0usize..3, 0usize..4)
}

/// Strategy for a snapshot that is valid by construction: positional IDs
/// and indices, space references that always resolve, and selection state
/// drawn from the generated members.
fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    (
        proptest::collection::vec(arb_space_shape(), 1..4),
        0usize..3,
        arb_url(),
        arb_title(),
        any::<bool>(),
    )
        .prop_map(|(shapes, essential_count, url, title, select_first)| {
            let mut spaces = Vec::new();
            let mut tabs = Vec::new();

            for (si, (pinned, regular)) in shapes.iter().enumerate() {
                let space_id = format!("space-{}", si);
                spaces.push(SpaceSnapshot {
                    id: space_id.clone(),
                    name: format!("Space {}", si),
                    icon: "globe".to_string(),
                    index: si as i64,
                    gradient: "g:default".to_string(),
                    last_active_tab_id: None,
                    profile_id: Some("default".to_string()),
                });
                for i in 0..*pinned {
                    tabs.push(TabSnapshot {
                        id: format!("{}-pinned-{}", space_id, i),
                        url: url.clone(),
                        title: title.clone(),
                        index: i as i64,
                        space_id: Some(space_id.clone()),
                        is_pinned: false,
                        is_space_pinned: true,
                        profile_id: None,
                    });
                }
                for i in 0..*regular {
                    tabs.push(TabSnapshot {
                        id: format!("{}-regular-{}", space_id, i),
                        url: url.clone(),
                        title: title.clone(),
                        index: i as i64,
                        space_id: Some(space_id.clone()),
                        is_pinned: false,
                        is_space_pinned: false,
                        profile_id: None,
                    });
                }
            }

            for i in 0..essential_count {
                tabs.push(TabSnapshot {
                    id: format!("essential-{}", i),
                    url: url.clone(),
                    title: title.clone(),
                    index: i as i64,
                    space_id: None,
                    is_pinned: true,
                    is_space_pinned: false,
                    profile_id: Some("default".to_string()),
                });
            }

            let state = if select_first {
                GlobalState {
                    current_tab_id: tabs.first().map(|t| t.id.clone()),
                    current_space_id: spaces.first().map(|s| s.id.clone()),
                }
            } else {
                GlobalState::default()
            };

            Snapshot { spaces, tabs, state }
        })
}

fn sorted_by_id(mut snapshot: Snapshot) -> Snapshot {
    snapshot.spaces.sort_by(|a, b| a.id.cmp(&b.id));
    snapshot.tabs.sort_by(|a, b| a.id.cmp(&b.id));
    snapshot
}

// **Property: persist-then-read round-trip**
//
// *For any* valid snapshot, persisting it then reading the store back
// SHALL yield an equal snapshot, and persisting the same snapshot again
// SHALL leave the store unchanged.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn snapshot_round_trips_through_store(snapshot in arb_snapshot()) {
        prop_assert!(snapshot.validate().is_ok());

        let db = Database::open_in_memory()
            .expect("Failed to open in-memory database");
        let mut persister = SnapshotPersister::new(db);

        prop_assert!(persister.persist(&snapshot, 1));
        let stored = store::read_snapshot(persister.database().connection())
            .expect("read_snapshot should succeed");
        prop_assert_eq!(sorted_by_id(stored), sorted_by_id(snapshot.clone()));

        // Idempotence: replaying the same snapshot changes nothing.
        prop_assert!(persister.persist(&snapshot, 2));
        let again = store::read_snapshot(persister.database().connection())
            .expect("read_snapshot should succeed");
        prop_assert_eq!(sorted_by_id(again), sorted_by_id(snapshot));
    }

    #[test]
    fn shrinking_snapshots_remove_orphans(
        full in arb_snapshot(),
        keep_spaces in 1usize..3,
    ) {
        let db = Database::open_in_memory()
            .expect("Failed to open in-memory database");
        let mut persister = SnapshotPersister::new(db);
        prop_assert!(persister.persist(&full, 1));

        // Drop trailing spaces and their tabs; the next persist must not
        // leave their rows behind.
        let mut shrunk = full.clone();
        shrunk.spaces.truncate(keep_spaces.min(shrunk.spaces.len()));
        let kept: Vec<String> = shrunk.spaces.iter().map(|s| s.id.clone()).collect();
        shrunk.tabs.retain(|t| match &t.space_id {
            Some(id) => kept.contains(id),
            None => true,
        });
        shrunk.state = GlobalState::default();

        prop_assert!(persister.persist(&shrunk, 2));
        let stored = store::read_snapshot(persister.database().connection())
            .expect("read_snapshot should succeed");
        prop_assert_eq!(sorted_by_id(stored), sorted_by_id(shrunk));
    }
}
