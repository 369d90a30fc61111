//! Property-based tests for tab manager operations.
//!
//! These tests verify that arbitrary sequences of tab mutations keep the
//! manager's snapshot valid: per-container ordering indices stay contiguous,
//! the pinned flags stay mutually exclusive, and every space reference
//! resolves.

use std::collections::HashMap;

use nimbus_session::database::Database;
use nimbus_session::managers::tab_manager::{TabLocation, TabManager, TabManagerTrait};
use nimbus_session::services::persister::PersisterHandle;
use nimbus_session::types::snapshot::Snapshot;
use proptest::prelude::*;

/// One mutation drawn from the manager's operation surface. Targets are
/// indices into whatever tabs/spaces exist when the op runs, so every
/// generated sequence is applicable to any manager state.
#[derive(Debug, Clone)]
enum TabOp {
    Create { space: usize, pinned: bool },
    Remove { tab: usize },
    Reorder { tab: usize, target: usize },
    Move { tab: usize, space: usize, target: usize },
    Pin { tab: usize },
    Unpin { tab: usize },
}

fn arb_op() -> impl Strategy<Value = TabOp> {
    prop_oneof![
        (0usize..4, any::<bool>()).prop_map(|(space, pinned)| TabOp::Create { space, pinned }),
        (0usize..16).prop_map(|tab| TabOp::Remove { tab }),
        (0usize..16, 0usize..16).prop_map(|(tab, target)| TabOp::Reorder { tab, target }),
        (0usize..16, 0usize..4, 0usize..16)
            .prop_map(|(tab, space, target)| TabOp::Move { tab, space, target }),
        (0usize..16).prop_map(|tab| TabOp::Pin { tab }),
        (0usize..16).prop_map(|tab| TabOp::Unpin { tab }),
    ]
}

fn manager_with_spaces() -> (TabManager, Vec<String>) {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    let persister = PersisterHandle::spawn(db).expect("Failed to spawn persister");
    let mut mgr = TabManager::new("default", persister);
    let spaces = vec![mgr.create_space("Alpha"), mgr.create_space("Beta")];
    (mgr, spaces)
}

/// All tab IDs in a stable order, for resolving op targets.
fn all_tab_ids(snapshot: &Snapshot) -> Vec<String> {
    let mut ids: Vec<String> = snapshot.tabs.iter().map(|t| t.id.clone()).collect();
    ids.sort();
    ids
}

fn apply(mgr: &mut TabManager, spaces: &[String], op: &TabOp) {
    let ids = all_tab_ids(&mgr.snapshot());
    match op {
        TabOp::Create { space, pinned } => {
            let space_id = spaces[space % spaces.len()].clone();
            let location = if *pinned {
                TabLocation::SpacePinned(space_id)
            } else {
                TabLocation::SpaceRegular(space_id)
            };
            mgr.create_tab("https://example.com", "tab", location, false)
                .expect("create_tab into a known space should succeed");
        }
        TabOp::Remove { tab } => {
            if let Some(id) = ids.get(tab % ids.len().max(1)) {
                mgr.remove_tab(id).expect("remove of a known tab should succeed");
            }
        }
        TabOp::Reorder { tab, target } => {
            if let Some(id) = ids.get(tab % ids.len().max(1)) {
                mgr.reorder_tab(id, *target)
                    .expect("reorder of a known tab should succeed");
            }
        }
        TabOp::Move { tab, space, target } => {
            if let Some(id) = ids.get(tab % ids.len().max(1)) {
                let dest = TabLocation::SpaceRegular(spaces[space % spaces.len()].clone());
                mgr.move_tab(id, dest, *target)
                    .expect("move to a known space should succeed");
            }
        }
        TabOp::Pin { tab } => {
            if let Some(id) = ids.get(tab % ids.len().max(1)) {
                mgr.pin_tab(id).expect("pin of a known tab should succeed");
            }
        }
        TabOp::Unpin { tab } => {
            if let Some(id) = ids.get(tab % ids.len().max(1)) {
                // Spaces always exist here, so unpin cannot fail.
                mgr.unpin_tab(id).expect("unpin with spaces present should succeed");
            }
        }
    }
}

/// Per-container ordering indices must be exactly 0..count-1.
fn assert_contiguous_indices(snapshot: &Snapshot) {
    let mut containers: HashMap<(Option<String>, bool, bool, Option<String>), Vec<i64>> =
        HashMap::new();
    for tab in &snapshot.tabs {
        containers
            .entry((
                tab.space_id.clone(),
                tab.is_pinned,
                tab.is_space_pinned,
                tab.profile_id.clone(),
            ))
            .or_default()
            .push(tab.index);
    }
    for (container, mut indices) in containers {
        indices.sort_unstable();
        let expected: Vec<i64> = (0..indices.len() as i64).collect();
        assert_eq!(
            indices, expected,
            "indices must be contiguous in container {:?}",
            container
        );
    }
}

// **Property: mutation sequences preserve snapshot validity**
//
// *For any* sequence of create/remove/reorder/move/pin/unpin operations,
// the snapshot after each operation SHALL pass validation, keep contiguous
// per-container indices, and keep the pinned flags mutually exclusive.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn mutation_sequences_keep_snapshot_valid(
        ops in proptest::collection::vec(arb_op(), 1..24),
    ) {
        let (mut mgr, spaces) = manager_with_spaces();

        for op in &ops {
            apply(&mut mgr, &spaces, op);

            let snapshot = mgr.snapshot();
            prop_assert!(snapshot.validate().is_ok(), "snapshot invalid after {:?}", op);
            assert_contiguous_indices(&snapshot);
            for tab in &snapshot.tabs {
                prop_assert!(!(tab.is_pinned && tab.is_space_pinned));
            }
        }
    }

    #[test]
    fn active_tab_always_resolves_after_mutations(
        ops in proptest::collection::vec(arb_op(), 1..24),
    ) {
        let (mut mgr, spaces) = manager_with_spaces();

        for op in &ops {
            apply(&mut mgr, &spaces, op);

            if let Some(active) = mgr.active_tab_id() {
                let active = active.to_string();
                prop_assert!(
                    mgr.get_tab(&active).is_some(),
                    "active tab {} vanished after {:?}",
                    active,
                    op
                );
            }
        }
    }
}
