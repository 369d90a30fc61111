use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::errors::PersistError;

/// A tab's state as captured in a snapshot.
///
/// Placement is encoded by two mutually exclusive flags plus the optional
/// space/profile references:
/// - globally pinned: `is_pinned`, no space, profile set
/// - space pinned: `is_space_pinned`, space set, no profile
/// - regular: neither flag, space set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabSnapshot {
    pub id: String,
    pub url: String,
    pub title: String,
    /// Ordering index, contiguous 0..n-1 within its container.
    pub index: i64,
    pub space_id: Option<String>,
    pub is_pinned: bool,
    pub is_space_pinned: bool,
    pub profile_id: Option<String>,
}

/// A space's state as captured in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpaceSnapshot {
    pub id: String,
    pub name: String,
    /// Icon token chosen by the user for the sidebar.
    pub icon: String,
    pub index: i64,
    /// Opaque encoded gradient blob; the UI layer owns its format.
    pub gradient: String,
    pub last_active_tab_id: Option<String>,
    /// Nullable at load time, backfilled before a snapshot is valid.
    pub profile_id: Option<String>,
}

/// Global selection state. Both fields may legitimately be empty
/// (first run, all tabs closed).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalState {
    pub current_tab_id: Option<String>,
    pub current_space_id: Option<String>,
}

/// A complete, immutable copy of the tab/space/selection graph at one
/// instant. Rebuilt in full on every persist request; never diffed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub spaces: Vec<SpaceSnapshot>,
    pub tabs: Vec<TabSnapshot>,
    pub state: GlobalState,
}

impl Snapshot {
    /// Validates the snapshot against the model invariants. Any violation
    /// means the in-memory graph is inconsistent and the snapshot must not
    /// reach the store.
    pub fn validate(&self) -> Result<(), PersistError> {
        let mut space_ids = HashSet::new();
        for space in &self.spaces {
            if space.index < 0 {
                return Err(PersistError::InvalidModelState(format!(
                    "space {} has negative index {}",
                    space.id, space.index
                )));
            }
            if !space_ids.insert(space.id.as_str()) {
                return Err(PersistError::InvalidModelState(format!(
                    "duplicate space id {}",
                    space.id
                )));
            }
        }

        let mut tab_ids = HashSet::new();
        for tab in &self.tabs {
            if tab.index < 0 {
                return Err(PersistError::InvalidModelState(format!(
                    "tab {} has negative index {}",
                    tab.id, tab.index
                )));
            }
            if !tab_ids.insert(tab.id.as_str()) {
                return Err(PersistError::InvalidModelState(format!(
                    "duplicate tab id {}",
                    tab.id
                )));
            }
            if tab.is_pinned && tab.is_space_pinned {
                return Err(PersistError::InvalidModelState(format!(
                    "tab {} is both globally pinned and space pinned",
                    tab.id
                )));
            }
            if tab.is_pinned {
                if tab.space_id.is_some() {
                    return Err(PersistError::InvalidModelState(format!(
                        "globally pinned tab {} carries a space reference",
                        tab.id
                    )));
                }
                if tab.profile_id.is_none() {
                    return Err(PersistError::InvalidModelState(format!(
                        "globally pinned tab {} has no profile reference",
                        tab.id
                    )));
                }
            } else if tab.space_id.is_none() {
                return Err(PersistError::InvalidModelState(format!(
                    "tab {} is not globally pinned but has no space reference",
                    tab.id
                )));
            }
            if let Some(space_id) = &tab.space_id {
                if !space_ids.contains(space_id.as_str()) {
                    return Err(PersistError::InvalidModelState(format!(
                        "tab {} references unknown space {}",
                        tab.id, space_id
                    )));
                }
            }
        }

        Ok(())
    }
}
