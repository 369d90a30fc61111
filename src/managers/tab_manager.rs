use std::collections::BTreeMap;

use uuid::Uuid;

use crate::database::connection::Database;
use crate::services::persister::PersisterHandle;
use crate::types::errors::TabError;
use crate::types::snapshot::{GlobalState, Snapshot, SpaceSnapshot, TabSnapshot};

/// A live tab. Ordering is positional: a tab's index is its position in
/// its container list, so indices stay contiguous by construction.
#[derive(Debug, Clone)]
pub struct Tab {
    pub id: String,
    pub url: String,
    pub title: String,
}

/// A live space with its two tab containers.
#[derive(Debug)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub gradient: String,
    pub last_active_tab_id: Option<String>,
    pub profile_id: String,
    pub pinned_tabs: Vec<Tab>,
    pub regular_tabs: Vec<Tab>,
}

/// The container a tab lives in. Exactly one per tab at any instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabLocation {
    /// Globally pinned for a profile, visible across all its spaces.
    Essentials(String),
    /// Pinned within one space.
    SpacePinned(String),
    /// Regular (unpinned) tab of one space.
    SpaceRegular(String),
}

/// Trait defining the tab management interface.
///
/// Every mutating operation ends by requesting an asynchronous persist of
/// a freshly built full snapshot; callers never wait for the write.
pub trait TabManagerTrait {
    fn create_space(&mut self, name: &str) -> String;
    fn remove_space(&mut self, space_id: &str) -> Result<(), TabError>;
    fn set_active_space(&mut self, space_id: &str) -> Result<(), TabError>;
    fn create_tab(
        &mut self,
        url: &str,
        title: &str,
        location: TabLocation,
        activate: bool,
    ) -> Result<String, TabError>;
    fn remove_tab(&mut self, tab_id: &str) -> Result<(), TabError>;
    fn reorder_tab(&mut self, tab_id: &str, target_index: usize) -> Result<(), TabError>;
    fn move_tab(
        &mut self,
        tab_id: &str,
        dest: TabLocation,
        target_index: usize,
    ) -> Result<(), TabError>;
    fn pin_tab(&mut self, tab_id: &str) -> Result<(), TabError>;
    fn unpin_tab(&mut self, tab_id: &str) -> Result<(), TabError>;
    fn set_active_tab(&mut self, tab_id: &str) -> Result<(), TabError>;
    fn update_tab_url(&mut self, tab_id: &str, url: &str) -> Result<(), TabError>;
    fn update_tab_title(&mut self, tab_id: &str, title: &str) -> Result<(), TabError>;
    fn get_tab(&self, tab_id: &str) -> Option<&Tab>;
    fn locate_tab(&self, tab_id: &str) -> Option<(TabLocation, usize)>;
    fn tabs_in(&self, location: &TabLocation) -> Vec<&Tab>;
    fn spaces(&self) -> &[Space];
    fn active_tab_id(&self) -> Option<&str>;
    fn active_space_id(&self) -> Option<&str>;
    fn tab_count(&self) -> usize;
    fn snapshot(&self) -> Snapshot;
}

/// In-memory authority for the tab/space graph.
///
/// The durable store is always subordinate to this state: every mutation
/// happens here first and is mirrored to the store by the persister.
pub struct TabManager {
    profile_id: String,
    spaces: Vec<Space>,
    /// Global-pinned tab lists, one per profile. BTreeMap keeps snapshot
    /// building deterministic.
    essentials: BTreeMap<String, Vec<Tab>>,
    current_tab_id: Option<String>,
    current_space_id: Option<String>,
    generation: u64,
    persister: PersisterHandle,
}

impl TabManager {
    /// Creates an empty manager for the given profile.
    pub fn new(profile_id: &str, persister: PersisterHandle) -> Self {
        Self {
            profile_id: profile_id.to_string(),
            spaces: Vec::new(),
            essentials: BTreeMap::new(),
            current_tab_id: None,
            current_space_id: None,
            generation: 0,
            persister,
        }
    }

    /// Rebuilds the live graph from a loaded snapshot (startup restore).
    ///
    /// Space profile references are backfilled with `profile_id` when the
    /// stored row predates profiles. Tabs referencing unknown spaces are
    /// dropped with a warning rather than poisoning the graph.
    pub fn from_snapshot(snapshot: &Snapshot, profile_id: &str, persister: PersisterHandle) -> Self {
        let mut manager = Self::new(profile_id, persister);

        let mut spaces: Vec<&SpaceSnapshot> = snapshot.spaces.iter().collect();
        spaces.sort_by_key(|s| s.index);
        for space in spaces {
            manager.spaces.push(Space {
                id: space.id.clone(),
                name: space.name.clone(),
                icon: space.icon.clone(),
                gradient: space.gradient.clone(),
                last_active_tab_id: space.last_active_tab_id.clone(),
                profile_id: space
                    .profile_id
                    .clone()
                    .unwrap_or_else(|| profile_id.to_string()),
                pinned_tabs: Vec::new(),
                regular_tabs: Vec::new(),
            });
        }

        let mut tabs: Vec<&TabSnapshot> = snapshot.tabs.iter().collect();
        tabs.sort_by_key(|t| t.index);
        for record in tabs {
            let tab = Tab {
                id: record.id.clone(),
                url: record.url.clone(),
                title: record.title.clone(),
            };
            if record.is_pinned {
                let profile = record
                    .profile_id
                    .clone()
                    .unwrap_or_else(|| profile_id.to_string());
                manager.essentials.entry(profile).or_default().push(tab);
                continue;
            }
            let Some(space_id) = &record.space_id else {
                log::warn!("dropping stored tab {} with no container", record.id);
                continue;
            };
            match manager.spaces.iter_mut().find(|s| &s.id == space_id) {
                Some(space) => {
                    if record.is_space_pinned {
                        space.pinned_tabs.push(tab);
                    } else {
                        space.regular_tabs.push(tab);
                    }
                }
                None => {
                    log::warn!(
                        "dropping stored tab {} referencing unknown space {}",
                        record.id,
                        space_id
                    );
                }
            }
        }

        manager.current_tab_id = snapshot.state.current_tab_id.clone();
        manager.current_space_id = snapshot.state.current_space_id.clone();
        manager
    }

    /// Profile the manager pins essentials to.
    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    /// Generation of the most recently requested persist.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Blocking persist of the current state; used on the shutdown path so
    /// the process is not killed mid-write.
    pub fn flush(&mut self) -> bool {
        self.generation += 1;
        self.persister.persist_blocking(self.snapshot(), self.generation)
    }

    /// Flushes, stops the persister worker, and returns the store handle.
    pub fn shutdown(mut self) -> Option<Database> {
        self.flush();
        self.persister.shutdown()
    }

    /// Fire-and-forget persist of a fresh full snapshot. Ends every
    /// mutating operation.
    fn request_persist(&mut self) {
        self.generation += 1;
        self.persister.request_persist(self.snapshot(), self.generation);
    }

    fn space(&self, space_id: &str) -> Option<&Space> {
        self.spaces.iter().find(|s| s.id == space_id)
    }

    fn space_mut(&mut self, space_id: &str) -> Option<&mut Space> {
        self.spaces.iter_mut().find(|s| s.id == space_id)
    }

    fn container_mut(&mut self, location: &TabLocation) -> Result<&mut Vec<Tab>, TabError> {
        match location {
            TabLocation::Essentials(profile) => {
                Ok(self.essentials.entry(profile.clone()).or_default())
            }
            TabLocation::SpacePinned(space_id) => self
                .space_mut(space_id)
                .map(|s| &mut s.pinned_tabs)
                .ok_or_else(|| TabError::SpaceNotFound(space_id.clone())),
            TabLocation::SpaceRegular(space_id) => self
                .space_mut(space_id)
                .map(|s| &mut s.regular_tabs)
                .ok_or_else(|| TabError::SpaceNotFound(space_id.clone())),
        }
    }

    fn validate_location(&self, location: &TabLocation) -> Result<(), TabError> {
        match location {
            // Only the manager's own profile, or one restored from the
            // store, may receive essentials.
            TabLocation::Essentials(profile) => {
                if profile == &self.profile_id || self.essentials.contains_key(profile) {
                    Ok(())
                } else {
                    Err(TabError::ProfileNotFound(profile.clone()))
                }
            }
            TabLocation::SpacePinned(space_id) | TabLocation::SpaceRegular(space_id) => self
                .space(space_id)
                .map(|_| ())
                .ok_or_else(|| TabError::SpaceNotFound(space_id.clone())),
        }
    }

    /// Deterministic fallback after removing the active tab: the same
    /// container's neighbor at the vacated index (clamped), else its last
    /// remaining member, else none.
    fn fallback_active_tab(&self, location: &TabLocation, vacated: usize) -> Option<String> {
        let remaining = self.tabs_in(location);
        if remaining.is_empty() {
            return None;
        }
        let pick = vacated.min(remaining.len() - 1);
        Some(remaining[pick].id.clone())
    }

    fn find_tab_mut(&mut self, tab_id: &str) -> Option<&mut Tab> {
        for list in self.essentials.values_mut() {
            if let Some(tab) = list.iter_mut().find(|t| t.id == tab_id) {
                return Some(tab);
            }
        }
        for space in &mut self.spaces {
            if let Some(tab) = space.pinned_tabs.iter_mut().find(|t| t.id == tab_id) {
                return Some(tab);
            }
            if let Some(tab) = space.regular_tabs.iter_mut().find(|t| t.id == tab_id) {
                return Some(tab);
            }
        }
        None
    }
}

impl TabManagerTrait for TabManager {
    /// Creates a new space owned by the current profile. The first space
    /// created becomes active.
    fn create_space(&mut self, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.spaces.push(Space {
            id: id.clone(),
            name: name.to_string(),
            icon: String::new(),
            gradient: String::new(),
            last_active_tab_id: None,
            profile_id: self.profile_id.clone(),
            pinned_tabs: Vec::new(),
            regular_tabs: Vec::new(),
        });
        if self.current_space_id.is_none() {
            self.current_space_id = Some(id.clone());
        }
        self.request_persist();
        id
    }

    /// Removes a space and closes every tab it holds.
    fn remove_space(&mut self, space_id: &str) -> Result<(), TabError> {
        let idx = self
            .spaces
            .iter()
            .position(|s| s.id == space_id)
            .ok_or_else(|| TabError::SpaceNotFound(space_id.to_string()))?;
        let space = self.spaces.remove(idx);

        let closed_active = space
            .pinned_tabs
            .iter()
            .chain(space.regular_tabs.iter())
            .any(|t| Some(t.id.as_str()) == self.current_tab_id.as_deref());
        if closed_active {
            self.current_tab_id = None;
        }
        if self.current_space_id.as_deref() == Some(space_id) {
            self.current_space_id = self.spaces.first().map(|s| s.id.clone());
        }

        self.request_persist();
        Ok(())
    }

    fn set_active_space(&mut self, space_id: &str) -> Result<(), TabError> {
        let last_active = self
            .space(space_id)
            .ok_or_else(|| TabError::SpaceNotFound(space_id.to_string()))?
            .last_active_tab_id
            .clone();
        self.current_space_id = Some(space_id.to_string());
        if last_active.is_some() {
            self.current_tab_id = last_active;
        }
        self.request_persist();
        Ok(())
    }

    /// Creates a tab appended to the given container. Returns the new
    /// tab's ID. The tab becomes active when requested, or when nothing
    /// else is active yet.
    fn create_tab(
        &mut self,
        url: &str,
        title: &str,
        location: TabLocation,
        activate: bool,
    ) -> Result<String, TabError> {
        self.validate_location(&location)?;
        let id = Uuid::new_v4().to_string();
        let tab = Tab {
            id: id.clone(),
            url: url.to_string(),
            title: title.to_string(),
        };
        self.container_mut(&location)?.push(tab);

        if activate || self.current_tab_id.is_none() {
            self.current_tab_id = Some(id.clone());
            if let TabLocation::SpacePinned(space_id) | TabLocation::SpaceRegular(space_id) =
                &location
            {
                self.current_space_id = Some(space_id.clone());
                if let Some(space) = self.space_mut(space_id) {
                    space.last_active_tab_id = Some(id.clone());
                }
            }
        }

        self.request_persist();
        Ok(id)
    }

    /// Closes a tab. Removing the active tab selects the deterministic
    /// same-container fallback.
    fn remove_tab(&mut self, tab_id: &str) -> Result<(), TabError> {
        let (location, idx) = self
            .locate_tab(tab_id)
            .ok_or_else(|| TabError::TabNotFound(tab_id.to_string()))?;
        let was_active = self.current_tab_id.as_deref() == Some(tab_id);

        self.container_mut(&location)?.remove(idx);
        for space in &mut self.spaces {
            if space.last_active_tab_id.as_deref() == Some(tab_id) {
                space.last_active_tab_id = None;
            }
        }

        if was_active {
            self.current_tab_id = self.fallback_active_tab(&location, idx);
        }

        self.request_persist();
        Ok(())
    }

    /// Moves a tab to a new position within its container. The target
    /// index is clamped to the container bounds.
    fn reorder_tab(&mut self, tab_id: &str, target_index: usize) -> Result<(), TabError> {
        let (location, idx) = self
            .locate_tab(tab_id)
            .ok_or_else(|| TabError::TabNotFound(tab_id.to_string()))?;
        let list = self.container_mut(&location)?;
        let tab = list.remove(idx);
        let at = target_index.min(list.len());
        list.insert(at, tab);
        self.request_persist();
        Ok(())
    }

    /// Moves a tab between containers: an atomic remove-from-source plus
    /// insert-into-destination. Both happen before the persist request, so
    /// no partial state is ever observable in the store.
    fn move_tab(
        &mut self,
        tab_id: &str,
        dest: TabLocation,
        target_index: usize,
    ) -> Result<(), TabError> {
        self.validate_location(&dest)?;
        let (src, idx) = self
            .locate_tab(tab_id)
            .ok_or_else(|| TabError::TabNotFound(tab_id.to_string()))?;
        if src == dest {
            return self.reorder_tab(tab_id, target_index);
        }

        let tab = self.container_mut(&src)?.remove(idx);
        let list = self.container_mut(&dest)?;
        let at = target_index.min(list.len());
        list.insert(at, tab);

        self.request_persist();
        Ok(())
    }

    /// Pins a tab to the current profile's essentials, appending it at the
    /// end and dropping its space reference. Idempotent.
    fn pin_tab(&mut self, tab_id: &str) -> Result<(), TabError> {
        let (src, idx) = self
            .locate_tab(tab_id)
            .ok_or_else(|| TabError::TabNotFound(tab_id.to_string()))?;
        if matches!(src, TabLocation::Essentials(_)) {
            return Ok(());
        }

        let tab = self.container_mut(&src)?.remove(idx);
        let profile = self.profile_id.clone();
        self.essentials.entry(profile).or_default().push(tab);

        self.request_persist();
        Ok(())
    }

    /// Unpins a globally pinned tab, inserting it at the front of the
    /// current (or first available) space's regular list. Idempotent for
    /// tabs that are not globally pinned.
    fn unpin_tab(&mut self, tab_id: &str) -> Result<(), TabError> {
        let (src, idx) = self
            .locate_tab(tab_id)
            .ok_or_else(|| TabError::TabNotFound(tab_id.to_string()))?;
        if !matches!(src, TabLocation::Essentials(_)) {
            return Ok(());
        }

        let space_id = self
            .current_space_id
            .clone()
            .filter(|id| self.space(id).is_some())
            .or_else(|| self.spaces.first().map(|s| s.id.clone()))
            .ok_or_else(|| TabError::SpaceNotFound("no space available".to_string()))?;

        let tab = self.container_mut(&src)?.remove(idx);
        self.container_mut(&TabLocation::SpaceRegular(space_id))?
            .insert(0, tab);

        self.request_persist();
        Ok(())
    }

    /// Switches the active tab, updating the owning space's last-active
    /// marker and the active space when the tab lives in one.
    fn set_active_tab(&mut self, tab_id: &str) -> Result<(), TabError> {
        let (location, _) = self
            .locate_tab(tab_id)
            .ok_or_else(|| TabError::TabNotFound(tab_id.to_string()))?;
        self.current_tab_id = Some(tab_id.to_string());
        if let TabLocation::SpacePinned(space_id) | TabLocation::SpaceRegular(space_id) = &location
        {
            self.current_space_id = Some(space_id.clone());
            if let Some(space) = self.space_mut(space_id) {
                space.last_active_tab_id = Some(tab_id.to_string());
            }
        }
        self.request_persist();
        Ok(())
    }

    fn update_tab_url(&mut self, tab_id: &str, url: &str) -> Result<(), TabError> {
        let tab = self
            .find_tab_mut(tab_id)
            .ok_or_else(|| TabError::TabNotFound(tab_id.to_string()))?;
        tab.url = url.to_string();
        self.request_persist();
        Ok(())
    }

    fn update_tab_title(&mut self, tab_id: &str, title: &str) -> Result<(), TabError> {
        let tab = self
            .find_tab_mut(tab_id)
            .ok_or_else(|| TabError::TabNotFound(tab_id.to_string()))?;
        tab.title = title.to_string();
        self.request_persist();
        Ok(())
    }

    fn get_tab(&self, tab_id: &str) -> Option<&Tab> {
        self.essentials
            .values()
            .flatten()
            .chain(
                self.spaces
                    .iter()
                    .flat_map(|s| s.pinned_tabs.iter().chain(s.regular_tabs.iter())),
            )
            .find(|t| t.id == tab_id)
    }

    fn locate_tab(&self, tab_id: &str) -> Option<(TabLocation, usize)> {
        for (profile, list) in &self.essentials {
            if let Some(idx) = list.iter().position(|t| t.id == tab_id) {
                return Some((TabLocation::Essentials(profile.clone()), idx));
            }
        }
        for space in &self.spaces {
            if let Some(idx) = space.pinned_tabs.iter().position(|t| t.id == tab_id) {
                return Some((TabLocation::SpacePinned(space.id.clone()), idx));
            }
            if let Some(idx) = space.regular_tabs.iter().position(|t| t.id == tab_id) {
                return Some((TabLocation::SpaceRegular(space.id.clone()), idx));
            }
        }
        None
    }

    fn tabs_in(&self, location: &TabLocation) -> Vec<&Tab> {
        match location {
            TabLocation::Essentials(profile) => self
                .essentials
                .get(profile)
                .map(|l| l.iter().collect())
                .unwrap_or_default(),
            TabLocation::SpacePinned(space_id) => self
                .space(space_id)
                .map(|s| s.pinned_tabs.iter().collect())
                .unwrap_or_default(),
            TabLocation::SpaceRegular(space_id) => self
                .space(space_id)
                .map(|s| s.regular_tabs.iter().collect())
                .unwrap_or_default(),
        }
    }

    fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    fn active_tab_id(&self) -> Option<&str> {
        self.current_tab_id.as_deref()
    }

    fn active_space_id(&self) -> Option<&str> {
        self.current_space_id.as_deref()
    }

    fn tab_count(&self) -> usize {
        self.essentials.values().map(Vec::len).sum::<usize>()
            + self
                .spaces
                .iter()
                .map(|s| s.pinned_tabs.len() + s.regular_tabs.len())
                .sum::<usize>()
    }

    /// Builds a full snapshot of all current state, renumbering ordering
    /// indices 0..n-1 per container from list positions.
    fn snapshot(&self) -> Snapshot {
        let mut tabs = Vec::new();
        for (profile, list) in &self.essentials {
            for (i, tab) in list.iter().enumerate() {
                tabs.push(TabSnapshot {
                    id: tab.id.clone(),
                    url: tab.url.clone(),
                    title: tab.title.clone(),
                    index: i as i64,
                    space_id: None,
                    is_pinned: true,
                    is_space_pinned: false,
                    profile_id: Some(profile.clone()),
                });
            }
        }

        let mut spaces = Vec::new();
        for (si, space) in self.spaces.iter().enumerate() {
            spaces.push(SpaceSnapshot {
                id: space.id.clone(),
                name: space.name.clone(),
                icon: space.icon.clone(),
                index: si as i64,
                gradient: space.gradient.clone(),
                last_active_tab_id: space.last_active_tab_id.clone(),
                profile_id: Some(space.profile_id.clone()),
            });
            for (i, tab) in space.pinned_tabs.iter().enumerate() {
                tabs.push(TabSnapshot {
                    id: tab.id.clone(),
                    url: tab.url.clone(),
                    title: tab.title.clone(),
                    index: i as i64,
                    space_id: Some(space.id.clone()),
                    is_pinned: false,
                    is_space_pinned: true,
                    profile_id: None,
                });
            }
            for (i, tab) in space.regular_tabs.iter().enumerate() {
                tabs.push(TabSnapshot {
                    id: tab.id.clone(),
                    url: tab.url.clone(),
                    title: tab.title.clone(),
                    index: i as i64,
                    space_id: Some(space.id.clone()),
                    is_pinned: false,
                    is_space_pinned: false,
                    profile_id: None,
                });
            }
        }

        Snapshot {
            spaces,
            tabs,
            state: GlobalState {
                current_tab_id: self.current_tab_id.clone(),
                current_space_id: self.current_space_id.clone(),
            },
        }
    }
}
