//! Snapshot reconciliation queries for the Nimbus session store.
//!
//! The store is a mirror of the in-memory graph: every persist replays the
//! full snapshot as an upsert/delete-orphan sequence. The same statement
//! sequence serves both the transactional path (via `Transaction`'s deref
//! to `Connection`) and the best-effort fallback path.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, params_from_iter, Connection};

use crate::types::snapshot::{GlobalState, Snapshot, SpaceSnapshot, TabSnapshot};

/// Replays the snapshot against the store: deletes tab records absent from
/// the snapshot, upserts every tab and space, deletes orphaned space
/// records, and upserts the singleton global-state row.
pub fn apply_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<(), rusqlite::Error> {
    delete_orphans(conn, "tabs", snapshot.tabs.iter().map(|t| t.id.as_str()))?;

    for tab in &snapshot.tabs {
        upsert_tab(conn, tab)?;
    }
    for space in &snapshot.spaces {
        upsert_space(conn, space)?;
    }

    delete_orphans(conn, "spaces", snapshot.spaces.iter().map(|s| s.id.as_str()))?;

    upsert_global_state(conn, &snapshot.state)
}

fn upsert_tab(conn: &Connection, tab: &TabSnapshot) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO tabs (id, url, title, order_index, space_id, is_pinned, is_space_pinned, profile_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
             url = excluded.url,
             title = excluded.title,
             order_index = excluded.order_index,
             space_id = excluded.space_id,
             is_pinned = excluded.is_pinned,
             is_space_pinned = excluded.is_space_pinned,
             profile_id = excluded.profile_id",
        params![
            tab.id,
            tab.url,
            tab.title,
            tab.index,
            tab.space_id,
            tab.is_pinned,
            tab.is_space_pinned,
            tab.profile_id
        ],
    )?;
    Ok(())
}

fn upsert_space(conn: &Connection, space: &SpaceSnapshot) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO spaces (id, name, icon, order_index, gradient, last_active_tab_id, profile_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             icon = excluded.icon,
             order_index = excluded.order_index,
             gradient = excluded.gradient,
             last_active_tab_id = excluded.last_active_tab_id,
             profile_id = excluded.profile_id",
        params![
            space.id,
            space.name,
            space.icon,
            space.index,
            space.gradient,
            space.last_active_tab_id,
            space.profile_id
        ],
    )?;
    Ok(())
}

fn upsert_global_state(conn: &Connection, state: &GlobalState) -> Result<(), rusqlite::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    conn.execute(
        "INSERT INTO global_state (id, current_tab_id, current_space_id, updated_at)
         VALUES ('singleton', ?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
             current_tab_id = excluded.current_tab_id,
             current_space_id = excluded.current_space_id,
             updated_at = excluded.updated_at",
        params![state.current_tab_id, state.current_space_id, now],
    )?;
    Ok(())
}

/// Upper bound on ids per DELETE statement, well under SQLite's
/// bound-parameter limit.
const DELETE_CHUNK: usize = 500;

/// Deletes rows of `table` whose id is not in `keep`.
///
/// Orphans are computed against the stored ids and deleted in bounded
/// chunks, so a large session never exceeds the engine's per-statement
/// parameter limit.
fn delete_orphans<'a>(
    conn: &Connection,
    table: &str,
    keep: impl Iterator<Item = &'a str>,
) -> Result<(), rusqlite::Error> {
    let keep: HashSet<&str> = keep.collect();
    if keep.is_empty() {
        conn.execute(&format!("DELETE FROM {}", table), [])?;
        return Ok(());
    }

    let mut stmt = conn.prepare(&format!("SELECT id FROM {}", table))?;
    let stored = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let orphans: Vec<String> = stored
        .into_iter()
        .filter(|id| !keep.contains(id.as_str()))
        .collect();

    for chunk in orphans.chunks(DELETE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        conn.execute(
            &format!("DELETE FROM {} WHERE id IN ({})", table, placeholders),
            params_from_iter(chunk.iter()),
        )?;
    }
    Ok(())
}

/// Lighter referential-integrity re-check run inside the write transaction:
/// every stored tab's space reference must resolve to a stored space.
pub fn verify_references(conn: &Connection) -> Result<bool, rusqlite::Error> {
    let dangling: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tabs
         WHERE space_id IS NOT NULL
           AND space_id NOT IN (SELECT id FROM spaces)",
        [],
        |row| row.get(0),
    )?;
    Ok(dangling == 0)
}

/// Reads the full snapshot back from the store, ordered by container and
/// ordering index. Used at startup and by round-trip tests.
pub fn read_snapshot(conn: &Connection) -> Result<Snapshot, rusqlite::Error> {
    let mut spaces_stmt = conn.prepare(
        "SELECT id, name, icon, order_index, gradient, last_active_tab_id, profile_id
         FROM spaces ORDER BY order_index",
    )?;
    let spaces = spaces_stmt
        .query_map([], |row| {
            Ok(SpaceSnapshot {
                id: row.get(0)?,
                name: row.get(1)?,
                icon: row.get(2)?,
                index: row.get(3)?,
                gradient: row.get(4)?,
                last_active_tab_id: row.get(5)?,
                profile_id: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut tabs_stmt = conn.prepare(
        "SELECT id, url, title, order_index, space_id, is_pinned, is_space_pinned, profile_id
         FROM tabs ORDER BY profile_id, space_id, is_pinned DESC, is_space_pinned DESC, order_index",
    )?;
    let tabs = tabs_stmt
        .query_map([], |row| {
            Ok(TabSnapshot {
                id: row.get(0)?,
                url: row.get(1)?,
                title: row.get(2)?,
                index: row.get(3)?,
                space_id: row.get(4)?,
                is_pinned: row.get(5)?,
                is_space_pinned: row.get(6)?,
                profile_id: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let state = match conn.query_row(
        "SELECT current_tab_id, current_space_id FROM global_state WHERE id = 'singleton'",
        [],
        |row| {
            Ok(GlobalState {
                current_tab_id: row.get(0)?,
                current_space_id: row.get(1)?,
            })
        },
    ) {
        Ok(state) => state,
        Err(rusqlite::Error::QueryReturnedNoRows) => GlobalState::default(),
        Err(e) => return Err(e),
    };

    Ok(Snapshot {
        spaces,
        tabs,
        state,
    })
}
