//! Nimbus session core — demo mode.
//!
//! Walks the persistence subsystem end to end against a throwaway store:
//! bootstrap, tab/space mutations, pin/unpin, generation coalescing, and
//! a shutdown/reload round-trip.

use std::error::Error;
use std::fs;

use nimbus_session::app::{App, DEFAULT_PROFILE_ID};
use nimbus_session::database::store;
use nimbus_session::database::Database;
use nimbus_session::managers::tab_manager::{TabLocation, TabManagerTrait};
use nimbus_session::services::persister::SnapshotPersister;

fn main() -> Result<(), Box<dyn Error>> {
    println!();
    println!("Nimbus session core v{} — demo mode", env!("CARGO_PKG_VERSION"));
    println!();

    let dir = std::env::temp_dir().join("nimbus-session-demo");
    fs::create_dir_all(&dir)?;
    let store_path = dir.join("nimbus-session.sqlite3");
    let _ = fs::remove_file(&store_path);

    section("Store bootstrap");
    let mut app = App::new(&store_path)?;
    println!("  Opened store at {}", store_path.display());

    section("Tab manager");
    let mgr = &mut app.tab_manager;
    let work = mgr.create_space("Work");
    let play = mgr.create_space("Play");
    let docs = mgr.create_tab(
        "https://docs.example.com",
        "Docs",
        TabLocation::SpaceRegular(work.clone()),
        true,
    )?;
    let mail = mgr.create_tab(
        "https://mail.example.com",
        "Mail",
        TabLocation::SpaceRegular(work.clone()),
        false,
    )?;
    let news = mgr.create_tab(
        "https://news.example.com",
        "News",
        TabLocation::SpaceRegular(play.clone()),
        false,
    )?;
    println!("  Created 2 spaces and 3 tabs, {} total", mgr.tab_count());

    mgr.pin_tab(&mail)?;
    println!(
        "  Pinned Mail to essentials ({} pinned for profile {})",
        mgr.tabs_in(&TabLocation::Essentials(DEFAULT_PROFILE_ID.to_string()))
            .len(),
        DEFAULT_PROFILE_ID
    );

    mgr.move_tab(&news, TabLocation::SpaceRegular(work.clone()), 0)?;
    println!(
        "  Moved News into Work at index 0; Work now holds {} regular tabs",
        mgr.tabs_in(&TabLocation::SpaceRegular(work.clone())).len()
    );

    mgr.unpin_tab(&mail)?;
    println!("  Unpinned Mail back to the front of the active space");
    println!("  Active tab: {:?}", mgr.active_tab_id());
    let _ = docs;

    section("Shutdown flush");
    let db = app.shutdown().ok_or("persister worker lost")?;
    let stored = store::read_snapshot(db.connection())?;
    println!(
        "  Store holds {} spaces / {} tabs after flush",
        stored.spaces.len(),
        stored.tabs.len()
    );
    drop(db);

    section("Reload round-trip");
    let app = App::new(&store_path)?;
    println!(
        "  Reloaded {} tabs across {} spaces, active tab {:?}",
        app.tab_manager.tab_count(),
        app.tab_manager.spaces().len(),
        app.tab_manager.active_tab_id()
    );
    let snapshot = app.tab_manager.snapshot();
    drop(app.shutdown());

    section("Generation coalescing");
    let mut persister = SnapshotPersister::new(Database::open_in_memory()?);
    let accepted = persister.persist(&snapshot, 6);
    let stale = persister.persist(&snapshot, 5);
    println!(
        "  persist(gen 6) -> {}, persist(gen 5) -> {} (stale, discarded)",
        accepted, stale
    );

    println!();
    println!("Demo complete.");
    Ok(())
}

fn section(name: &str) {
    println!("--- {} ---", name);
}
