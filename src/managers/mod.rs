// Nimbus state managers
// The tab manager is the single in-memory authority for the tab/space graph.

pub mod tab_manager;
