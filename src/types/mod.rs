// Nimbus shared type definitions
// Each submodule defines types used across the session core.

pub mod errors;
pub mod snapshot;
