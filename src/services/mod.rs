//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and in-memory state so route handlers
//! can stay focused on request translation and auth plumbing.

pub mod directory;
pub mod generate;
pub mod guard;
pub mod quiz;
pub mod session;
