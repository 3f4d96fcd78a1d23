//! Database entity models for the student registry.
//!
//! `students` holds the registrations. Rows are only ever inserted whole and
//! read back; nothing in this crate updates or deletes them. `sessions` holds
//! the per-browser state and is owned by the session store.

/// Session entity model for Sea-ORM database interaction.
pub mod session;
/// Student entity model for Sea-ORM database interaction.
pub mod student;
