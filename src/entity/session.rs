//! Session entity model for Sea-ORM database interaction.
//!
//! Backs [`SeaOrmSessionStore`](crate::SeaOrmSessionStore): each row is one
//! browser session's form state, gate flag and dashboard snapshot.

use sea_orm::entity::prelude::*;

/// One persisted `tower-sessions` record.
///
/// # Database Schema
///
/// | Column      | Type               | Description                         |
/// |-------------|--------------------|-------------------------------------|
/// | id          | TEXT (Primary Key) | Session ID                          |
/// | data        | BLOB / BYTEA       | MessagePack serialized session data |
/// | expiry_date | TIMESTAMPTZ        | After this the row is dead weight   |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// The `tower_sessions::session::Id` in its string form.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,
    pub data: Vec<u8>,
    /// Rows past this instant are never loaded and are removed by
    /// `delete_expired`.
    pub expiry_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
