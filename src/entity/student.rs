//! Student entity model for Sea-ORM database interaction.
//!
//! Maps to the `students` table created by the bundled migration.

use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ConnectionTrait, Set};

use crate::store::StudentRecord;

/// Sea-ORM entity model representing one submitted registration.
///
/// # Database Schema
///
/// | Column      | Type               | Description                          |
/// |-------------|--------------------|--------------------------------------|
/// | id          | UUID (Primary Key) | Assigned on insert                   |
/// | name        | TEXT               | Trimmed, non-empty                   |
/// | phone       | TEXT               | Exactly 10 decimal digits            |
/// | email       | TEXT               | `local@domain.tld` shape             |
/// | college     | TEXT               | Trimmed, non-empty                   |
/// | department  | TEXT               | One of the enumerated departments    |
/// | year        | TEXT               | One of the enumerated years of study |
/// | created_at  | TIMESTAMPTZ        | Assigned on insert                   |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub phone: String,
    #[sea_orm(column_type = "Text")]
    pub email: String,
    #[sea_orm(column_type = "Text")]
    pub college: String,
    #[sea_orm(column_type = "Text")]
    pub department: String,
    #[sea_orm(column_type = "Text")]
    pub year: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Fills in the store-assigned columns on insert.
    ///
    /// Callers never choose a record's identifier or creation time; both are
    /// stamped here unless a value was already set explicitly.
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            if matches!(self.id, ActiveValue::NotSet) {
                self.id = Set(Uuid::new_v4());
            }
            if matches!(self.created_at, ActiveValue::NotSet) {
                self.created_at = Set(chrono::Utc::now().fixed_offset());
            }
        }
        Ok(self)
    }
}

impl From<Model> for StudentRecord {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            phone: model.phone,
            email: model.email,
            college: model.college,
            department: model.department,
            year: model.year,
            created_at: model.created_at.to_utc(),
        }
    }
}
