//! Schema migrations for the `students` and `sessions` tables.

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_students_table;
mod m20240101_000002_create_sessions_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    // Keep our bookkeeping apart from any other migrator sharing the database
    fn migration_table_name() -> sea_orm::DynIden {
        Alias::new("student_registry_migrations").into_iden()
    }

    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_students_table::Migration),
            Box::new(m20240101_000002_create_sessions_table::Migration),
        ]
    }
}
