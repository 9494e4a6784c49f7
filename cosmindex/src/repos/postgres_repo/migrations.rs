use crate::{Migratable, PostgresRepo, RepoMigrations, SQLikeMigrations};

impl RepoMigrations for PostgresRepo {
    fn create_chains_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_chains()
    }

    fn create_blocks_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_blocks()
    }

    fn create_txes_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_txes()
    }

    fn create_messages_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_messages()
    }

    fn create_failed_blocks_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_failed_blocks()
    }

    fn create_denoms_migration() -> &'static [&'static str] {
        SQLikeMigrations::create_denoms()
    }
}

impl Migratable for PostgresRepo {}
